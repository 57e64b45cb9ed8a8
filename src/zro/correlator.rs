use super::codec::{Command, Response};
use super::error::Error;
use super::transport::{Transport, TransportError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

struct Pending {
    token: u64,
    code: char,
    reply: oneshot::Sender<Response>,
}

/// How long a timed out command may still be answered.
const LATE_RESPONSE_GRACE: Duration = Duration::from_secs(5);

struct Abandoned {
    code: char,
    expires: Instant,
}

#[derive(Default)]
struct Slot {
    pending: Option<Pending>,
    /// Timed out commands whose responses may still show up, oldest first.
    /// Each entry absorbs at most one response.
    abandoned: VecDeque<Abandoned>,
}

impl Slot {
    fn take_abandoned(&mut self, code: char) -> bool {
        let now = Instant::now();
        self.abandoned.retain(|entry| entry.expires > now);

        match self.abandoned.iter().position(|entry| entry.code == code) {
            Some(index) => self.abandoned.remove(index).is_some(),
            None => false,
        }
    }
}

/// Pairs each outbound command with the controller's response.
///
/// Only one command is in flight at a time; concurrent callers queue on an async lock.
#[derive(derive_more::Debug)]
pub struct Correlator {
    #[debug(skip)]
    transport: Arc<dyn Transport>,
    topic: String,
    #[debug(skip)]
    cancel: CancellationToken,
    #[debug(skip)]
    send_lock: tokio::sync::Mutex<()>,
    #[debug(skip)]
    next_token: AtomicU64,
    #[debug(skip)]
    slot: parking_lot::Mutex<Slot>,
}

impl Correlator {
    /// Create a correlator publishing commands to `topic`.
    ///
    /// Cancelling `cancel` fails the call in flight and all later ones with [`Error::NotConnected`].
    pub fn new(transport: Arc<dyn Transport>, topic: String, cancel: CancellationToken) -> Self {
        Self {
            transport,
            topic,
            cancel,
            send_lock: tokio::sync::Mutex::new(()),
            next_token: AtomicU64::new(0),
            slot: parking_lot::Mutex::default(),
        }
    }

    /// Send a command and wait for its response.
    #[tracing::instrument(level = "debug", skip(self), fields(command = %command), err)]
    pub async fn send(&self, command: &Command, timeout: Duration) -> Result<Response, Error> {
        let _guard = self.send_lock.lock().await;

        if self.cancel.is_cancelled() {
            return Err(Error::NotConnected);
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let code = command.code().as_char();
        let (reply, response) = oneshot::channel();

        self.slot.lock().pending = Some(Pending { token, code, reply });

        if let Err(err) = self.publish(command).await {
            self.abandon(token, None);
            return Err(err.into());
        }

        let outcome = tokio::select! {
            () = self.cancel.cancelled() => Err(Error::NotConnected),
            received = tokio::time::timeout(timeout, response) => match received {
                Ok(Ok(response)) => Ok(response),
                // The slot was dropped without a reply; treat it like silence.
                Ok(Err(_)) | Err(_) => Err(Error::Timeout { code, timeout }),
            },
        };

        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                self.abandon(token, Some(code));
                return Err(err);
            }
        };

        tracing::debug!(?response, "Received response");

        if response.code != code {
            return Err(Error::ProtocolMismatch {
                expected: code,
                actual: response.code,
            });
        }

        if response.error {
            return Err(Error::CommandRejected(code));
        }

        Ok(response)
    }

    async fn publish(&self, command: &Command) -> Result<(), TransportError> {
        if !self.transport.is_connected() {
            return Err(TransportError::NotConnected);
        }
        let wire = command.encode();
        tracing::debug!(%wire, "Sending command");
        self.transport.publish(&self.topic, wire.as_bytes()).await
    }

    fn abandon(&self, token: u64, late_code: Option<char>) {
        let mut slot = self.slot.lock();
        if slot.pending.as_ref().is_some_and(|pending| pending.token == token) {
            slot.pending = None;
        }
        if let Some(code) = late_code {
            slot.abandoned.push_back(Abandoned {
                code,
                expires: Instant::now() + LATE_RESPONSE_GRACE,
            });
        }
    }

    /// Hand a decoded response to the call in flight.
    ///
    /// Called from the transport's subscriber callback.
    pub fn deliver(&self, response: Response) {
        let mut slot = self.slot.lock();

        let pending_code = slot.pending.as_ref().map(|pending| pending.code);

        if pending_code != Some(response.code) && slot.take_abandoned(response.code) {
            tracing::warn!(?response, "Discarding late response to a timed out command");
            return;
        }

        match slot.pending.take() {
            Some(pending) => {
                if pending.reply.send(response).is_err() {
                    tracing::debug!("Command caller went away before the response arrived");
                }
            }
            None => tracing::warn!(?response, "Discarding unsolicited response"),
        }
    }
}
