//! In-process stand-in for the broker and the dome controller.

use super::codec::decode_response_bytes;
use super::config::BrokerConfig;
use super::correlator::Correlator;
use super::transport::{MessageHandler, Transport, TransportError};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A message the scripted controller sends back after a command.
#[derive(Debug, Clone)]
pub(crate) struct Reply {
    delay: Duration,
    message: String,
}

impl Reply {
    pub(crate) fn now(message: impl Into<String>) -> Self {
        Self::after(Duration::ZERO, message)
    }

    pub(crate) fn after(delay: Duration, message: impl Into<String>) -> Self {
        Self {
            delay,
            message: message.into(),
        }
    }
}

type Responder = Arc<dyn Fn(&str) -> Vec<Reply> + Send + Sync>;
type Handlers = Arc<RwLock<HashMap<String, MessageHandler>>>;

/// Acknowledge everything, reporting firmware `1.2.3` for the version query.
fn ack_all(wire: &str) -> Vec<Reply> {
    match wire.chars().nth(1) {
        Some('V') => vec![Reply::now("_ACK_V=(1.2.3);")],
        Some(code) => vec![Reply::now(format!("_ACK_{code};"))],
        None => vec![],
    }
}

#[derive(derive_more::Debug)]
pub(crate) struct ScriptedTransport {
    connected: AtomicBool,
    fail_connect: AtomicBool,
    published: Mutex<Vec<(String, String)>>,
    #[debug(skip)]
    handlers: Handlers,
    #[debug(skip)]
    responder: RwLock<Responder>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            connected: AtomicBool::new(false),
            fail_connect: AtomicBool::new(false),
            published: Mutex::default(),
            handlers: Arc::default(),
            responder: RwLock::new(Arc::new(ack_all)),
        })
    }

    /// Replace the controller script. Replies go to the `responses` topic next to the command topic.
    pub(crate) fn respond_with(&self, responder: impl Fn(&str) -> Vec<Reply> + Send + Sync + 'static) {
        *self.responder.write() = Arc::new(responder);
    }

    pub(crate) fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::Relaxed);
    }

    /// Payloads published so far, in order.
    pub(crate) fn published(&self) -> Vec<String> {
        self.published
            .lock()
            .iter()
            .map(|(_, payload)| payload.clone())
            .collect()
    }

    pub(crate) fn clear_published(&self) {
        self.published.lock().clear();
    }

    /// Currently subscribed topics, sorted.
    pub(crate) fn subscriptions(&self) -> Vec<String> {
        let mut topics = self.handlers.read().keys().cloned().collect::<Vec<_>>();
        topics.sort();
        topics
    }

    /// Deliver a message as if the broker routed it.
    pub(crate) fn inject(&self, topic: &str, payload: &[u8]) {
        let handler = self.handlers.read().get(topic).map(Arc::clone);
        if let Some(handler) = handler {
            handler(payload);
        }
    }

    /// A correlator on `<root>/commands` fed from `<root>/responses`.
    pub(crate) async fn wire_correlator(
        self: &Arc<Self>,
        root: &str,
        cancel: CancellationToken,
    ) -> Result<Arc<Correlator>, TransportError> {
        let correlator = Arc::new(Correlator::new(
            Arc::clone(self) as Arc<dyn Transport>,
            format!("{root}/commands"),
            cancel,
        ));

        let handler = {
            let correlator = Arc::clone(&correlator);
            Arc::new(move |payload: &[u8]| {
                if let Ok(response) = decode_response_bytes(payload) {
                    correlator.deliver(response);
                }
            })
        };
        self.subscribe(&format!("{root}/responses"), handler)
            .await?;

        Ok(correlator)
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self, broker: &BrokerConfig) -> Result<(), TransportError> {
        if self.fail_connect.load(Ordering::Relaxed) {
            return Err(TransportError::Unreachable {
                addr: format!("{}:{}", broker.host, broker.port),
                reason: "scripted failure".to_owned(),
            });
        }
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::Release);
        self.handlers.write().clear();
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }

        let wire = String::from_utf8_lossy(payload).into_owned();
        self.published.lock().push((topic.to_owned(), wire.clone()));

        let Some(root) = topic.strip_suffix("/commands") else {
            return Ok(());
        };
        let reply_topic = format!("{root}/responses");

        let responder = Arc::clone(&*self.responder.read());
        let mut replies = responder(&wire);
        replies.sort_by_key(|reply| reply.delay);

        let handlers = Arc::clone(&self.handlers);
        let started = tokio::time::Instant::now();
        drop(tokio::spawn(async move {
            for reply in replies {
                tokio::time::sleep_until(started + reply.delay).await;
                let handler = handlers.read().get(&reply_topic).map(Arc::clone);
                if let Some(handler) = handler {
                    handler(reply.message.as_bytes());
                }
            }
        }));

        Ok(())
    }

    async fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::NotConnected);
        }
        _ = self.handlers.write().insert(topic.to_owned(), handler);
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        _ = self.handlers.write().remove(topic);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}
