use super::config::BrokerConfig;
use parking_lot::RwLock;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Callback invoked with the payload of every message on a subscribed topic.
///
/// Runs on the transport's event-loop task, so it must not block.
pub type MessageHandler = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Failure of the message transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No live broker session.
    #[error("not connected to the message broker")]
    NotConnected,
    /// The broker could not be reached.
    #[error("couldn't connect to the message broker at {addr}: {reason}")]
    Unreachable {
        /// `host:port` of the broker.
        addr: String,
        /// What went wrong.
        reason: String,
    },
    /// The MQTT client refused a request.
    #[error(transparent)]
    Client(#[from] rumqttc::ClientError),
}

/// Publish/subscribe message transport towards the dome controller.
#[async_trait::async_trait]
pub trait Transport: Debug + Send + Sync {
    /// Open a session with the broker.
    async fn connect(&self, broker: &BrokerConfig) -> Result<(), TransportError>;

    /// Close the session, dropping all subscriptions.
    async fn disconnect(&self);

    /// Publish a payload.
    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Route messages on `topic` to `handler`.
    async fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), TransportError>;

    /// Stop routing messages on `topic`.
    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError>;

    /// Whether the broker session is currently up.
    fn is_connected(&self) -> bool;
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug)]
struct MqttSession {
    client: AsyncClient,
    cancel: CancellationToken,
    event_loop: JoinHandle<()>,
}

/// [`Transport`] over an MQTT broker.
#[derive(derive_more::Debug)]
pub struct MqttTransport {
    client_id: String,
    connected: Arc<AtomicBool>,
    #[debug(skip)]
    handlers: Arc<RwLock<HashMap<String, MessageHandler>>>,
    session: tokio::sync::Mutex<Option<MqttSession>>,
}

impl MqttTransport {
    /// Create a disconnected transport that will identify itself as `client_id`.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            connected: Arc::default(),
            handlers: Arc::default(),
            session: tokio::sync::Mutex::new(None),
        }
    }

    async fn client(&self) -> Result<AsyncClient, TransportError> {
        self.session
            .lock()
            .await
            .as_ref()
            .filter(|_| self.is_connected())
            .map(|session| session.client.clone())
            .ok_or(TransportError::NotConnected)
    }
}

async fn wait_for_connack(event_loop: &mut EventLoop) -> Result<(), ConnectionError> {
    loop {
        if let Event::Incoming(Packet::ConnAck(_)) = event_loop.poll().await? {
            return Ok(());
        }
    }
}

async fn run_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    handlers: Arc<RwLock<HashMap<String, MessageHandler>>>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => break,
            event = event_loop.poll() => event,
        };

        match event {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let handler = handlers.read().get(&publish.topic).map(Arc::clone);
                match handler {
                    Some(handler) => handler(&publish.payload),
                    None => tracing::trace!(topic = %publish.topic, "No handler for message"),
                }
            }
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                tracing::info!("Reconnected to MQTT broker");
                connected.store(true, Ordering::Release);

                // The broker forgets subscriptions of a clean session.
                let topics = handlers.read().keys().cloned().collect::<Vec<_>>();
                for topic in topics {
                    if let Err(err) = client.try_subscribe(&topic, QoS::AtMostOnce) {
                        tracing::error!(%topic, %err, "Failed to re-subscribe");
                    }
                }
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                connected.store(false, Ordering::Release);
                break;
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(%err, "MQTT connection error");
                connected.store(false, Ordering::Release);
                tokio::select! {
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(RECONNECT_DELAY) => {}
                }
            }
        }
    }

    tracing::debug!("MQTT event loop stopped");
}

#[async_trait::async_trait]
impl Transport for MqttTransport {
    #[tracing::instrument(level = "info", skip_all, fields(host = %broker.host, port = broker.port), err)]
    async fn connect(&self, broker: &BrokerConfig) -> Result<(), TransportError> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Ok(());
        }

        let mut options = MqttOptions::new(&self.client_id, &broker.host, broker.port);
        _ = options.set_keep_alive(Duration::from_secs(20));
        if !broker.username.is_empty() {
            _ = options.set_credentials(&broker.username, &broker.password);
        }

        let (client, mut event_loop) = AsyncClient::new(options, 64);

        let unreachable = |reason: String| TransportError::Unreachable {
            addr: format!("{}:{}", broker.host, broker.port),
            reason,
        };

        match tokio::time::timeout(CONNECT_TIMEOUT, wait_for_connack(&mut event_loop)).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => return Err(unreachable(err.to_string())),
            Err(elapsed) => return Err(unreachable(elapsed.to_string())),
        }

        tracing::info!("Connected to MQTT broker");
        self.connected.store(true, Ordering::Release);

        let cancel = CancellationToken::new();
        let event_loop = tokio::spawn(run_event_loop(
            event_loop,
            client.clone(),
            Arc::clone(&self.handlers),
            Arc::clone(&self.connected),
            cancel.clone(),
        ));

        *session = Some(MqttSession {
            client,
            cancel,
            event_loop,
        });

        Ok(())
    }

    #[tracing::instrument(level = "info", skip_all)]
    async fn disconnect(&self) {
        let Some(mut session) = self.session.lock().await.take() else {
            return;
        };

        if let Err(err) = session.client.disconnect().await {
            tracing::warn!(%err, "Failed to request MQTT disconnect");
        }

        // Give the event loop a chance to flush the DISCONNECT packet before stopping it.
        if tokio::time::timeout(DISCONNECT_GRACE, &mut session.event_loop)
            .await
            .is_err()
        {
            session.cancel.cancel();
            if let Err(err) = session.event_loop.await {
                tracing::error!(%err, "MQTT event loop task failed");
            }
        }

        self.connected.store(false, Ordering::Release);
        self.handlers.write().clear();
        tracing::info!("Disconnected from MQTT broker");
    }

    async fn publish(&self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        tracing::debug!(topic, payload = %String::from_utf8_lossy(payload), "Publishing");
        self.client()
            .await?
            .publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .await?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str, handler: MessageHandler) -> Result<(), TransportError> {
        let client = self.client().await?;
        _ = self.handlers.write().insert(topic.to_owned(), handler);
        if let Err(err) = client.subscribe(topic, QoS::AtMostOnce).await {
            _ = self.handlers.write().remove(topic);
            return Err(err.into());
        }
        tracing::debug!(topic, "Subscribed");
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        _ = self.handlers.write().remove(topic);
        self.client().await?.unsubscribe(topic).await?;
        tracing::debug!(topic, "Unsubscribed");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn operations_fail_before_connect() {
        let transport = MqttTransport::new("zro-alpaca-test");
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.publish("/ZRO/commands", b"_S;").await,
            Err(TransportError::NotConnected)
        ));
        assert!(matches!(
            transport.subscribe("/ZRO/telemetry", Arc::new(|_| {})).await,
            Err(TransportError::NotConnected)
        ));
        // Disconnecting without a session is a no-op.
        transport.disconnect().await;
    }

    #[tokio::test]
    async fn unreachable_broker_is_reported() {
        let transport = MqttTransport::new("zro-alpaca-test");
        // Nothing listens on the discard port of the loopback interface.
        let broker = BrokerConfig {
            host: "127.0.0.1".to_owned(),
            port: 9,
            ..BrokerConfig::default()
        };
        assert!(matches!(
            transport.connect(&broker).await,
            Err(TransportError::Unreachable { .. })
        ));
        assert!(!transport.is_connected());
    }
}
