use super::codec::{
    Command, CommandCode, Response, decode_battery, decode_response_bytes, decode_telemetry,
};
use super::config::{Config, ConfigStore};
use super::correlator::Correlator;
use super::error::Error;
use super::retry::RetryPolicy;
use super::status::{ConnectionState, DomeCapabilities, DomeStatus, HardwareStatus, ShutterPhase};
use super::transport::{MessageHandler, Transport};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

const CONNECT_SHUTTER: Command = Command::new(CommandCode::ConnectShutter);

/// Default time to wait for the controller to answer a command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Direction of a shutter motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterCommand {
    /// Open the shutter.
    Open,
    /// Close the shutter.
    Close,
}

/// Resources of one connect/disconnect cycle.
#[derive(Debug)]
struct Link {
    correlator: Arc<Correlator>,
    topics: Vec<String>,
    cancel: CancellationToken,
}

/// Driver for a ZRO dome controller reachable through a message broker.
#[derive(derive_more::Debug)]
pub struct ZroDome {
    number: usize,
    unique_id: String,
    store: Arc<dyn ConfigStore>,
    transport: Arc<dyn Transport>,
    config: RwLock<Config>,
    state: Mutex<ConnectionState>,
    #[debug(skip)]
    lifecycle: tokio::sync::Mutex<()>,
    link: RwLock<Option<Link>>,
    #[debug(skip)]
    status: Arc<watch::Sender<HardwareStatus>>,
    slaved: AtomicBool,
    handshake_retry: RetryPolicy,
    command_timeout: Duration,
}

impl ZroDome {
    /// Create a disconnected driver, reading the initial configuration from `store`.
    pub fn new(
        number: usize,
        store: Arc<dyn ConfigStore>,
        transport: Arc<dyn Transport>,
    ) -> eyre::Result<Self> {
        let config = store.load()?;

        Ok(Self {
            number,
            unique_id: format!("zro-alpaca-dome-{number}"),
            store,
            transport,
            config: RwLock::new(config),
            state: Mutex::default(),
            lifecycle: tokio::sync::Mutex::new(()),
            link: RwLock::default(),
            status: Arc::new(watch::Sender::new(HardwareStatus::default())),
            slaved: AtomicBool::new(false),
            handshake_retry: RetryPolicy::default(),
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        })
    }

    /// Replace the unique ID reported to clients.
    #[must_use]
    pub fn with_unique_id(mut self, unique_id: impl Into<String>) -> Self {
        self.unique_id = unique_id.into();
        self
    }

    /// Replace the retry schedule of the shutter handshake.
    #[must_use]
    pub const fn with_handshake_retry(mut self, policy: RetryPolicy) -> Self {
        self.handshake_retry = policy;
        self
    }

    /// Replace the time to wait for each command response.
    #[must_use]
    pub const fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Device number this driver is registered under.
    pub const fn number(&self) -> usize {
        self.number
    }

    /// Unique ID reported to clients.
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Current configuration.
    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    /// Current position in the connection lifecycle.
    pub fn connection_state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Latest hardware snapshot, whatever the connection state.
    pub fn hardware_status(&self) -> HardwareStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every change of the hardware snapshot.
    pub fn watch_status(&self) -> watch::Receiver<HardwareStatus> {
        self.status.subscribe()
    }

    /// Dome status in Alpaca terms. Only available while connected.
    pub fn status(&self) -> Result<DomeStatus, Error> {
        self.ensure_connected()?;
        let angles = self.config.read().angles();
        Ok(DomeStatus::derive(
            &self.status.borrow(),
            &angles,
            self.slaved(),
        ))
    }

    /// What the dome can do with the current configuration.
    pub fn capabilities(&self) -> DomeCapabilities {
        DomeCapabilities::for_config(&self.config.read())
    }

    /// Whether the dome follows a telescope.
    pub fn slaved(&self) -> bool {
        self.slaved.load(Ordering::Relaxed)
    }

    /// Record whether the dome follows a telescope. Nothing is sent to the controller.
    pub fn set_slaved(&self, slaved: bool) {
        tracing::info!(slaved, "Dome slaving changed");
        self.slaved.store(slaved, Ordering::Relaxed);
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = std::mem::replace(&mut *self.state.lock(), state);
        if previous != state {
            tracing::debug!(%previous, %state, "Connection state changed");
        }
    }

    fn ensure_connected(&self) -> Result<(), Error> {
        match self.connection_state() {
            ConnectionState::Connected => Ok(()),
            _ => Err(Error::NotConnected),
        }
    }

    fn correlator(&self) -> Result<Arc<Correlator>, Error> {
        self.ensure_connected()?;
        self.link
            .read()
            .as_ref()
            .map(|link| Arc::clone(&link.correlator))
            .ok_or(Error::NotConnected)
    }

    async fn command(&self, correlator: &Correlator, command: Command) -> Result<Response, Error> {
        correlator.send(&command, self.command_timeout).await
    }

    /// Connect to the broker and run the controller handshake.
    ///
    /// Any failure rolls back to [`ConnectionState::Disconnected`] with no subscriptions left behind.
    #[tracing::instrument(level = "info", skip(self), fields(number = self.number), err)]
    pub async fn connect(&self) -> Result<(), Error> {
        let _lifecycle = self.lifecycle.lock().await;

        if self.connection_state() == ConnectionState::Connected {
            return Ok(());
        }

        let config = self.store.load().map_err(Error::Store)?;
        config.validate()?;
        config.clone_into(&mut self.config.write());

        self.set_state(ConnectionState::Connecting);

        match self.open_link(&config).await {
            Ok(link) => {
                *self.link.write() = Some(link);
                self.set_state(ConnectionState::Connected);
                tracing::info!("Dome connected");
                Ok(())
            }
            Err(err) => {
                self.set_state(ConnectionState::Disconnected);
                Err(err)
            }
        }
    }

    async fn open_link(&self, config: &Config) -> Result<Link, Error> {
        self.transport
            .connect(&config.broker)
            .await
            .map_err(|err| Error::handshake("broker connect", err.into()))?;

        let cancel = CancellationToken::new();

        let mut link = Link {
            correlator: Arc::new(Correlator::new(
                Arc::clone(&self.transport),
                config.broker.topic("commands"),
                cancel.clone(),
            )),
            topics: Vec::new(),
            cancel,
        };

        match self.handshake(&mut link, config).await {
            Ok(()) => Ok(link),
            Err(err) => {
                tracing::error!(%err, "Handshake failed, rolling back");
                self.teardown(link).await;
                Err(err)
            }
        }
    }

    async fn subscribe(
        &self,
        link: &mut Link,
        topic: String,
        handler: MessageHandler,
    ) -> Result<(), Error> {
        self.transport
            .subscribe(&topic, handler)
            .await
            .map_err(|err| Error::handshake(format!("subscribing to {topic}"), err.into()))?;
        link.topics.push(topic);
        Ok(())
    }

    async fn handshake(&self, link: &mut Link, config: &Config) -> Result<(), Error> {
        let telemetry: MessageHandler = {
            let status = Arc::clone(&self.status);
            Arc::new(move |payload: &[u8]| match decode_telemetry(payload) {
                Ok(report) => status.send_modify(|status| status.apply_telemetry(&report)),
                Err(err) => tracing::error!(%err, "Dropping telemetry report"),
            })
        };
        self.subscribe(link, config.broker.topic("telemetry"), telemetry)
            .await?;

        let battery: MessageHandler = {
            let status = Arc::clone(&self.status);
            Arc::new(move |payload: &[u8]| match decode_battery(payload) {
                Ok(report) => status.send_modify(|status| status.apply_battery(&report)),
                Err(err) => tracing::error!(%err, "Dropping battery report"),
            })
        };
        self.subscribe(link, config.broker.topic("battery"), battery)
            .await?;

        let responses: MessageHandler = {
            let correlator = Arc::clone(&link.correlator);
            Arc::new(move |payload: &[u8]| match decode_response_bytes(payload) {
                Ok(response) => correlator.deliver(response),
                Err(err) => tracing::error!(%err, "Dropping controller response"),
            })
        };
        self.subscribe(link, config.broker.topic("responses"), responses)
            .await?;

        let correlator = &*link.correlator;

        if config.use_shutter {
            _ = self
                .handshake_retry
                .run("Connecting shutter", move |timeout| {
                    correlator.send(&CONNECT_SHUTTER, timeout)
                })
                .await
                .map_err(|err| Error::handshake("shutter connect", err))?;

            self.status
                .send_modify(|status| status.shutter_connected = true);
            tracing::info!("Shutter connected");
        }

        _ = self
            .command(correlator, Command::new(CommandCode::Status))
            .await
            .map_err(|err| Error::handshake("status query", err))?;

        let version = self
            .command(correlator, Command::new(CommandCode::Version))
            .await
            .map_err(|err| Error::handshake("firmware version query", err))?;

        match version.value {
            Some(value) => {
                let firmware = value.trim_matches(['(', ')']).to_owned();
                tracing::info!(%firmware, "Controller firmware");
                self.status
                    .send_modify(|status| status.firmware = Some(firmware));
            }
            None => tracing::warn!("Controller didn't report its firmware version"),
        }

        _ = self
            .command(correlator, Command::new(CommandCode::Battery))
            .await
            .map_err(|err| Error::handshake("battery query", err))?;

        for (key, value) in config.controller_parameters() {
            _ = self
                .command(correlator, Command::with_param(CommandCode::Load, key, value))
                .await
                .map_err(|err| Error::handshake(format!("loading {key}"), err))?;
        }

        Ok(())
    }

    async fn teardown(&self, link: Link) {
        link.cancel.cancel();

        for topic in &link.topics {
            if let Err(err) = self.transport.unsubscribe(topic).await {
                tracing::warn!(%topic, %err, "Failed to unsubscribe");
            }
        }

        self.transport.disconnect().await;
        self.status
            .send_modify(|status| status.shutter_connected = false);
    }

    /// Release the shutter controller and close the broker session.
    ///
    /// Does nothing when already disconnected.
    #[tracing::instrument(level = "info", skip(self), fields(number = self.number))]
    pub async fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock().await;

        let Some(link) = self.link.write().take() else {
            return;
        };

        let use_shutter = self.config.read().use_shutter;
        if use_shutter
            && let Err(err) = self
                .command(&link.correlator, Command::new(CommandCode::DisconnectShutter))
                .await
        {
            tracing::warn!(%err, "Failed to release the shutter");
        }

        self.teardown(link).await;
        self.set_state(ConnectionState::Disconnected);
        tracing::info!("Dome disconnected");
    }

    /// Slew to the given azimuth in degrees.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub async fn slew_to_azimuth(&self, azimuth: f64) -> Result<(), Error> {
        let correlator = self.correlator()?;

        if !(0.0..360.0).contains(&azimuth) {
            return Err(Error::InvalidValue(format!(
                "azimuth {azimuth} is outside of [0, 360)"
            )));
        }

        let ticks = self.config.read().angles().degrees_to_ticks(azimuth);
        _ = self
            .command(&correlator, Command::with_value(CommandCode::Goto, ticks))
            .await?;

        self.status.send_modify(|status| status.parked = false);
        Ok(())
    }

    /// Stop any motion.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub async fn abort_slew(&self) -> Result<(), Error> {
        let correlator = self.correlator()?;
        _ = self
            .command(&correlator, Command::new(CommandCode::Abort))
            .await?;
        Ok(())
    }

    /// Rotate to the home sensor.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub async fn find_home(&self) -> Result<(), Error> {
        let correlator = self.correlator()?;
        _ = self
            .command(&correlator, Command::new(CommandCode::Home))
            .await?;
        self.status.send_modify(|status| status.parked = false);
        Ok(())
    }

    /// Rotate to the park position.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub async fn park(&self) -> Result<(), Error> {
        let correlator = self.correlator()?;
        _ = self
            .command(&correlator, Command::new(CommandCode::Park))
            .await?;
        self.status.send_modify(|status| status.parked = true);
        Ok(())
    }

    /// Make the current position the park position, on the controller and in the stored configuration.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub async fn set_park(&self) -> Result<(), Error> {
        let correlator = self.correlator()?;
        let ticks = self.status.borrow().position;

        _ = self
            .command(
                &correlator,
                Command::with_param(CommandCode::Load, "PKPO", ticks),
            )
            .await?;

        let config = {
            let mut config = self.config.write();
            config.park_position = config.angles().ticks_to_degrees(ticks);
            config.clone()
        };

        self.store.save(&config).map_err(Error::Store)?;
        tracing::info!(park_position = config.park_position, "Park position updated");
        Ok(())
    }

    /// Open or close the shutter.
    #[tracing::instrument(level = "debug", skip(self), err)]
    pub async fn set_shutter(&self, command: ShutterCommand) -> Result<(), Error> {
        let correlator = self.correlator()?;

        if !self.config.read().use_shutter {
            return Err(Error::ShutterDisabled);
        }

        let (code, phase) = match command {
            ShutterCommand::Open => (CommandCode::OpenShutter, ShutterPhase::Opening),
            ShutterCommand::Close => (CommandCode::CloseShutter, ShutterPhase::Closing),
        };

        _ = self.command(&correlator, Command::new(code)).await?;
        self.status.send_modify(|status| status.shutter = phase);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zro::config::MemoryStore;
    use crate::zro::testing::{Reply, ScriptedTransport};
    use std::sync::atomic::AtomicU32;
    use tokio::time::Instant;

    const DEFAULT_HANDSHAKE: [&str; 15] = [
        "_X;",
        "_S;",
        "_V;",
        "_B;",
        "_LTICK=10476;",
        "_LTOLE=4;",
        "_LPKPO=0;",
        "_LAZTO=20000;",
        "_LMXSP=200;",
        "_LMNSP=30;",
        "_LBKSP=80;",
        "_LVLTO=10;",
        "_LSHDS=100;",
        "_LPOSH=0;",
        "_LENDV=1;",
    ];

    struct Fixture {
        transport: Arc<ScriptedTransport>,
        store: Arc<MemoryStore>,
        dome: Arc<ZroDome>,
    }

    fn fixture(config: Config) -> eyre::Result<Fixture> {
        let transport = ScriptedTransport::new();
        let store = Arc::new(MemoryStore::new(config));
        let dome = ZroDome::new(
            0,
            Arc::clone(&store) as Arc<dyn ConfigStore>,
            Arc::clone(&transport) as Arc<dyn Transport>,
        )?;
        Ok(Fixture {
            transport,
            store,
            dome: Arc::new(dome),
        })
    }

    fn telemetry(az_state: i32, position: i32) -> String {
        format!(
            r#"{{"az_state":{az_state},"pos":{position},"home":0,"dir":0,"target":{position},"link":80,"temp":9.5,"hum":55.0}}"#
        )
    }

    #[tokio::test(start_paused = true)]
    async fn connect_pushes_configuration_in_order() -> eyre::Result<()> {
        let Fixture {
            transport, dome, ..
        } = fixture(Config::default())?;

        dome.connect().await?;

        assert_eq!(dome.connection_state(), ConnectionState::Connected);
        assert_eq!(transport.published(), DEFAULT_HANDSHAKE);
        assert_eq!(
            transport.subscriptions(),
            ["/ZRO/battery", "/ZRO/responses", "/ZRO/telemetry"]
        );

        let hardware = dome.hardware_status();
        assert_eq!(hardware.firmware.as_deref(), Some("1.2.3"));
        assert!(hardware.shutter_connected);

        // Connecting again is a no-op.
        dome.connect().await?;
        assert_eq!(transport.published().len(), DEFAULT_HANDSHAKE.len());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn shutter_handshake_gives_up_after_ten_attempts() -> eyre::Result<()> {
        let Fixture {
            transport, dome, ..
        } = fixture(Config::default())?;
        transport.respond_with(|wire| match wire {
            "_X;" => vec![],
            _ => vec![Reply::now(format!("_ACK_{};", &wire[1..2]))],
        });

        let started = Instant::now();
        let connect = tokio::spawn({
            let dome = Arc::clone(&dome);
            async move { dome.connect().await }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(dome.connection_state(), ConnectionState::Connecting);

        let err = connect.await?.expect_err("shutter never answers");
        assert!(started.elapsed() >= Duration::from_secs(19));
        assert_eq!(err.ascom_code(), crate::ASCOMErrorCode::new_for_driver(1));

        assert_eq!(transport.published(), ["_X;"; 10]);
        assert_eq!(dome.connection_state(), ConnectionState::Disconnected);
        assert!(transport.subscriptions().is_empty());
        assert!(!transport.is_connected());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn shutter_connects_on_third_attempt() -> eyre::Result<()> {
        let Fixture {
            transport, dome, ..
        } = fixture(Config::default())?;
        let attempts = Arc::new(AtomicU32::new(0));
        transport.respond_with({
            let attempts = Arc::clone(&attempts);
            move |wire| match wire {
                "_X;" if attempts.fetch_add(1, Ordering::Relaxed) < 2 => {
                    vec![Reply::now("_NACK_X;")]
                }
                "_V;" => vec![Reply::now("_ACK_V=(2.1);")],
                _ => vec![Reply::now(format!("_ACK_{};", &wire[1..2]))],
            }
        });

        dome.connect().await?;

        let published = transport.published();
        assert_eq!(published[..4], ["_X;", "_X;", "_X;", "_S;"]);
        assert_eq!(attempts.load(Ordering::Relaxed), 3);
        assert_eq!(dome.hardware_status().firmware.as_deref(), Some("2.1"));
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_parameter_rolls_back() -> eyre::Result<()> {
        let Fixture {
            transport, dome, ..
        } = fixture(Config::default())?;
        transport.respond_with(|wire| match wire {
            "_LMXSP=200;" => vec![Reply::now("_NACK_L;")],
            "_V;" => vec![Reply::now("_ACK_V=(1.0);")],
            _ => vec![Reply::now(format!("_ACK_{};", &wire[1..2]))],
        });

        let err = dome.connect().await.expect_err("MXSP is rejected");

        match &err {
            Error::Handshake { step, source } => {
                assert_eq!(step, "loading MXSP");
                assert!(matches!(**source, Error::CommandRejected('L')));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(transport.published().last().map(String::as_str), Some("_LMXSP=200;"));
        assert_eq!(dome.connection_state(), ConnectionState::Disconnected);
        assert!(transport.subscriptions().is_empty());
        assert!(!transport.is_connected());
        assert!(!dome.hardware_status().shutter_connected);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn unreachable_broker_fails_connect() -> eyre::Result<()> {
        let Fixture {
            transport, dome, ..
        } = fixture(Config::default())?;
        transport.fail_connect(true);

        let err = dome.connect().await.expect_err("broker is down");

        assert_eq!(err.ascom_code(), crate::ASCOMErrorCode::new_for_driver(3));
        assert_eq!(dome.connection_state(), ConnectionState::Disconnected);
        assert!(transport.published().is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_configuration_aborts_connect() -> eyre::Result<()> {
        let Fixture {
            transport, dome, ..
        } = fixture(Config {
            ticks_per_turn: 0,
            ..Config::default()
        })?;

        assert!(matches!(
            dome.connect().await,
            Err(Error::InvalidConfig(_))
        ));
        assert!(!transport.is_connected());
        assert_eq!(dome.connection_state(), ConnectionState::Disconnected);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn commands_require_connection() -> eyre::Result<()> {
        let Fixture {
            transport, dome, ..
        } = fixture(Config::default())?;

        assert!(matches!(
            dome.slew_to_azimuth(90.0).await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(dome.park().await, Err(Error::NotConnected)));
        assert!(matches!(
            dome.set_shutter(ShutterCommand::Open).await,
            Err(Error::NotConnected)
        ));
        assert!(matches!(dome.status(), Err(Error::NotConnected)));
        assert!(transport.published().is_empty());

        // These don't need the controller.
        assert!(dome.capabilities().can_set_azimuth);
        dome.set_slaved(true);
        assert!(dome.slaved());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn slew_sends_goto_in_ticks() -> eyre::Result<()> {
        let Fixture {
            transport, dome, ..
        } = fixture(Config::default())?;
        dome.connect().await?;
        transport.clear_published();

        dome.slew_to_azimuth(90.0).await?;
        assert_eq!(transport.published(), ["_G=2619;"]);

        for bad in [f64::NAN, f64::INFINITY, -1.0, 360.0] {
            assert!(matches!(
                dome.slew_to_azimuth(bad).await,
                Err(Error::InvalidValue(_))
            ));
        }
        assert_eq!(transport.published().len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn telemetry_drives_status() -> eyre::Result<()> {
        let Fixture {
            transport, dome, ..
        } = fixture(Config::default())?;
        dome.connect().await?;
        let mut changes = dome.watch_status();

        transport.inject("/ZRO/telemetry", telemetry(2, 2619).as_bytes());
        assert!(changes.has_changed()?);

        let status = dome.status()?;
        assert!((status.azimuth - 90.0).abs() < 1e-9);
        assert!(status.slewing);

        let before = dome.hardware_status();
        transport.inject("/ZRO/telemetry", br#"{"az_state":"#);
        transport.inject("/ZRO/telemetry", br#"{"az_state":1}"#);
        assert_eq!(dome.hardware_status(), before);

        transport.inject(
            "/ZRO/battery",
            br#"{"batt_voltage":12.5,"batt_current":0.25}"#,
        );
        let hardware = dome.hardware_status();
        assert!((hardware.battery_voltage - 12.5).abs() < f32::EPSILON);
        assert!((hardware.battery_current - 0.25).abs() < f32::EPSILON);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn park_is_reported_until_the_next_motion() -> eyre::Result<()> {
        let Fixture { dome, .. } = fixture(Config::default())?;
        dome.connect().await?;

        dome.park().await?;
        assert!(dome.status()?.at_park);

        dome.slew_to_azimuth(45.0).await?;
        assert!(!dome.status()?.at_park);

        dome.park().await?;
        dome.find_home().await?;
        assert!(!dome.status()?.at_park);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn set_park_persists_current_azimuth() -> eyre::Result<()> {
        let Fixture {
            transport,
            store,
            dome,
        } = fixture(Config::default())?;
        dome.connect().await?;
        transport.inject("/ZRO/telemetry", telemetry(5, 5238).as_bytes());
        transport.clear_published();

        dome.set_park().await?;

        assert_eq!(transport.published(), ["_LPKPO=5238;"]);
        assert!((store.load()?.park_position - 180.0).abs() < 1e-9);
        assert!((dome.config().park_position - 180.0).abs() < 1e-9);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_set_park_keeps_stored_position() -> eyre::Result<()> {
        let Fixture {
            transport,
            store,
            dome,
        } = fixture(Config::default())?;
        dome.connect().await?;
        transport.inject("/ZRO/telemetry", telemetry(5, 5238).as_bytes());
        transport.respond_with(|_| vec![Reply::now("_NACK_L;")]);

        assert!(matches!(
            dome.set_park().await,
            Err(Error::CommandRejected('L'))
        ));
        assert!(store.load()?.park_position.abs() < f64::EPSILON);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn shutter_moves_report_progress() -> eyre::Result<()> {
        let Fixture {
            transport, dome, ..
        } = fixture(Config::default())?;
        dome.connect().await?;
        transport.clear_published();

        dome.set_shutter(ShutterCommand::Open).await?;
        assert_eq!(
            dome.status()?.shutter,
            crate::api::ShutterState::Opening
        );

        dome.set_shutter(ShutterCommand::Close).await?;
        assert_eq!(
            dome.status()?.shutter,
            crate::api::ShutterState::Closing
        );
        assert_eq!(transport.published(), ["_O;", "_C;"]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_shutter_is_left_alone() -> eyre::Result<()> {
        let Fixture {
            transport, dome, ..
        } = fixture(Config {
            use_shutter: false,
            ..Config::default()
        })?;

        dome.connect().await?;
        assert_eq!(transport.published(), DEFAULT_HANDSHAKE[1..]);
        assert!(!dome.capabilities().can_set_shutter);

        transport.clear_published();
        assert!(matches!(
            dome.set_shutter(ShutterCommand::Open).await,
            Err(Error::ShutterDisabled)
        ));

        dome.disconnect().await;
        assert!(transport.published().is_empty());
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_tears_everything_down() -> eyre::Result<()> {
        let Fixture {
            transport, dome, ..
        } = fixture(Config::default())?;
        dome.connect().await?;
        transport.clear_published();

        dome.disconnect().await;

        assert_eq!(transport.published(), ["_Z;"]);
        assert!(transport.subscriptions().is_empty());
        assert!(!transport.is_connected());
        assert_eq!(dome.connection_state(), ConnectionState::Disconnected);
        assert!(matches!(dome.abort_slew().await, Err(Error::NotConnected)));

        // Second disconnect is a no-op.
        dome.disconnect().await;
        assert_eq!(transport.published(), ["_Z;"]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_survives_silent_shutter() -> eyre::Result<()> {
        let Fixture {
            transport, dome, ..
        } = fixture(Config::default())?;
        let dome = Arc::new(
            Arc::into_inner(dome)
                .expect("single owner")
                .with_command_timeout(Duration::from_secs(1)),
        );
        dome.connect().await?;
        transport.respond_with(|_| vec![]);

        dome.disconnect().await;

        assert_eq!(dome.connection_state(), ConnectionState::Disconnected);
        assert!(transport.subscriptions().is_empty());
        Ok(())
    }
}
