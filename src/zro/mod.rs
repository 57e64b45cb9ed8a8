/*!
Driver for the ZRO observatory dome controller.

The controller listens for commands on `<root>/commands` and answers each of them on
`<root>/responses`. It also publishes periodic reports on `<root>/telemetry` and
`<root>/battery`. Commands are strictly sequential: a new one is sent only once the
previous one was answered or timed out.

[`ZroDome`] implements the Alpaca [`Dome`](crate::api::Dome) interface on top of that exchange.
*/

mod angle;
pub use angle::{AngleConverter, FULL_TURN, normalize_angle};

pub mod codec;

mod config;
pub use config::{BrokerConfig, Config, ConfigStore, InvalidConfig, JsonFileStore, MemoryStore};

mod correlator;
pub use correlator::Correlator;

mod dome;

mod driver;
pub use driver::{DEFAULT_COMMAND_TIMEOUT, ShutterCommand, ZroDome};

mod error;
pub use error::Error;

mod retry;
pub use retry::RetryPolicy;

mod status;
pub use status::{ConnectionState, DomeCapabilities, DomeStatus, HardwareStatus, ShutterPhase};

mod transport;
pub use transport::{MessageHandler, MqttTransport, Transport, TransportError};

#[cfg(test)]
pub(crate) mod testing;
