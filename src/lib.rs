/*!
ASCOM Alpaca server for the ZRO observatory dome.

The crate has three layers:

- [`zro`] talks to the dome controller over MQTT and keeps a live snapshot of its state;
- [`api`] declares the Alpaca device interfaces and the registry of served devices;
- [`server`] exposes registered devices over the Alpaca REST API and answers discovery probes.

## Usage

```no_run
use std::sync::Arc;
use zro_alpaca::Server;
use zro_alpaca::api::ServerInfo;
use zro_alpaca::zro::{JsonFileStore, MqttTransport, ZroDome};

# async fn run() -> eyre::Result<()> {
let store = Arc::new(JsonFileStore::open("zro-dome.json")?);
let transport = Arc::new(MqttTransport::new("zro-alpaca"));

let mut server = Server::new(ServerInfo::default());
server.devices.register(ZroDome::new(0, store, transport)?)?;

let server = server.bind().await?;
match server.start().await? {}
# }
```
*/

pub mod api;
mod errors;
pub(crate) mod macros;
pub mod server;
pub mod zro;

#[cfg(test)]
mod test_utils;

pub use api::Devices;
pub use errors::{ASCOMError, ASCOMErrorCode, ASCOMResult};
pub use server::{BoundServer, Server};
