//! Serves the ZRO dome over Alpaca, using `zro-dome.json` (or `$ZRO_DOME_CONFIG`) for its settings.

use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use zro_alpaca::Server;
use zro_alpaca::api::{CargoServerInfo, Dome};
use zro_alpaca::zro::{ConfigStore, JsonFileStore, MqttTransport, Transport, ZroDome};

const DEFAULT_CONFIG_PATH: &str = "zro-dome.json";
const ALPACA_PORT: u16 = 8090;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,zro_alpaca=debug")),
        )
        .init();

    let config_path =
        std::env::var("ZRO_DOME_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());

    let store: Arc<dyn ConfigStore> = Arc::new(JsonFileStore::open(&config_path)?);
    let transport: Arc<dyn Transport> =
        Arc::new(MqttTransport::new(format!("zro-alpaca-{}", std::process::id())));
    let dome = Arc::new(ZroDome::new(0, store, transport)?);

    let mut server = Server::new(CargoServerInfo!());
    server.listen_addr = (Ipv4Addr::UNSPECIFIED, ALPACA_PORT).into();
    server.devices.register(Arc::clone(&dome) as Arc<dyn Dome>)?;

    let server = server.bind().await?;
    tracing::info!(addr = %server.listen_addr(), config = %config_path, "Serving ZRO dome");

    tokio::select! {
        result = server.start() => match result? {},
        result = tokio::signal::ctrl_c() => result?,
    }

    tracing::info!("Shutting down");
    dome.disconnect().await;
    Ok(())
}
