mod case_insensitive_str;

mod discovery;
pub use discovery::{BoundDiscoveryServer, DEFAULT_DISCOVERY_PORT, DiscoveryServer};

mod error;
pub(crate) use error::{Error, Result};

mod params;
pub(crate) use params::ActionParams;

mod response;
use response::ManagementValue;

mod transaction;
pub use transaction::TransactionCounter;
use transaction::{RequestTransaction, ResponseTransaction, ResponseWithTransaction};


use crate::Devices;
use crate::api::ServerInfo;
use axum::Router;
use axum::extract::{FromRequest, Path, Request};
use axum::response::IntoResponse;
use axum::routing::{MethodFilter, get, on};
use net_literals::addr;
use std::convert::Infallible;
use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::Instrument;

/// The Alpaca server.
#[derive(Debug)]
pub struct Server {
    /// Registered devices.
    pub devices: Devices,
    /// General server information.
    pub info: ServerInfo,
    /// Address for the server to listen on.
    pub listen_addr: SocketAddr,
    /// Port for the discovery server to listen on.
    pub discovery_port: u16,
    /// Source of server transaction IDs.
    pub transactions: TransactionCounter,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            devices: Devices::default(),
            info: ServerInfo::default(),
            listen_addr: addr!("[::]:0"),
            discovery_port: DEFAULT_DISCOVERY_PORT,
            transactions: TransactionCounter::default(),
        }
    }
}

struct ServerHandler {
    path: String,
    params: ActionParams,
}

impl<S: Send + Sync> FromRequest<S> for ServerHandler {
    type Rejection = axum::response::Response;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let path = req.uri().path().to_owned();
        let params = ActionParams::from_request(req, state).await?;
        Ok(Self { path, params })
    }
}

impl ServerHandler {
    async fn exec<Resp, RespFut: Future<Output = Resp>>(
        mut self,
        transactions: &TransactionCounter,
        require_client_transaction: bool,
        make_response: impl FnOnce(ActionParams) -> RespFut,
    ) -> axum::response::Response
    where
        ResponseWithTransaction<Resp>: IntoResponse,
    {
        let request_transaction =
            match RequestTransaction::extract(&mut self.params, require_client_transaction) {
                Ok(transaction) => transaction,
                Err(err) => {
                    tracing::warn!(path = %self.path, %err, "Rejecting request");
                    return err.into_response();
                }
            };

        let transaction =
            ResponseTransaction::new(request_transaction.client_transaction_id, transactions);

        let span = tracing::error_span!(
            "Alpaca transaction",
            path = %self.path,
            client_id = request_transaction.client_id,
            client_transaction_id = request_transaction.client_transaction_id,
            server_transaction_id = transaction.server_transaction_id,
        );

        async move {
            tracing::debug!(params = ?self.params, "Received request");

            ResponseWithTransaction {
                transaction,
                response: make_response(self.params).await,
            }
            .into_response()
        }
        .instrument(span)
        .await
    }
}

impl Server {
    /// Create a server with the given information and no devices.
    pub fn new(info: ServerInfo) -> Self {
        Self {
            info,
            ..Default::default()
        }
    }

    /// Binds the Alpaca and discovery servers to local ports.
    ///
    /// The discovery server is bound only once the Alpaca server is bound successfully,
    /// so that it can advertise the actual port.
    pub async fn bind(self) -> eyre::Result<BoundServer> {
        tracing::debug!(addr = %self.listen_addr, "Binding Alpaca server");

        let listener = TcpListener::bind(self.listen_addr).await?;

        // The address can differ e.g. when using port 0 (auto-assigned).
        let listen_addr = listener.local_addr()?;

        tracing::info!(%listen_addr, "Bound Alpaca server");

        let discovery = DiscoveryServer {
            alpaca_port: listen_addr.port(),
            listen_addr: SocketAddr::new(listen_addr.ip(), self.discovery_port),
        }
        .bind()
        .await?;

        Ok(BoundServer {
            listener,
            listen_addr,
            router: self.into_router(),
            discovery,
        })
    }

    fn into_router(self) -> Router {
        let devices = Arc::new(self.devices);
        let server_info = Arc::new(self.info);
        let transactions = self.transactions;

        Router::new()
            .route("/management/apiversions", {
                let transactions = transactions.clone();

                get(move |server_handler: ServerHandler| async move {
                    server_handler
                        .exec(&transactions, false, |_params| async {
                            ManagementValue([1_u32])
                        })
                        .await
                })
            })
            .route("/management/v1/configureddevices", {
                let devices = Arc::clone(&devices);
                let transactions = transactions.clone();

                get(move |server_handler: ServerHandler| async move {
                    server_handler
                        .exec(&transactions, false, |_params| async move {
                            ManagementValue(devices.configured_devices())
                        })
                        .await
                })
            })
            .route("/management/v1/description", {
                let transactions = transactions.clone();

                get(move |server_handler: ServerHandler| async move {
                    server_handler
                        .exec(&transactions, false, |_params| async move {
                            ManagementValue(server_info)
                        })
                        .await
                })
            })
            .route(
                "/api/v1/{device_type}/{device_number}/{action}",
                on(
                    MethodFilter::GET.or(MethodFilter::PUT),
                    move |Path((device_type, device_number, action)): Path<(
                        String,
                        usize,
                        String,
                    )>,
                          server_handler: ServerHandler| async move {
                        server_handler
                            .exec(&transactions, true, |params| async move {
                                devices
                                    .handle_action(&device_type, device_number, &action, params)
                                    .await
                            })
                            .await
                    },
                ),
            )
    }
}

/// Alpaca and discovery servers bound to local ports and ready to be started.
#[derive(derive_more::Debug)]
pub struct BoundServer {
    #[debug(skip)]
    listener: TcpListener,
    listen_addr: SocketAddr,
    #[debug(skip)]
    router: Router,
    discovery: BoundDiscoveryServer,
}

impl BoundServer {
    /// Address the Alpaca server is listening on.
    pub const fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    /// Address the discovery server is listening on.
    pub fn discovery_listen_addr(&self) -> std::io::Result<SocketAddr> {
        self.discovery.listen_addr()
    }

    /// Starts the Alpaca and discovery servers.
    ///
    /// Note: this function starts an infinite async loop and it's your responsibility to spawn it off
    /// via [`tokio::spawn`] if necessary.
    pub async fn start(self) -> eyre::Result<Infallible> {
        tracing::debug!("Starting Alpaca main and discovery servers");

        tokio::select! {
            result = axum::serve(self.listener, self.router).into_future() => {
                result?;
                eyre::bail!("Alpaca server stopped unexpectedly")
            }
            never_returns = self.discovery.start() => match never_returns {},
        }
    }
}
