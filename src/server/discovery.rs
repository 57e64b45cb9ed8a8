use net_literals::ipv6;
use serde::{Deserialize, Serialize};
use socket2::{Domain, Protocol, Socket, Type};
use std::convert::Infallible;
use std::net::{Ipv6Addr, SocketAddr};
use tokio::net::UdpSocket;

pub(crate) const DISCOVERY_ADDR_V6: Ipv6Addr = ipv6!("ff12::a1:9aca");
pub(crate) const DISCOVERY_MSG: &[u8] = b"alpacadiscovery1";
/// Standard Alpaca discovery port.
pub const DEFAULT_DISCOVERY_PORT: u16 = 32227;

#[derive(Serialize, Deserialize)]
pub(crate) struct AlpacaPort {
    #[serde(rename = "AlpacaPort")]
    pub(crate) alpaca_port: u16,
}

#[tracing::instrument(level = "trace")]
fn bind_socket(addr: SocketAddr) -> eyre::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    // For async code, we need to set the socket to non-blocking mode.
    socket.set_nonblocking(true)?;
    // Reuse address for parallel server instances in e.g. tests.
    socket.set_reuse_address(true)?;
    if addr.is_ipv6() {
        // We want to talk to the IPv4 broadcast address from the same socket.
        socket.set_only_v6(false)?;
    }
    socket.bind(&addr.into())?;
    Ok(UdpSocket::from_std(socket.into())?)
}

/// Alpaca discovery server.
#[derive(Debug, Clone, Copy)]
pub struct DiscoveryServer {
    /// Port of the running Alpaca server.
    pub alpaca_port: u16,
    /// Discovery address to listen on.
    ///
    /// Defaults to `/* Alpaca server address */:32227`.
    pub listen_addr: SocketAddr,
}

/// Discovery server bound to a local socket.
#[derive(Debug)]
pub struct BoundDiscoveryServer {
    socket: UdpSocket,
    response_msg: String,
}

impl DiscoveryServer {
    /// Creates a new discovery server for Alpaca server running at the specified address.
    pub const fn for_alpaca_server_at(alpaca_listen_addr: SocketAddr) -> Self {
        Self {
            alpaca_port: alpaca_listen_addr.port(),
            listen_addr: SocketAddr::new(alpaca_listen_addr.ip(), DEFAULT_DISCOVERY_PORT),
        }
    }

    /// Binds the discovery socket without answering anything yet.
    #[tracing::instrument(level = "debug", err)]
    pub async fn bind(self) -> eyre::Result<BoundDiscoveryServer> {
        let response_msg = serde_json::to_string(&AlpacaPort {
            alpaca_port: self.alpaca_port,
        })?;
        let socket = bind_socket(self.listen_addr)?;
        if self.listen_addr.is_ipv6() {
            socket.join_multicast_v6(&DISCOVERY_ADDR_V6, 0)?;
        }
        tracing::debug!(addr = %socket.local_addr()?, "Bound Alpaca discovery server");
        Ok(BoundDiscoveryServer {
            socket,
            response_msg,
        })
    }
}

impl BoundDiscoveryServer {
    /// Address the discovery socket is actually bound to.
    pub fn listen_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Answers discovery probes forever.
    ///
    /// Unknown packets are ignored; I/O errors are logged and the loop keeps going.
    pub async fn start(self) -> Infallible {
        let mut buf = [0; DISCOVERY_MSG.len() + 1];
        loop {
            if let Err(err) = async {
                let (len, src) = self.socket.recv_from(&mut buf).await?;
                let data = &buf[..len];
                if data == DISCOVERY_MSG {
                    tracing::debug!(%src, "Received Alpaca discovery request");
                    eyre::ensure!(
                        self.socket
                            .send_to(self.response_msg.as_bytes(), src)
                            .await?
                            == self.response_msg.len(),
                        "Failed to send discovery response",
                    );
                } else {
                    tracing::warn!(%src, "Received unknown discovery packet");
                }
                Ok(())
            }
            .await
            {
                tracing::error!(%err, "Error while handling a discovery request");
            }
        }
    }
}
