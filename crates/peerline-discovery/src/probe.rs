//! Inbox probe - one timeout-bound request/response exchange.
//!
//! A probe opens a TCP connection to a peer's inbox; connection
//! establishment itself is the request, and the peer answers with a
//! [`ContactInfo`] record before closing. Probes never retry internally:
//! retry policy belongs to the resolver driving the probe sequence.

use peerline_proto::ContactInfo;
use std::io;
use std::net::IpAddr;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time;

/// Errors a single probe can fail with
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    /// No reply arrived within the timeout
    #[error("no reply from {addr}:{port} within {timeout:?}")]
    Unreachable {
        /// Probed address
        addr: IpAddr,
        /// Probed port
        port: u16,
        /// Timeout that elapsed
        timeout: Duration,
    },

    /// The peer actively refused the connection
    #[error("connection refused by {addr}:{port}")]
    ConnectionRefused {
        /// Probed address
        addr: IpAddr,
        /// Probed port
        port: u16,
    },

    /// Some other transport failure
    #[error("network error probing {addr}:{port}: {detail}")]
    Network {
        /// Probed address
        addr: IpAddr,
        /// Probed port
        port: u16,
        /// Transport error detail
        detail: String,
    },

    /// The reply could not be parsed as a contact record
    #[error("malformed reply from {addr}:{port}: {detail}")]
    Malformed {
        /// Probed address
        addr: IpAddr,
        /// Probed port
        port: u16,
        /// Parse error detail
        detail: String,
    },
}

/// Capability to probe a peer inbox.
///
/// The resolver is generic over this trait so its branch logic can be
/// exercised without opening sockets.
pub trait Prober: Send + Sync {
    /// Probe `addr:port`, waiting at most `timeout` for the full exchange
    fn probe(
        &self,
        addr: IpAddr,
        port: u16,
        timeout: Duration,
    ) -> impl Future<Output = Result<ContactInfo, ProbeError>> + Send;
}

/// The production prober: one TCP exchange per probe
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProber;

impl Prober for TcpProber {
    async fn probe(
        &self,
        addr: IpAddr,
        port: u16,
        timeout: Duration,
    ) -> Result<ContactInfo, ProbeError> {
        let exchange = async {
            let mut stream = TcpStream::connect((addr, port)).await?;
            let mut reply = Vec::new();
            stream.read_to_end(&mut reply).await?;
            Ok::<_, io::Error>(reply)
        };

        let reply = time::timeout(timeout, exchange)
            .await
            .map_err(|_| ProbeError::Unreachable {
                addr,
                port,
                timeout,
            })?
            .map_err(|e| match e.kind() {
                io::ErrorKind::ConnectionRefused => ProbeError::ConnectionRefused { addr, port },
                _ => ProbeError::Network {
                    addr,
                    port,
                    detail: e.to_string(),
                },
            })?;

        ContactInfo::from_bytes(&reply).map_err(|e| ProbeError::Malformed {
            addr,
            port,
            detail: e.to_string(),
        })
    }
}
