//! Rendezvous directory client.
//!
//! Sends credentialed requests to the directory server and parses its
//! structured reply. Lookups that find nothing are successful empty
//! replies; only transport failures, unparseable replies, and rejected
//! credentials are errors.

use peerline_proto::{
    ClientRecord, MacAddr, RendezvousEnvelope, RendezvousReply, RendezvousRequest, ReplyStatus,
};
use std::io;
use std::net::IpAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;

/// Errors a directory request can fail with
#[derive(Debug, Clone, thiserror::Error)]
pub enum RendezvousError {
    /// The server did not answer within the timeout
    #[error("rendezvous server {addr}:{port} unreachable")]
    Unreachable {
        /// Server address
        addr: IpAddr,
        /// Server port
        port: u16,
    },

    /// Transport-level failure talking to the server
    #[error("network error talking to rendezvous server: {0}")]
    Network(String),

    /// The reply could not be parsed
    #[error("malformed rendezvous reply: {0}")]
    Malformed(String),

    /// The server rejected the shared password credential
    #[error("rendezvous server rejected credentials")]
    AuthFailure,

    /// The server reported a request-level failure
    #[error("rendezvous server error: {0}")]
    Server(String),
}

/// Where a rendezvous directory lives and how to authenticate to it
#[derive(Debug, Clone)]
pub struct RendezvousEndpoint {
    /// Server address
    pub addr: IpAddr,
    /// Server port
    pub port: u16,
    /// Shared password credential
    pub password: String,
}

/// Capability to look a peer up in a directory.
///
/// The resolver is generic over this trait so the rendezvous branch can be
/// exercised without a live server.
pub trait Directory: Send + Sync {
    /// Ask the directory for its best-known address for `mac`.
    ///
    /// `Ok(None)` means the identity is unknown to the directory.
    fn lookup_by_mac(
        &self,
        mac: MacAddr,
    ) -> impl Future<Output = Result<Option<ClientRecord>, RendezvousError>> + Send;
}

/// Client for a rendezvous directory server
#[derive(Debug, Clone)]
pub struct RendezvousClient {
    endpoint: RendezvousEndpoint,
    timeout: Duration,
}

impl RendezvousClient {
    /// Create a client for the given endpoint
    #[must_use]
    pub fn new(endpoint: RendezvousEndpoint, timeout: Duration) -> Self {
        Self { endpoint, timeout }
    }

    /// The endpoint this client talks to
    #[must_use]
    pub fn endpoint(&self) -> &RendezvousEndpoint {
        &self.endpoint
    }

    /// Send one request and parse the reply.
    ///
    /// # Errors
    ///
    /// Fails with [`RendezvousError::Unreachable`] on timeout,
    /// [`RendezvousError::Malformed`] on an unparseable reply, and
    /// [`RendezvousError::AuthFailure`] when the credential is rejected.
    pub async fn send(&self, request: RendezvousRequest) -> Result<RendezvousReply, RendezvousError> {
        let kind = request.kind();
        tracing::debug!(
            server = %self.endpoint.addr,
            port = self.endpoint.port,
            kind,
            "sending rendezvous request"
        );

        let envelope = RendezvousEnvelope::new(self.endpoint.password.clone(), request);
        let bytes = envelope
            .to_bytes()
            .map_err(|e| RendezvousError::Malformed(e.to_string()))?;

        let exchange = async {
            let mut stream =
                TcpStream::connect((self.endpoint.addr, self.endpoint.port)).await?;
            stream.write_all(&bytes).await?;
            stream.shutdown().await?;

            let mut reply = Vec::new();
            stream.read_to_end(&mut reply).await?;
            Ok::<_, io::Error>(reply)
        };

        let reply = time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| RendezvousError::Unreachable {
                addr: self.endpoint.addr,
                port: self.endpoint.port,
            })?
            .map_err(|e| RendezvousError::Network(e.to_string()))?;

        let reply = RendezvousReply::from_bytes(&reply)
            .map_err(|e| RendezvousError::Malformed(e.to_string()))?;

        match reply.status {
            ReplyStatus::Ok => Ok(reply),
            ReplyStatus::AuthFailure => Err(RendezvousError::AuthFailure),
            ReplyStatus::Error => Err(RendezvousError::Server(
                reply.message.unwrap_or_else(|| "unspecified".to_string()),
            )),
        }
    }

    /// Register this node's identity with the directory.
    ///
    /// Repeated sign-up with the same hardware address overwrites the
    /// prior registration.
    ///
    /// # Errors
    ///
    /// See [`RendezvousClient::send`].
    pub async fn sign_up(
        &self,
        mac: MacAddr,
        name: impl Into<String>,
        port: u16,
        get_only_by_mac: bool,
    ) -> Result<RendezvousReply, RendezvousError> {
        self.send(RendezvousRequest::SignUp {
            mac,
            name: name.into(),
            port,
            get_only_by_mac,
        })
        .await
    }

    /// Look a peer up by hardware address
    ///
    /// # Errors
    ///
    /// See [`RendezvousClient::send`].
    pub async fn get_by_mac(&self, mac: MacAddr) -> Result<RendezvousReply, RendezvousError> {
        self.send(RendezvousRequest::GetByMac { mac }).await
    }

    /// Look a peer up by username
    ///
    /// # Errors
    ///
    /// See [`RendezvousClient::send`].
    pub async fn get_by_username(
        &self,
        username: impl Into<String>,
    ) -> Result<RendezvousReply, RendezvousError> {
        self.send(RendezvousRequest::GetByUsername {
            username: username.into(),
        })
        .await
    }

    /// Ask the directory to forget an address entry
    ///
    /// # Errors
    ///
    /// See [`RendezvousClient::send`].
    pub async fn drop_address(&self, address: IpAddr) -> Result<RendezvousReply, RendezvousError> {
        self.send(RendezvousRequest::Drop { address }).await
    }
}

impl Directory for RendezvousClient {
    async fn lookup_by_mac(
        &self,
        mac: MacAddr,
    ) -> Result<Option<ClientRecord>, RendezvousError> {
        Ok(self.get_by_mac(mac).await?.client)
    }
}
