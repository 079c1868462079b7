//! Rendezvous directory protocol messages.
//!
//! Peers that cannot find each other on the local segment fall back to a
//! rendezvous directory server. Four request kinds exist: `SignUp`
//! registers this node's identity, `GetByMac`/`GetByUsername` look another
//! peer up, and `Drop` removes a stale address entry. Every request is
//! wrapped in an envelope carrying the shared password credential.

use crate::CodecError;
use crate::mac::MacAddr;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

/// A request to the rendezvous directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum RendezvousRequest {
    /// Register this node's identity with the directory.
    ///
    /// Idempotent: repeated sign-up with the same hardware address
    /// overwrites the prior registration.
    SignUp {
        /// Hardware address being registered
        mac: MacAddr,
        /// Display name being registered
        name: String,
        /// Inbox port other peers should probe
        port: u16,
        /// When set, the directory answers lookups for this entry only by
        /// hardware address, never by username
        get_only_by_mac: bool,
    },

    /// Look a peer up by hardware address
    GetByMac {
        /// Hardware address to look up
        mac: MacAddr,
    },

    /// Look a peer up by registered username
    GetByUsername {
        /// Username to look up
        username: String,
    },

    /// Remove a stale address entry associated with the caller's identity
    Drop {
        /// Address the directory should forget
        address: IpAddr,
    },
}

impl RendezvousRequest {
    /// The request kind name, for trace logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RendezvousRequest::SignUp { .. } => "sign_up",
            RendezvousRequest::GetByMac { .. } => "get_by_mac",
            RendezvousRequest::GetByUsername { .. } => "get_by_username",
            RendezvousRequest::Drop { .. } => "drop",
        }
    }
}

/// Credential envelope a request travels in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendezvousEnvelope {
    /// Shared password credential for the directory
    pub password: String,

    /// The wrapped request
    #[serde(flatten)]
    pub request: RendezvousRequest,
}

impl RendezvousEnvelope {
    /// Wrap a request with a credential
    #[must_use]
    pub fn new(password: impl Into<String>, request: RendezvousRequest) -> Self {
        Self {
            password: password.into(),
            request,
        }
    }

    /// Serialize the envelope to its wire form
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Parse an envelope from its wire form
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if the bytes are not a valid envelope.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Directory outcome code carried in every reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    /// Request processed
    Ok,
    /// Credential rejected
    AuthFailure,
    /// Request understood but could not be processed
    Error,
}

/// The directory's best-known address for a looked-up identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    /// Last address the identity signed up from
    pub ipv4_addr: Ipv4Addr,
    /// Inbox port the identity registered
    pub port: u16,
}

/// A reply from the rendezvous directory.
///
/// For lookup requests, `client` carries the directory's suggestion; its
/// absence means the identity is unknown to the directory, which is a
/// successful empty reply rather than an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendezvousReply {
    /// Outcome of the request
    pub status: ReplyStatus,

    /// Suggested address record, on successful lookups only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientRecord>,

    /// Optional human-readable detail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RendezvousReply {
    /// Serialize the reply to its wire form
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Parse a reply from its wire form
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if the bytes are not a valid reply.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac() -> MacAddr {
        "AA:BB:CC:DD:EE:FF".parse().unwrap()
    }

    #[test]
    fn test_sign_up_roundtrip() {
        let env = RendezvousEnvelope::new(
            "hunter2",
            RendezvousRequest::SignUp {
                mac: mac(),
                name: "jorge".to_string(),
                port: 42000,
                get_only_by_mac: false,
            },
        );

        let bytes = env.to_bytes().unwrap();
        let decoded = RendezvousEnvelope::from_bytes(&bytes).unwrap();
        assert_eq!(env, decoded);
    }

    #[test]
    fn test_get_by_mac_wire_shape() {
        let env = RendezvousEnvelope::new("pw", RendezvousRequest::GetByMac { mac: mac() });
        let value: serde_json::Value =
            serde_json::from_slice(&env.to_bytes().unwrap()).unwrap();

        assert_eq!(value["request"], "get_by_mac");
        assert_eq!(value["mac"], "AA:BB:CC:DD:EE:FF");
        assert_eq!(value["password"], "pw");
    }

    #[test]
    fn test_drop_roundtrip() {
        let env = RendezvousEnvelope::new(
            "pw",
            RendezvousRequest::Drop {
                address: "10.0.0.9".parse().unwrap(),
            },
        );
        let decoded = RendezvousEnvelope::from_bytes(&env.to_bytes().unwrap()).unwrap();
        assert_eq!(env, decoded);
    }

    #[test]
    fn test_reply_with_client() {
        let reply = RendezvousReply {
            status: ReplyStatus::Ok,
            client: Some(ClientRecord {
                ipv4_addr: Ipv4Addr::new(10, 0, 0, 9),
                port: 42000,
            }),
            message: None,
        };

        let decoded = RendezvousReply::from_bytes(&reply.to_bytes().unwrap()).unwrap();
        assert_eq!(reply, decoded);
    }

    #[test]
    fn test_empty_reply_means_unknown() {
        let decoded = RendezvousReply::from_bytes(br#"{"status":"ok"}"#).unwrap();
        assert_eq!(decoded.status, ReplyStatus::Ok);
        assert!(decoded.client.is_none());
    }

    #[test]
    fn test_auth_failure_status() {
        let decoded =
            RendezvousReply::from_bytes(br#"{"status":"auth_failure","message":"bad password"}"#)
                .unwrap();
        assert_eq!(decoded.status, ReplyStatus::AuthFailure);
    }

    #[test]
    fn test_request_kind_names() {
        assert_eq!(
            RendezvousRequest::GetByMac { mac: mac() }.kind(),
            "get_by_mac"
        );
        assert_eq!(
            RendezvousRequest::GetByUsername {
                username: "x".to_string()
            }
            .kind(),
            "get_by_username"
        );
    }
}
