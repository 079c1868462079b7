//! Probe reply record.

use crate::CodecError;
use crate::mac::MacAddr;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// The structured record a peer returns when its inbox is probed.
///
/// The probe request carries no body beyond connection establishment; the
/// reply is this record. `mac_address` is mandatory and is the field a
/// resolver checks against the target identity. Everything else is
/// peer-supplied detail; unknown extra fields are ignored so newer peers
/// stay compatible with older resolvers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    /// Hardware address the responder claims to own
    pub mac_address: MacAddr,

    /// Display name the responder advertises
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Routable IPv4 address the responder advertises
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4_addr: Option<Ipv4Addr>,

    /// Inbox port the responder listens on
    pub port: u16,
}

impl ContactInfo {
    /// Serialize the record to its wire form
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(self).map_err(|e| CodecError::Encode(e.to_string()))
    }

    /// Parse a record from its wire form
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if the bytes are not a valid record.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let info = ContactInfo {
            mac_address: "AA:BB:CC:DD:EE:FF".parse().unwrap(),
            name: Some("jorge".to_string()),
            ipv4_addr: Some(Ipv4Addr::new(10, 0, 0, 5)),
            port: 42000,
        };

        let bytes = info.to_bytes().unwrap();
        let decoded = ContactInfo::from_bytes(&bytes).unwrap();
        assert_eq!(info, decoded);
    }

    #[test]
    fn test_minimal_record() {
        let decoded =
            ContactInfo::from_bytes(br#"{"mac_address":"AA:BB:CC:DD:EE:FF","port":42000}"#)
                .unwrap();
        assert_eq!(decoded.mac_address.to_string(), "AA:BB:CC:DD:EE:FF");
        assert_eq!(decoded.port, 42000);
        assert!(decoded.name.is_none());
        assert!(decoded.ipv4_addr.is_none());
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let decoded = ContactInfo::from_bytes(
            br#"{"mac_address":"AA:BB:CC:DD:EE:FF","port":1,"capabilities":["chat"]}"#,
        )
        .unwrap();
        assert_eq!(decoded.port, 1);
    }

    #[test]
    fn test_missing_mac_is_malformed() {
        assert!(ContactInfo::from_bytes(br#"{"port":42000}"#).is_err());
    }

    #[test]
    fn test_garbage_is_malformed() {
        assert!(ContactInfo::from_bytes(b"not json at all").is_err());
        assert!(ContactInfo::from_bytes(b"").is_err());
    }
}
