//! # Peerline Proto
//!
//! Wire-level types shared by the Peerline discovery and transfer layers.
//!
//! This crate provides:
//! - Hardware (MAC) address parsing and canonical formatting
//! - IPv6 link-local address derivation (EUI-64 expansion)
//! - The probe reply record exchanged during contact discovery
//! - Rendezvous directory request/reply messages
//!
//! All records cross the wire as JSON with snake_case string keys, so a
//! reply produced by any conforming peer parses here regardless of which
//! extra fields it carries.
//!
//! ## Example
//!
//! ```rust
//! use peerline_proto::{MacAddr, link_local_from_mac};
//!
//! let mac: MacAddr = "AA:BB:CC:DD:EE:FF".parse().unwrap();
//! let addr = link_local_from_mac(mac);
//! assert!(addr.is_unicast_link_local());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contact_info;
pub mod linklocal;
pub mod mac;
pub mod rendezvous;

pub use contact_info::ContactInfo;
pub use linklocal::link_local_from_mac;
pub use mac::{MacAddr, MacParseError};
pub use rendezvous::{
    ClientRecord, RendezvousEnvelope, RendezvousReply, RendezvousRequest, ReplyStatus,
};

/// Errors produced while encoding or decoding wire records
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Record could not be serialized
    #[error("encode error: {0}")]
    Encode(String),

    /// Bytes on the wire did not form a valid record
    #[error("decode error: {0}")]
    Decode(String),
}
