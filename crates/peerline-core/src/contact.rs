//! Contacts and the collaborator seams around them.
//!
//! A contact's hardware address is its stable identity; the IP addresses
//! are hints that resolution verifies or replaces. Persistence itself
//! lives behind [`ContactStore`]: the resolver's callers only need
//! lookup, and anything from a flat config file to a real database can
//! sit behind the trait.

use peerline_discovery::ResolveTarget;
use peerline_proto::MacAddr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{Ipv4Addr, Ipv6Addr};

/// A known peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Display name, unique among this node's contacts
    pub name: String,

    /// Hardware address - the stable identity key
    pub mac: MacAddr,

    /// Advertised IPv4 address; may be stale or absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv4: Option<Ipv4Addr>,

    /// Advertised IPv6 address; may be stale or absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ipv6: Option<Ipv6Addr>,

    /// Inbox port the contact listens on
    pub port: u16,
}

impl Contact {
    /// The resolution target for this contact
    #[must_use]
    pub fn resolve_target(&self) -> ResolveTarget {
        ResolveTarget {
            name: self.name.clone(),
            mac: self.mac,
            ipv4: self.ipv4,
            ipv6: self.ipv6,
            port: self.port,
        }
    }
}

/// Read access to the contact database
pub trait ContactStore: Send + Sync {
    /// Look a contact up by hardware address
    fn get_by_mac(&self, mac: MacAddr) -> Option<Contact>;

    /// Look a contact up by display name
    fn get_by_name(&self, name: &str) -> Option<Contact>;

    /// All known contacts, ordered by name
    fn list(&self) -> Vec<Contact>;
}

/// Contact store held entirely in memory, loaded from configuration
#[derive(Debug, Clone, Default)]
pub struct MemoryContactStore {
    by_name: BTreeMap<String, Contact>,
}

impl MemoryContactStore {
    /// Build a store from a list of contacts.
    ///
    /// Later duplicates of a name replace earlier ones.
    #[must_use]
    pub fn new(contacts: impl IntoIterator<Item = Contact>) -> Self {
        Self {
            by_name: contacts
                .into_iter()
                .map(|c| (c.name.clone(), c))
                .collect(),
        }
    }
}

impl ContactStore for MemoryContactStore {
    fn get_by_mac(&self, mac: MacAddr) -> Option<Contact> {
        self.by_name.values().find(|c| c.mac == mac).cloned()
    }

    fn get_by_name(&self, name: &str) -> Option<Contact> {
        self.by_name.get(name).cloned()
    }

    fn list(&self) -> Vec<Contact> {
        self.by_name.values().cloned().collect()
    }
}

/// This node's own identity on the network, used when registering with a
/// rendezvous directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkInfo {
    /// Display name other peers see
    pub name: String,
    /// This node's hardware address
    pub mac: MacAddr,
    /// Inbox port this node listens on
    pub port: u16,
}
