//! # Peerline Core
//!
//! Ties the Peerline layers together: the contact model, the seams the
//! surrounding application plugs into (contact store, own network
//! identity), and the task runner that executes resolutions and
//! transfers as independent units of work.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                       peerline-core                        │
//! │   contacts, collaborator seams, task runner                │
//! ├──────────────────────────────┬─────────────────────────────┤
//! │      peerline-discovery      │      peerline-transfer      │
//! │   probes, rendezvous,        │   file sessions,            │
//! │   address resolution         │   transfer workers          │
//! ├──────────────────────────────┴─────────────────────────────┤
//! │                       peerline-proto                       │
//! │   hardware addresses, wire records                         │
//! └────────────────────────────────────────────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contact;
pub mod runner;

pub use contact::{Contact, ContactStore, MemoryContactStore, NetworkInfo};
pub use runner::{RunnerError, TaskHandle, TaskRunner};

// The layers callers usually need alongside the core types.
pub use peerline_discovery as discovery;
pub use peerline_proto as proto;
pub use peerline_transfer as transfer;
