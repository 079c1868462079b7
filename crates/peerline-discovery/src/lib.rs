//! # Peerline Discovery
//!
//! Contact discovery layer for Peerline.
//!
//! This crate provides:
//! - Inbox probes: one timeout-bound request/response exchange per address
//! - A rendezvous directory client (sign-up, lookup, drop)
//! - The address resolver: an ordered fallback chain that converges on a
//!   verified address for a named contact
//!
//! ## Resolution order
//!
//! 1. Advertised IPv4 address
//! 2. Advertised IPv6 address
//! 3. IPv6 link-local address derived from the contact's hardware address
//! 4. Rendezvous directory lookup, last resort only
//!
//! A reply only satisfies a branch when the responder's hardware address
//! matches the contact being resolved; anything else falls through to the
//! next branch.
//!
//! ## Example
//!
//! ```rust,no_run
//! use peerline_discovery::{DEFAULT_PROBE_TIMEOUT, Resolver, ResolveTarget};
//!
//! # async fn run() {
//! let resolver = Resolver::new(DEFAULT_PROBE_TIMEOUT, None);
//! let target = ResolveTarget {
//!     name: "laptop".to_string(),
//!     mac: "AA:BB:CC:DD:EE:FF".parse().unwrap(),
//!     ipv4: Some("10.0.0.5".parse().unwrap()),
//!     ipv6: None,
//!     port: 42000,
//! };
//!
//! match resolver.resolve(&target).await {
//!     Ok(res) => println!("{} answers at {}:{}", target.name, res.addr, res.port),
//!     Err(e) => println!("{e}"),
//! }
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod probe;
pub mod rendezvous;
pub mod resolver;

pub use probe::{ProbeError, Prober, TcpProber};
pub use rendezvous::{Directory, RendezvousClient, RendezvousEndpoint, RendezvousError};
pub use resolver::{
    DEFAULT_PROBE_TIMEOUT, Resolution, ResolveTarget, Resolver, Unresolvable,
};
