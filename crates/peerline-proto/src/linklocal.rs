//! IPv6 link-local address derivation.

use crate::mac::MacAddr;
use std::net::Ipv6Addr;

/// Derive the IPv6 link-local address for a hardware address using the
/// modified EUI-64 expansion.
///
/// The 48-bit address is split in half, `FF:FE` is inserted between the
/// halves, and the universal/local bit of the first octet is flipped. The
/// result is placed in the `fe80::/64` prefix.
///
/// The derivation is a pure function: the same hardware address always
/// yields the same link-local address, so resolvers recompute it on every
/// attempt instead of storing it.
#[must_use]
pub fn link_local_from_mac(mac: MacAddr) -> Ipv6Addr {
    let m = mac.octets();
    Ipv6Addr::new(
        0xfe80,
        0,
        0,
        0,
        u16::from_be_bytes([m[0] ^ 0x02, m[1]]),
        u16::from_be_bytes([m[2], 0xff]),
        u16::from_be_bytes([0xfe, m[3]]),
        u16::from_be_bytes([m[4], m[5]]),
    )
}
