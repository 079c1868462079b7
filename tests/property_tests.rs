//! Property tests over the wire types.

use peerline_proto::{ContactInfo, MacAddr, link_local_from_mac};
use proptest::prelude::*;

proptest! {
    #[test]
    fn mac_display_parse_roundtrip(octets in proptest::array::uniform6(any::<u8>())) {
        let mac = MacAddr::new(octets);
        let parsed: MacAddr = mac.to_string().parse().unwrap();
        prop_assert_eq!(parsed, mac);
    }

    #[test]
    fn link_local_derivation_is_stable(octets in proptest::array::uniform6(any::<u8>())) {
        let mac = MacAddr::new(octets);
        let first = link_local_from_mac(mac);
        let second = link_local_from_mac(mac);
        prop_assert_eq!(first, second);
        prop_assert!(first.is_unicast_link_local());
    }

    #[test]
    fn link_local_preserves_nic_bits(octets in proptest::array::uniform6(any::<u8>())) {
        let addr = link_local_from_mac(MacAddr::new(octets));
        let seg = addr.segments();
        // The lower three octets of the hardware address survive intact.
        prop_assert_eq!(seg[6] & 0x00ff, u16::from(octets[3]));
        prop_assert_eq!(seg[7], u16::from_be_bytes([octets[4], octets[5]]));
    }

    #[test]
    fn contact_info_roundtrips(
        octets in proptest::array::uniform6(any::<u8>()),
        port in 1u16..,
        name in proptest::option::of("[a-z]{1,12}"),
    ) {
        let info = ContactInfo {
            mac_address: MacAddr::new(octets),
            name,
            ipv4_addr: None,
            port,
        };
        let decoded = ContactInfo::from_bytes(&info.to_bytes().unwrap()).unwrap();
        prop_assert_eq!(decoded, info);
    }

    #[test]
    fn probe_reply_identity_check_is_exact(
        a in proptest::array::uniform6(any::<u8>()),
        b in proptest::array::uniform6(any::<u8>()),
    ) {
        // Two hardware addresses compare equal exactly when their octets
        // do; the identity check cannot be fooled by formatting.
        let mac_a = MacAddr::new(a);
        let mac_b = MacAddr::new(b);
        prop_assert_eq!(mac_a == mac_b, a == b);
    }
}
