//! Hardware address type.
//!
//! A `MacAddr` is the stable identity key for a contact. Probe replies are
//! only accepted when the responder's hardware address equals the address
//! being resolved, so equality here is the identity relation for peers.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A 48-bit hardware (MAC) address.
///
/// The canonical textual form is uppercase colon-separated hex, e.g.
/// `AA:BB:CC:DD:EE:FF`. Parsing also accepts lowercase digits and `-`
/// separators; formatting always emits the canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacAddr([u8; 6]);

impl MacAddr {
    /// Create an address from raw octets
    #[must_use]
    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// The raw octets of this address
    #[must_use]
    pub const fn octets(&self) -> [u8; 6] {
        self.0
    }
}

/// Error returned when a string is not a valid hardware address
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid hardware address: {input}")]
pub struct MacParseError {
    /// The rejected input
    pub input: String,
}

impl FromStr for MacAddr {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || MacParseError {
            input: s.to_string(),
        };

        let sep = if s.contains(':') { ':' } else { '-' };
        let mut octets = [0u8; 6];
        let mut count = 0;

        for part in s.split(sep) {
            if count == 6 || part.len() != 2 {
                return Err(err());
            }
            octets[count] = u8::from_str_radix(part, 16).map_err(|_| err())?;
            count += 1;
        }

        if count != 6 {
            return Err(err());
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct MacVisitor;

        impl Visitor<'_> for MacVisitor {
            type Value = MacAddr;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a colon-separated hardware address")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<MacAddr, E> {
                v.parse().map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(MacVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_canonical() {
        let mac: MacAddr = "AA:BB:CC:DD:EE:FF".parse().unwrap();
        assert_eq!(mac.octets(), [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    }

    #[test]
    fn test_parse_lowercase_and_dashes() {
        let colon: MacAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        let dash: MacAddr = "aa-bb-cc-dd-ee-ff".parse().unwrap();
        assert_eq!(colon, dash);
    }

    #[test]
    fn test_display_is_canonical() {
        let mac: MacAddr = "aa:bb:cc:dd:ee:0f".parse().unwrap();
        assert_eq!(mac.to_string(), "AA:BB:CC:DD:EE:0F");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!("AA:BB:CC:DD:EE".parse::<MacAddr>().is_err());
        assert!("AA:BB:CC:DD:EE:FF:00".parse::<MacAddr>().is_err());
        assert!("AA:BB:CC:DD:EE:GG".parse::<MacAddr>().is_err());
        assert!("AABBCCDDEEFF".parse::<MacAddr>().is_err());
        assert!("".parse::<MacAddr>().is_err());
    }

    #[test]
    fn test_serde_string_form() {
        let mac: MacAddr = "12:34:56:78:9A:BC".parse().unwrap();
        let json = serde_json::to_string(&mac).unwrap();
        assert_eq!(json, "\"12:34:56:78:9A:BC\"");

        let back: MacAddr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, mac);
    }

    #[test]
    fn test_roundtrip() {
        let mac = MacAddr::new([0x02, 0x00, 0x5E, 0x10, 0x00, 0x01]);
        let parsed: MacAddr = mac.to_string().parse().unwrap();
        assert_eq!(parsed, mac);
    }
}
