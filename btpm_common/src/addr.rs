//! 48-bit Bluetooth device address.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 48-bit Bluetooth device address.
///
/// Stored big-endian (`[0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]` displays as
/// `AA:BB:CC:DD:EE:FF`). The all-zero address is reserved as "no device".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BdAddr(pub [u8; 6]);

impl BdAddr {
    /// The null address. Never a valid remote device.
    pub const NULL: Self = Self([0; 6]);

    /// Returns true if this is the null (all-zero) address.
    #[inline]
    pub fn is_null(&self) -> bool {
        self.0 == [0; 6]
    }

    /// Raw octets, big-endian.
    #[inline]
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            o[0], o[1], o[2], o[3], o[4], o[5]
        )
    }
}

/// Error parsing a `BdAddr` from text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddrParseError(String);

impl fmt::Display for AddrParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid device address '{}'", self.0)
    }
}

impl std::error::Error for AddrParseError {}

impl FromStr for BdAddr {
    type Err = AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut count = 0;
        for part in s.split(':') {
            if count == 6 || part.len() != 2 {
                return Err(AddrParseError(s.to_string()));
            }
            octets[count] =
                u8::from_str_radix(part, 16).map_err(|_| AddrParseError(s.to_string()))?;
            count += 1;
        }
        if count != 6 {
            return Err(AddrParseError(s.to_string()));
        }
        Ok(BdAddr(octets))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_roundtrip() {
        let addr = BdAddr([0xAA, 0xBB, 0xCC, 0x01, 0x02, 0x03]);
        let text = addr.to_string();
        assert_eq!(text, "AA:BB:CC:01:02:03");
        assert_eq!(text.parse::<BdAddr>().unwrap(), addr);
    }

    #[test]
    fn parse_lowercase() {
        let addr: BdAddr = "aa:bb:cc:dd:ee:ff".parse().unwrap();
        assert_eq!(addr.octets(), [0xAA, 0xBB, 0xCC, 0xDD, 0xEE, 0xFF]);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!("AA:BB:CC".parse::<BdAddr>().is_err());
        assert!("AA:BB:CC:DD:EE:FF:00".parse::<BdAddr>().is_err());
        assert!("AA:BB:CC:DD:EE:GG".parse::<BdAddr>().is_err());
        assert!("AABBCCDDEEFF".parse::<BdAddr>().is_err());
        assert!("".parse::<BdAddr>().is_err());
    }

    #[test]
    fn null_address() {
        assert!(BdAddr::NULL.is_null());
        assert!(!BdAddr([0, 0, 0, 0, 0, 1]).is_null());
    }
}
