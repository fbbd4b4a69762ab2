//! 128-bit address arithmetic.
//!
//! Every address is held as a single 128-bit value. IPv4 addresses are stored
//! IPv4-mapped (`::ffff:a.b.c.d`), so the family is always derived from the
//! bit pattern and can never disagree with it.
//!
//! Bits are numbered MSB-first: bit 0 is the most significant bit of the
//! 128-bit value, which is also the first bit consumed by the network tree.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use crate::{Error, Result};

/// Width of an address in bits, and therefore the maximum depth of a network tree.
pub const ADDRESS_BITS: u8 = 128;

/// The fixed `::ffff:0:0/96` pattern shared by all IPv4-mapped addresses.
const V4_MAPPED_PATTERN: u128 = 0xffff << 32;

/// Address family, derived from the bit pattern of an [`Address`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    V4,
    V6,
}

impl AddressFamily {
    /// Number of significant bits in addresses of this family.
    pub fn bit_length(self) -> u8 {
        match self {
            AddressFamily::V4 => 32,
            AddressFamily::V6 => 128,
        }
    }

    /// Number of leading bits of the 128-bit representation that are fixed
    /// for this family (96 for IPv4-mapped addresses).
    pub fn offset(self) -> u8 {
        ADDRESS_BITS - self.bit_length()
    }

    /// Mask covering the bits that vary within this family.
    fn host_mask(self) -> u128 {
        match self {
            AddressFamily::V4 => u32::MAX as u128,
            AddressFamily::V6 => u128::MAX,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressFamily::V4 => write!(f, "IPv4"),
            AddressFamily::V6 => write!(f, "IPv6"),
        }
    }
}

/// Returns a 128-bit mask with the top `prefix` bits set.
pub fn prefix_to_bitmask(prefix: u8) -> u128 {
    match prefix {
        0 => 0,
        p if p >= ADDRESS_BITS => u128::MAX,
        p => u128::MAX << (ADDRESS_BITS - p),
    }
}

/// Number of matching leading bits of two addresses, counted within their family.
///
/// Fails with [`Error::AddressFamilyMismatch`] when one address is IPv4 and
/// the other is not.
pub fn common_prefix_length(a: Address, b: Address) -> Result<u8> {
    let family = a.family();
    if family != b.family() {
        return Err(Error::AddressFamilyMismatch);
    }

    let leading = (a.0 ^ b.0).leading_zeros() as u8;
    Ok(leading
        .saturating_sub(family.offset())
        .min(family.bit_length()))
}

/// A 128-bit address. Ordering is lexicographic over the 16 address bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u128);

impl Address {
    /// The unspecified IPv6 address `::`.
    pub const UNSPECIFIED: Address = Address(0);

    /// Create an address from its 128-bit value.
    pub const fn from_bits(bits: u128) -> Self {
        Self(bits)
    }

    /// Get the 128-bit value of this address.
    pub const fn to_bits(self) -> u128 {
        self.0
    }

    /// Create an address from 16 network-order bytes.
    pub fn from_octets(octets: [u8; 16]) -> Self {
        Self(u128::from_be_bytes(octets))
    }

    /// Get the 16 network-order bytes of this address.
    pub fn octets(self) -> [u8; 16] {
        self.0.to_be_bytes()
    }

    /// Create an IPv4-mapped address.
    pub fn from_ipv4(addr: Ipv4Addr) -> Self {
        Self(V4_MAPPED_PATTERN | u32::from(addr) as u128)
    }

    /// Get the family of this address.
    pub fn family(self) -> AddressFamily {
        if self.0 >> 32 == 0xffff {
            AddressFamily::V4
        } else {
            AddressFamily::V6
        }
    }

    /// Check whether this is an IPv4-mapped address.
    pub fn is_ipv4(self) -> bool {
        self.family() == AddressFamily::V4
    }

    /// Convert back into a standard library address in its native family.
    pub fn to_ip_addr(self) -> IpAddr {
        match self.family() {
            AddressFamily::V4 => IpAddr::V4(Ipv4Addr::from(self.0 as u32)),
            AddressFamily::V6 => IpAddr::V6(Ipv6Addr::from(self.0)),
        }
    }

    /// Get bit `i` (MSB-first).
    pub fn bit(self, i: u8) -> bool {
        debug_assert!(i < ADDRESS_BITS);
        (self.0 >> (ADDRESS_BITS - 1 - i)) & 1 == 1
    }

    /// Set bit `i` (MSB-first) to `value`.
    pub fn set_bit(&mut self, i: u8, value: bool) {
        debug_assert!(i < ADDRESS_BITS);
        let mask = 1u128 << (ADDRESS_BITS - 1 - i);
        if value {
            self.0 |= mask;
        } else {
            self.0 &= !mask;
        }
    }

    /// Return a copy with bit `i` set to `value`.
    pub fn with_bit(mut self, i: u8, value: bool) -> Self {
        self.set_bit(i, value);
        self
    }

    /// Keep the top `prefix` bits and clear the rest.
    pub fn mask(self, prefix: u8) -> Self {
        Self(self.0 & prefix_to_bitmask(prefix))
    }

    /// Keep the top `prefix` bits and set the rest.
    pub fn fill(self, prefix: u8) -> Self {
        Self(self.0 | !prefix_to_bitmask(prefix))
    }

    /// Index of the lowest set bit, counted from the top of the family's bits.
    ///
    /// This is the shortest prefix that still covers every set bit of the
    /// address: `1.0.0.0` has a bit length of 8, `2001::` of 16 and an
    /// all-zero address of 0.
    pub fn bit_length(self) -> u8 {
        let family = self.family();
        let host = self.0 & family.host_mask();
        if host == 0 {
            return 0;
        }
        family.bit_length() - host.trailing_zeros() as u8
    }

    /// The next address within the same family, or `None` at the end of the
    /// address space.
    pub fn increment(self) -> Option<Self> {
        let mask = self.family().host_mask();
        if self.0 & mask == mask {
            return None;
        }
        Some(Self(self.0 + 1))
    }

    /// The previous address within the same family, or `None` at the start of
    /// the address space.
    pub fn decrement(self) -> Option<Self> {
        if self.0 & self.family().host_mask() == 0 {
            return None;
        }
        Some(Self(self.0 - 1))
    }
}

impl From<Ipv4Addr> for Address {
    fn from(addr: Ipv4Addr) -> Self {
        Self::from_ipv4(addr)
    }
}

impl From<Ipv6Addr> for Address {
    fn from(addr: Ipv6Addr) -> Self {
        Self(u128::from(addr))
    }
}

impl From<IpAddr> for Address {
    fn from(addr: IpAddr) -> Self {
        match addr {
            IpAddr::V4(v4) => v4.into(),
            IpAddr::V6(v6) => v6.into(),
        }
    }
}

impl From<Address> for IpAddr {
    fn from(addr: Address) -> Self {
        addr.to_ip_addr()
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        s.parse::<IpAddr>()
            .map(Address::from)
            .map_err(|_| Error::InvalidAddress(s.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_ip_addr())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        s.parse().unwrap()
    }

    #[test]
    fn test_family_detection() {
        assert_eq!(addr("10.0.0.1").family(), AddressFamily::V4);
        assert_eq!(addr("::ffff:10.0.0.1").family(), AddressFamily::V4);
        assert_eq!(addr("2001:db8::1").family(), AddressFamily::V6);
        assert_eq!(addr("::").family(), AddressFamily::V6);
        assert_eq!(addr("10.0.0.1").to_ip_addr(), "10.0.0.1".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn test_get_and_set_bit() {
        let mut a = addr("8000::");
        assert!(a.bit(0));
        assert!(!a.bit(1));

        a.set_bit(1, true);
        assert_eq!(a, addr("c000::"));
        a.set_bit(0, false);
        assert_eq!(a, addr("4000::"));

        assert!(addr("::1").bit(127));
        assert_eq!(Address::UNSPECIFIED.with_bit(127, true), addr("::1"));
    }

    #[test]
    fn test_prefix_to_bitmask() {
        assert_eq!(prefix_to_bitmask(0), 0);
        assert_eq!(prefix_to_bitmask(128), u128::MAX);
        assert_eq!(prefix_to_bitmask(1), 1u128 << 127);
        assert_eq!(addr("2001:db8:1:2::").mask(32), addr("2001:db8::"));
        assert_eq!(
            addr("2001:db8::").fill(32),
            addr("2001:db8:ffff:ffff:ffff:ffff:ffff:ffff")
        );
    }

    #[test]
    fn test_common_prefix_length() {
        assert_eq!(common_prefix_length(addr("10.0.0.0"), addr("10.0.0.255")).unwrap(), 24);
        assert_eq!(common_prefix_length(addr("10.0.0.0"), addr("10.0.0.0")).unwrap(), 32);
        assert_eq!(common_prefix_length(addr("0.0.0.0"), addr("128.0.0.0")).unwrap(), 0);
        assert_eq!(
            common_prefix_length(addr("2001:db8::"), addr("2001:db8:8000::")).unwrap(),
            32
        );
        assert_eq!(common_prefix_length(addr("::"), addr("::")).unwrap(), 128);
    }

    #[test]
    fn test_common_prefix_length_family_mismatch() {
        let result = common_prefix_length(addr("10.0.0.0"), addr("2001:db8::"));
        assert!(matches!(result, Err(Error::AddressFamilyMismatch)));
    }

    #[test]
    fn test_bit_length() {
        assert_eq!(addr("::").bit_length(), 0);
        assert_eq!(addr("2001::").bit_length(), 16);
        assert_eq!(addr("1.0.0.0").bit_length(), 8);
        assert_eq!(addr("0.0.0.1").bit_length(), 32);
        assert_eq!(addr("255.255.255.255").bit_length(), 32);
        assert_eq!(addr("0.0.0.0").bit_length(), 0);
    }

    #[test]
    fn test_increment_and_decrement() {
        assert_eq!(addr("10.0.0.255").increment(), Some(addr("10.0.1.0")));
        assert_eq!(addr("10.0.1.0").decrement(), Some(addr("10.0.0.255")));
        assert_eq!(addr("255.255.255.255").increment(), None);
        assert_eq!(addr("0.0.0.0").decrement(), None);
        assert_eq!(addr("ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff").increment(), None);
        assert_eq!(addr("::").decrement(), None);
    }

    #[test]
    fn test_ordering_is_bytewise() {
        assert!(addr("2001:db8::") < addr("2001:db8::1"));
        assert!(addr("10.0.0.1") < addr("10.0.0.2"));
        assert!(addr("2001:db8::") > addr("10.0.0.1"));
    }

    #[test]
    fn test_invalid_literal() {
        assert!(matches!(
            "xxxx:xxxx::".parse::<Address>(),
            Err(Error::InvalidAddress(_))
        ));
    }
}
