//! Network records.
//!
//! A [`Network`] is a CIDR block plus the attributes the database attaches to
//! it: an optional country code, an optional ASN and a set of flags.
//! Networks are small `Copy` values; the tree and the lists store them by value.

use bitflags::bitflags;
use ipnet::IpNet;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::address::{Address, AddressFamily, ADDRESS_BITS};
use crate::country::CountryCode;
use crate::{Error, Result};

bitflags! {
    /// Routing flags attached to a network.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NetworkFlags: u16 {
        const ANONYMOUS_PROXY = 0b0001;
        const SATELLITE_PROVIDER = 0b0010;
        const ANYCAST = 0b0100;
        const DROP = 0b1000;
    }
}

impl NetworkFlags {
    /// Map a flag name (`anonymous-proxy`, `satellite-provider`, `anycast`,
    /// `drop`) to its flag. Case-insensitive; underscores are accepted too.
    pub fn from_flag_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "anonymous-proxy" => Some(Self::ANONYMOUS_PROXY),
            "satellite-provider" => Some(Self::SATELLITE_PROVIDER),
            "anycast" => Some(Self::ANYCAST),
            "drop" => Some(Self::DROP),
            _ => None,
        }
    }

    /// Names of all set flags, in bit order.
    pub fn names(self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.contains(Self::ANONYMOUS_PROXY) {
            names.push("anonymous-proxy");
        }
        if self.contains(Self::SATELLITE_PROVIDER) {
            names.push("satellite-provider");
        }
        if self.contains(Self::ANYCAST) {
            names.push("anycast");
        }
        if self.contains(Self::DROP) {
            names.push("drop");
        }
        names
    }

    /// The flag a reserved pseudo country code stands for.
    pub fn from_pseudo_country(code: &str) -> Option<Self> {
        match code {
            "A1" => Some(Self::ANONYMOUS_PROXY),
            "A2" => Some(Self::SATELLITE_PROVIDER),
            "A3" => Some(Self::ANYCAST),
            _ => None,
        }
    }
}

/// A CIDR block with its attributes.
///
/// Equality, hashing and ordering only look at the block itself (first
/// address, then prefix). Use [`Network::same_attributes`] to compare the
/// attached data.
#[derive(Debug, Clone, Copy)]
pub struct Network {
    first_address: Address,
    /// Prefix length within the 128-bit address space (IPv4 adds 96).
    depth: u8,
    country_code: Option<CountryCode>,
    asn: Option<u32>,
    flags: NetworkFlags,
}

impl Network {
    /// Create a network from an address and a prefix length in the address's
    /// own family. Host bits of `address` are cleared.
    pub fn new(address: Address, prefix: u8) -> Result<Self> {
        let family = address.family();
        if prefix > family.bit_length() {
            return Err(Error::InvalidPrefix {
                prefix,
                max: family.bit_length(),
            });
        }
        Ok(Self::from_tree_path(address, family.offset() + prefix))
    }

    /// Create a network from a path through the 128-bit tree.
    pub(crate) fn from_tree_path(address: Address, depth: u8) -> Self {
        let depth = depth.min(ADDRESS_BITS);
        Self {
            first_address: address.mask(depth),
            depth,
            country_code: None,
            asn: None,
            flags: NetworkFlags::empty(),
        }
    }

    pub fn first_address(&self) -> Address {
        self.first_address
    }

    pub fn last_address(&self) -> Address {
        self.first_address.fill(self.depth)
    }

    /// Prefix length in the network's own family (0..=32 for IPv4).
    pub fn prefix(&self) -> u8 {
        self.depth.saturating_sub(self.family().offset())
    }

    /// Prefix length within the 128-bit tree.
    pub(crate) fn tree_depth(&self) -> u8 {
        self.depth
    }

    pub fn family(&self) -> AddressFamily {
        self.first_address.family()
    }

    pub fn country_code(&self) -> Option<CountryCode> {
        self.country_code
    }

    /// Set the country code.
    ///
    /// The reserved codes `A1`, `A2` and `A3` set the anonymous-proxy,
    /// satellite-provider and anycast flags instead and leave the country
    /// untouched. An empty string clears the country.
    pub fn set_country_code(&mut self, code: &str) -> Result<()> {
        if code.is_empty() {
            self.country_code = None;
            return Ok(());
        }
        if let Some(flag) = NetworkFlags::from_pseudo_country(code) {
            self.flags |= flag;
            return Ok(());
        }
        self.country_code = Some(CountryCode::new(code)?);
        Ok(())
    }

    /// Builder form of [`Network::set_country_code`].
    pub fn with_country_code(mut self, code: &str) -> Result<Self> {
        self.set_country_code(code)?;
        Ok(self)
    }

    pub(crate) fn set_country(&mut self, country: Option<CountryCode>) {
        self.country_code = country;
    }

    pub fn asn(&self) -> Option<u32> {
        self.asn
    }

    /// Set the ASN. Zero means "no ASN".
    pub fn set_asn(&mut self, asn: u32) {
        self.asn = (asn != 0).then_some(asn);
    }

    pub fn with_asn(mut self, asn: u32) -> Self {
        self.set_asn(asn);
        self
    }

    pub fn flags(&self) -> NetworkFlags {
        self.flags
    }

    pub fn has_flag(&self, flag: NetworkFlags) -> bool {
        self.flags.contains(flag)
    }

    /// Set `flags` in addition to the flags already present.
    pub fn add_flags(&mut self, flags: NetworkFlags) {
        self.flags |= flags;
    }

    pub fn with_flags(mut self, flags: NetworkFlags) -> Self {
        self.add_flags(flags);
        self
    }

    /// Copy country, ASN and flags from `other`.
    pub(crate) fn with_attributes_of(mut self, other: &Network) -> Self {
        self.country_code = other.country_code;
        self.asn = other.asn;
        self.flags = other.flags;
        self
    }

    /// Check whether country, ASN and flags are equal.
    pub fn same_attributes(&self, other: &Network) -> bool {
        self.country_code == other.country_code
            && self.asn == other.asn
            && self.flags == other.flags
    }

    /// Check whether any attribute is set.
    pub fn has_attributes(&self) -> bool {
        self.country_code.is_some() || self.asn.is_some() || !self.flags.is_empty()
    }

    /// Country match; the pseudo codes `A1`/`A2`/`A3` test the matching flag.
    pub fn matches_country_code(&self, code: &str) -> bool {
        if let Some(flag) = NetworkFlags::from_pseudo_country(code) {
            return self.has_flag(flag);
        }
        self.country_code
            .map(|c| c.as_str() == code)
            .unwrap_or(false)
    }

    pub fn matches_asn(&self, asn: u32) -> bool {
        self.asn == Some(asn)
    }

    /// Check whether `address` lies within this network.
    pub fn matches_address(&self, address: Address) -> bool {
        address.family() == self.family()
            && self.first_address <= address
            && address <= self.last_address()
    }

    /// Check whether this network lies entirely within `other`.
    pub fn is_subnet_of(&self, other: &Network) -> bool {
        self.family() == other.family()
            && other.depth <= self.depth
            && other.first_address <= self.first_address
            && self.last_address() <= other.last_address()
    }

    /// Check whether the two networks share at least one address.
    pub fn overlaps(&self, other: &Network) -> bool {
        other.matches_address(self.first_address)
            || other.matches_address(self.last_address())
            || self.matches_address(other.first_address)
            || self.matches_address(other.last_address())
    }

    /// Split into the two halves one prefix bit longer. Both halves inherit
    /// the attributes. Host networks cannot be split.
    pub fn subnets(&self) -> Option<(Network, Network)> {
        if self.depth >= ADDRESS_BITS {
            return None;
        }
        let depth = self.depth + 1;
        let lower = Self::from_tree_path(self.first_address, depth).with_attributes_of(self);
        let upper = Self::from_tree_path(self.first_address.with_bit(self.depth, true), depth)
            .with_attributes_of(self);
        Some((lower, upper))
    }

    /// The network one prefix bit shorter, without attributes. `None` for a
    /// family's /0.
    pub fn supernet(&self) -> Option<Network> {
        if self.prefix() == 0 {
            return None;
        }
        Some(Self::from_tree_path(self.first_address, self.depth - 1))
    }

    /// The DNS reverse-zone name of this network.
    ///
    /// `suffix` defaults to `in-addr.arpa.` or `ip6.arpa.`. Returns `None`
    /// when the prefix does not end on an octet (IPv4) or nibble (IPv6)
    /// boundary.
    pub fn reverse_pointer(&self, suffix: Option<&str>) -> Option<String> {
        let prefix = self.prefix();
        let (labels, default_suffix, max) = match self.family() {
            AddressFamily::V4 => {
                if prefix % 8 != 0 {
                    return None;
                }
                let octets = (self.first_address.to_bits() as u32).to_be_bytes();
                let labels: Vec<String> = octets[..(prefix / 8) as usize]
                    .iter()
                    .rev()
                    .map(|o| o.to_string())
                    .collect();
                (labels, "in-addr.arpa.", 32)
            }
            AddressFamily::V6 => {
                if prefix % 4 != 0 {
                    return None;
                }
                let bits = self.first_address.to_bits();
                let labels: Vec<String> = (0..prefix / 4)
                    .rev()
                    .map(|i| format!("{:x}", (bits >> (124 - 4 * i as u32)) & 0xf))
                    .collect();
                (labels, "ip6.arpa.", 128)
            }
        };

        let mut parts = Vec::with_capacity(labels.len() + 2);
        if prefix < max {
            parts.push("*".to_string());
        }
        parts.extend(labels);
        parts.push(suffix.unwrap_or(default_suffix).to_string());
        Some(parts.join("."))
    }
}

impl PartialEq for Network {
    fn eq(&self, other: &Self) -> bool {
        self.first_address == other.first_address && self.depth == other.depth
    }
}

impl Eq for Network {}

impl Hash for Network {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.first_address.hash(state);
        self.depth.hash(state);
    }
}

impl PartialOrd for Network {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Network {
    fn cmp(&self, other: &Self) -> Ordering {
        self.first_address
            .cmp(&other.first_address)
            .then(self.depth.cmp(&other.depth))
    }
}

impl From<IpNet> for Network {
    fn from(net: IpNet) -> Self {
        // An IPv6 prefix is already a tree depth, even inside the
        // IPv4-mapped block.
        let depth = match net {
            IpNet::V4(v4) => AddressFamily::V4.offset() + v4.prefix_len(),
            IpNet::V6(v6) => v6.prefix_len(),
        };
        Self::from_tree_path(Address::from(net.addr()), depth)
    }
}

impl FromStr for Network {
    type Err = Error;

    /// Parse `addr/prefix`. A bare address is a host network.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if !s.contains('/') {
            let address: Address = s.parse()?;
            return Network::new(address, address.family().bit_length());
        }
        s.parse::<IpNet>()
            .map(Network::from)
            .map_err(|_| Error::InvalidAddress(s.to_string()))
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.first_address, self.prefix())
    }
}
