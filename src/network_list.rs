//! Ordered sets of networks and CIDR set algebra.
//!
//! A [`NetworkList`] is always sorted by (first address, prefix) and never
//! holds two equal networks. [`NetworkList::push`] is the only way elements
//! get in, so the invariant holds after every call.

use std::slice;

use crate::address::{common_prefix_length, prefix_to_bitmask, Address, ADDRESS_BITS};
use crate::network::Network;
use crate::{Error, Result};

/// Sorted, duplicate-free collection of networks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NetworkList {
    elements: Vec<Network>,
}

impl NetworkList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            elements: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn clear(&mut self) {
        self.elements.clear();
    }

    pub fn get(&self, index: usize) -> Option<&Network> {
        self.elements.get(index)
    }

    pub fn first(&self) -> Option<&Network> {
        self.elements.first()
    }

    pub fn last(&self) -> Option<&Network> {
        self.elements.last()
    }

    pub fn iter(&self) -> slice::Iter<'_, Network> {
        self.elements.iter()
    }

    pub fn as_slice(&self) -> &[Network] {
        &self.elements
    }

    /// Locate `network`: `(index, true)` if present, otherwise the index it
    /// would be inserted at and `false`.
    ///
    /// Appending in ascending order is the common case, so the last element
    /// is checked before falling back to a binary search.
    pub fn find(&self, network: &Network) -> (usize, bool) {
        match self.elements.last() {
            None => return (0, false),
            Some(last) if last < network => return (self.elements.len(), false),
            Some(last) if last == network => return (self.elements.len() - 1, true),
            Some(_) => {}
        }

        match self.elements.binary_search(network) {
            Ok(index) => (index, true),
            Err(index) => (index, false),
        }
    }

    pub fn contains(&self, network: &Network) -> bool {
        self.find(network).1
    }

    /// Insert `network` at its sorted position. Returns `false` and leaves
    /// the list unchanged when an equal network is already present.
    pub fn push(&mut self, network: Network) -> bool {
        let (index, found) = self.find(&network);
        if found {
            return false;
        }
        self.elements.insert(index, network);
        true
    }

    /// Remove and return the last element.
    pub fn pop(&mut self) -> Option<Network> {
        self.elements.pop()
    }

    /// Remove and return the first element.
    pub fn pop_first(&mut self) -> Option<Network> {
        if self.elements.is_empty() {
            return None;
        }
        Some(self.elements.remove(0))
    }

    /// Remove `network` if present.
    pub fn remove(&mut self, network: &Network) -> bool {
        let (index, found) = self.find(network);
        if found {
            self.elements.remove(index);
        }
        found
    }

    /// Add every element of `other` (set union).
    pub fn merge(&mut self, other: &NetworkList) {
        for network in other {
            self.push(*network);
        }
    }

    /// Keep only networks with a prefix of at most `prefix` bits.
    pub fn remove_with_prefix_smaller_than(&mut self, prefix: u8) {
        self.elements.retain(|n| n.prefix() <= prefix);
    }
}

impl IntoIterator for NetworkList {
    type Item = Network;
    type IntoIter = std::vec::IntoIter<Network>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<'a> IntoIterator for &'a NetworkList {
    type Item = &'a Network;
    type IntoIter = slice::Iter<'a, Network>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

impl FromIterator<Network> for NetworkList {
    fn from_iter<I: IntoIterator<Item = Network>>(iter: I) -> Self {
        let mut list = NetworkList::new();
        list.extend(iter);
        list
    }
}

impl Extend<Network> for NetworkList {
    fn extend<I: IntoIterator<Item = Network>>(&mut self, iter: I) {
        for network in iter {
            self.push(network);
        }
    }
}

/// The minimal set of CIDR blocks covering `network` minus `other`.
///
/// `other` must be a proper subnet of `network`; otherwise the result is
/// empty. The resulting blocks inherit the attributes of `network`.
pub fn exclude(network: &Network, other: &Network) -> NetworkList {
    let mut list = NetworkList::new();
    if network == other || !other.is_subnet_of(network) {
        return list;
    }

    let mut current = *network;
    while let Some((lower, upper)) = current.subnets() {
        if *other == lower {
            list.push(upper);
            break;
        }
        if *other == upper {
            list.push(lower);
            break;
        }
        if other.is_subnet_of(&lower) {
            list.push(upper);
            current = lower;
        } else {
            list.push(lower);
            current = upper;
        }
    }
    list
}

/// The CIDR blocks covered by `network` and not covered by any member of
/// `excluded`.
pub fn exclude_list(network: &Network, excluded: &NetworkList) -> NetworkList {
    let mut candidates = NetworkList::new();
    candidates.push(*network);

    let mut result = NetworkList::new();
    while let Some(candidate) = candidates.pop_first() {
        if excluded.iter().any(|n| candidate.is_subnet_of(n)) {
            continue;
        }

        // Anything that still overlaps lies strictly inside the candidate.
        if excluded.iter().any(|n| n.overlaps(&candidate)) {
            if let Some((lower, upper)) = candidate.subnets() {
                candidates.push(lower);
                candidates.push(upper);
            }
            continue;
        }

        result.push(candidate);
    }
    result
}

/// The minimal sorted list of CIDR blocks exactly covering
/// `first..=last`.
pub fn summarize(first: Address, last: Address) -> Result<NetworkList> {
    common_prefix_length(first, last)?;
    if first > last {
        return Err(Error::InvalidAddress(format!(
            "range start {} is after range end {}",
            first, last
        )));
    }

    // Work on raw 128-bit values so that an IPv6 range may run through the
    // IPv4-mapped block without changing family halfway.
    let width = u32::from(first.family().bit_length());
    let end = last.to_bits();
    let mut start = first.to_bits();
    let mut list = NetworkList::new();

    loop {
        // Host bits available from the alignment of `start`.
        let aligned = start.trailing_zeros().min(width);

        // Host bits that still fit into the remaining range.
        let fitting = match (end - start).checked_add(1) {
            Some(count) => 127 - count.leading_zeros(),
            None => 128,
        };

        let host_bits = aligned.min(fitting) as u8;
        list.push(Network::from_tree_path(
            Address::from_bits(start),
            ADDRESS_BITS - host_bits,
        ));

        let network_end = start | !prefix_to_bitmask(ADDRESS_BITS - host_bits);
        if network_end >= end {
            break;
        }
        start = network_end + 1;
    }

    Ok(list)
}
