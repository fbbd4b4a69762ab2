//! Flattening the network tree and reading it back.
//!
//! [`flatten`] numbers the live nodes of a [`NetworkTree`] in pre-order, so
//! the root is node 0 and a child reference of 0 can mean "no child". Record
//! payloads (country, flags, ASN) are deduplicated: nodes with equal
//! attributes share one record.
//!
//! The views wrap the raw section bytes of an opened database. Every index
//! taken from the file is range-checked and fails with
//! [`Error::CorruptTree`] instead of reading out of bounds.

use ahash::AHashMap;

use super::format::{
    AsEntry, NetworkEntry, NodeEntry, AS_RECORD_SIZE, NETWORK_RECORD_SIZE, NODE_SIZE, NO_RECORD,
};
use crate::country::CountryCode;
use crate::network::{Network, NetworkFlags};
use crate::tree::NetworkTree;
use crate::{Error, Result};

impl NetworkEntry {
    /// Record payload of `network`.
    pub fn from_network(network: &Network) -> Self {
        Self {
            country_code: network.country_code().map(|c| c.to_bytes()).unwrap_or([0, 0]),
            flags: network.flags().bits(),
            asn: network.asn().unwrap_or(0),
        }
    }

    /// Attach this record's attributes to `network`.
    pub fn apply(&self, mut network: Network) -> Network {
        network.set_country(CountryCode::from_bytes(self.country_code));
        network.set_asn(self.asn);
        network.with_flags(NetworkFlags::from_bits_truncate(self.flags))
    }
}

/// A network tree in its on-disk shape.
#[derive(Debug, Clone, Default)]
pub struct FlattenedTree {
    pub nodes: Vec<NodeEntry>,
    pub records: Vec<NetworkEntry>,
}

impl FlattenedTree {
    pub fn node_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.nodes.len() * NODE_SIZE);
        for node in &self.nodes {
            node.encode(&mut out);
        }
        out
    }

    pub fn record_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.records.len() * NETWORK_RECORD_SIZE);
        for record in &self.records {
            record.encode(&mut out);
        }
        out
    }
}

/// Flatten the live part of `tree`.
pub fn flatten(tree: &NetworkTree) -> Result<FlattenedTree> {
    let order = tree.live_preorder();
    if order.len() >= NO_RECORD as usize {
        return Err(Error::SectionOverflow("network tree"));
    }

    let mut index = AHashMap::with_capacity(order.len());
    for (position, id) in order.iter().enumerate() {
        index.insert(*id, position as u32);
    }

    let mut flattened = FlattenedTree {
        nodes: Vec::with_capacity(order.len()),
        records: Vec::new(),
    };
    let mut record_index: AHashMap<NetworkEntry, u32> = AHashMap::new();

    for id in &order {
        let child = |bit: bool| {
            tree.live_child(*id, bit)
                .and_then(|c| index.get(&c).copied())
                .unwrap_or(0)
        };

        let network = match tree.network_at(*id) {
            Some(network) => {
                let entry = NetworkEntry::from_network(network);
                let next = flattened.records.len() as u32;
                let slot = *record_index.entry(entry).or_insert(next);
                if slot == next {
                    flattened.records.push(entry);
                }
                slot
            }
            None => NO_RECORD,
        };

        flattened.nodes.push(NodeEntry {
            zero: child(false),
            one: child(true),
            network,
        });
    }

    Ok(flattened)
}

/// Read-only view over the network tree section.
#[derive(Debug, Clone, Copy)]
pub struct TreeView<'a> {
    data: &'a [u8],
}

impl<'a> TreeView<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() % NODE_SIZE != 0 {
            return Err(Error::corrupt_section(
                "network tree",
                format!("length {} is not a multiple of {}", data.len(), NODE_SIZE),
            ));
        }
        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len() / NODE_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn node(&self, index: u32) -> Result<NodeEntry> {
        let start = index as usize * NODE_SIZE;
        self.data
            .get(start..start + NODE_SIZE)
            .map(NodeEntry::decode)
            .ok_or_else(|| {
                Error::CorruptTree(format!("node {} out of range ({} nodes)", index, self.len()))
            })
    }
}

/// Read-only view over the network record section.
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    data: &'a [u8],
}

impl<'a> RecordView<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() % NETWORK_RECORD_SIZE != 0 {
            return Err(Error::corrupt_section(
                "network data",
                format!("length {} is not a multiple of {}", data.len(), NETWORK_RECORD_SIZE),
            ));
        }
        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len() / NETWORK_RECORD_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, index: u32) -> Result<NetworkEntry> {
        let start = index as usize * NETWORK_RECORD_SIZE;
        self.data
            .get(start..start + NETWORK_RECORD_SIZE)
            .map(NetworkEntry::decode)
            .ok_or_else(|| {
                Error::CorruptTree(format!(
                    "network record {} out of range ({} records)",
                    index,
                    self.len()
                ))
            })
    }
}

/// Read-only view over the AS section.
#[derive(Debug, Clone, Copy)]
pub struct AsView<'a> {
    data: &'a [u8],
}

impl<'a> AsView<'a> {
    pub fn new(data: &'a [u8]) -> Result<Self> {
        if data.len() % AS_RECORD_SIZE != 0 {
            return Err(Error::corrupt_section(
                "AS",
                format!("length {} is not a multiple of {}", data.len(), AS_RECORD_SIZE),
            ));
        }
        Ok(Self { data })
    }

    pub fn len(&self) -> usize {
        self.data.len() / AS_RECORD_SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<AsEntry> {
        let start = index * AS_RECORD_SIZE;
        self.data.get(start..start + AS_RECORD_SIZE).map(AsEntry::decode)
    }

    /// Binary search for `number`.
    pub fn find(&self, number: u32) -> Option<AsEntry> {
        let (mut lo, mut hi) = (0, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let entry = self.get(mid)?;
            match entry.number.cmp(&number) {
                std::cmp::Ordering::Equal => return Some(entry),
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        None
    }
}
