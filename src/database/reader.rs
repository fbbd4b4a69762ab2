//! Database reader with memory-mapping support.

use log::{debug, info, warn};
use memmap2::Mmap;
use std::fs::File;
use std::net::IpAddr;
use std::path::Path;

use super::codec::{AsView, RecordView, TreeView};
use super::enumerator::{AsEnumerator, NetworkEnumerator, NetworkFilter};
use super::format::*;
use crate::address::{Address, ADDRESS_BITS};
use crate::autonomous_system::AutonomousSystem;
use crate::network::Network;
use crate::stringpool::StringPool;
use crate::Result;

/// An opened, read-only location database.
///
/// All lookups are read-only and can run concurrently from many threads;
/// share the database through an `Arc`. The mapping is released when the
/// database is dropped.
pub struct Database {
    mmap: Mmap,
    header: DatabaseHeader,
}

impl Database {
    /// Open a database file.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        let db = Self::from_mmap(mmap)?;
        info!(
            "Opened database {:?}: {} networks, {} nodes, {} ASes",
            path,
            db.network_record_count(),
            db.network_node_count(),
            db.as_count()
        );
        Ok(db)
    }

    /// Open a database from bytes.
    ///
    /// This writes the data to a temp file and then memory-maps it.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        use std::io::Write;

        DatabaseHeader::parse(&data)?;

        let mut temp_file = tempfile::tempfile()?;
        temp_file.write_all(&data)?;

        let mmap = unsafe { Mmap::map(&temp_file)? };
        Self::from_mmap(mmap)
    }

    fn from_mmap(mmap: Mmap) -> Result<Self> {
        let header = DatabaseHeader::parse(&mmap)?;
        header.validate(mmap.len())?;
        debug!(
            "Sections: AS {:?}, network data {:?}, network tree {:?}, pool {:?}",
            header.as_section, header.network_data, header.network_tree, header.pool
        );

        let db = Self { mmap, header };

        let pool = db.pool();
        for offset in [header.vendor, header.description, header.license] {
            pool.get(offset)?;
        }
        Ok(db)
    }

    /// Get the file header.
    pub fn header(&self) -> &DatabaseHeader {
        &self.header
    }

    fn section(&self, section: Section) -> &[u8] {
        // Ranges were checked against the mapping when the header was read.
        &self.mmap[section.range()]
    }

    pub(crate) fn pool(&self) -> StringPool<'_> {
        StringPool::new(self.section(self.header.pool))
    }

    pub(crate) fn tree(&self) -> Result<TreeView<'_>> {
        TreeView::new(self.section(self.header.network_tree))
    }

    pub(crate) fn records(&self) -> Result<RecordView<'_>> {
        RecordView::new(self.section(self.header.network_data))
    }

    fn as_view(&self) -> Result<AsView<'_>> {
        AsView::new(self.section(self.header.as_section))
    }

    fn pool_string(&self, offset: u32) -> &str {
        match self.pool().get(offset) {
            Ok(s) => s,
            Err(e) => {
                warn!("Unreadable string at pool offset {}: {}", offset, e);
                ""
            }
        }
    }

    /// Unix timestamp of when the database was created.
    pub fn created_at(&self) -> u64 {
        self.header.created_at
    }

    pub fn vendor(&self) -> &str {
        self.pool_string(self.header.vendor)
    }

    pub fn description(&self) -> &str {
        self.pool_string(self.header.description)
    }

    pub fn license(&self) -> &str {
        self.pool_string(self.header.license)
    }

    pub fn as_count(&self) -> usize {
        self.header.as_count()
    }

    pub fn network_node_count(&self) -> usize {
        self.header.node_count()
    }

    pub fn network_record_count(&self) -> usize {
        self.header.network_record_count()
    }

    /// Find an autonomous system by number.
    pub fn get_as(&self, number: u32) -> Result<Option<AutonomousSystem>> {
        match self.as_view()?.find(number) {
            Some(entry) => {
                let name = self.pool().get(entry.name)?;
                Ok(Some(AutonomousSystem::new(entry.number, name)))
            }
            None => Ok(None),
        }
    }

    /// Longest-prefix match for `address`.
    ///
    /// Returns the most specific network on the address's path through the
    /// tree that contains it, or `None`.
    pub fn lookup(&self, address: Address) -> Result<Option<Network>> {
        let tree = self.tree()?;
        if tree.is_empty() {
            return Ok(None);
        }
        let records = self.records()?;

        // Nodes on the path that carry a record, shallowest first.
        let mut candidates: Vec<(u32, u8)> = Vec::new();
        let mut index = 0;
        let mut depth = 0;

        loop {
            let node = tree.node(index)?;
            if let Some(record) = node.record() {
                candidates.push((record, depth));
            }
            if depth == ADDRESS_BITS {
                break;
            }
            match node.child(address.bit(depth)) {
                Some(child) => {
                    index = child;
                    depth += 1;
                }
                None => break,
            }
        }

        for (record, depth) in candidates.into_iter().rev() {
            let entry = records.get(record)?;
            let network = entry.apply(Network::from_tree_path(address, depth));
            if network.matches_address(address) {
                return Ok(Some(network));
            }
        }
        Ok(None)
    }

    pub fn lookup_ip(&self, ip: IpAddr) -> Result<Option<Network>> {
        self.lookup(Address::from(ip))
    }

    /// Parse `address` and look it up.
    pub fn lookup_str(&self, address: &str) -> Result<Option<Network>> {
        self.lookup(address.parse()?)
    }

    /// Enumerate the networks matching `filter`.
    pub fn networks(&self, filter: NetworkFilter) -> Result<NetworkEnumerator<'_>> {
        Ok(NetworkEnumerator::new(self.tree()?, self.records()?, filter))
    }

    /// Enumerate the autonomous systems whose name contains `name`
    /// (case-insensitive). An empty string yields every AS.
    pub fn autonomous_systems(&self, name: &str) -> Result<AsEnumerator<'_>> {
        Ok(AsEnumerator::new(self.as_view()?, self.pool(), name))
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("size", &self.mmap.len())
            .field("header", &self.header)
            .finish()
    }
}
