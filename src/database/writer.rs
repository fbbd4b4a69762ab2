//! Database file writer.

use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use super::codec::flatten;
use super::format::*;
use crate::autonomous_system::AutonomousSystem;
use crate::network::Network;
use crate::stringpool::StringPoolBuilder;
use crate::tree::NetworkTree;
use crate::{Error, Result};

/// Collects metadata, autonomous systems and networks and serializes them
/// into a database file.
#[derive(Debug, Default)]
pub struct DatabaseWriter {
    created_at: Option<u64>,
    vendor: String,
    description: String,
    license: String,
    autonomous_systems: BTreeMap<u32, AutonomousSystem>,
    tree: NetworkTree,
    buffer: Vec<u8>,
}

impl DatabaseWriter {
    /// Create a new writer.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_vendor(&mut self, vendor: impl Into<String>) {
        self.vendor = vendor.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn set_license(&mut self, license: impl Into<String>) {
        self.license = license.into();
    }

    /// Set the creation timestamp. Defaults to the time of writing.
    pub fn set_created_at(&mut self, created_at: u64) {
        self.created_at = Some(created_at);
    }

    /// Add an autonomous system, replacing any earlier one with the same
    /// number.
    pub fn add_as(&mut self, number: u32, name: impl Into<String>) -> &mut AutonomousSystem {
        let autonomous_system = self
            .autonomous_systems
            .entry(number)
            .or_insert_with(|| AutonomousSystem::new(number, ""));
        autonomous_system.set_name(name);
        autonomous_system
    }

    /// Add a network.
    pub fn add_network(&mut self, network: Network) -> Result<()> {
        self.tree.insert(network)
    }

    /// The networks added so far.
    pub fn tree(&self) -> &NetworkTree {
        &self.tree
    }

    /// Clean up the network tree and serialize everything.
    pub fn write(&mut self) -> Result<Vec<u8>> {
        self.tree.cleanup()?;
        let flattened = flatten(&self.tree)?;

        self.buffer.clear();

        // Reserve space for header
        self.buffer.resize(HEADER_SIZE, 0);

        let mut pool = StringPoolBuilder::new();
        let mut header = DatabaseHeader::new();
        header.created_at = self.created_at.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs()
        });
        header.vendor = pool.add(&self.vendor)?;
        header.description = pool.add(&self.description)?;
        header.license = pool.add(&self.license)?;

        // Autonomous systems, sorted by number
        let mut as_bytes = Vec::with_capacity(self.autonomous_systems.len() * AS_RECORD_SIZE);
        for autonomous_system in self.autonomous_systems.values() {
            AsEntry {
                number: autonomous_system.number(),
                name: pool.add(autonomous_system.name())?,
            }
            .encode(&mut as_bytes);
        }
        header.as_section = self.write_section("AS", &as_bytes)?;

        header.network_data = self.write_section("network data", &flattened.record_bytes())?;
        header.network_tree = self.write_section("network tree", &flattened.node_bytes())?;
        header.pool = self.write_section("string pool", pool.as_bytes())?;

        self.buffer[..HEADER_SIZE].copy_from_slice(&header.to_bytes());

        info!(
            "Wrote database: {} networks in {} nodes ({} records), {} ASes, {} bytes",
            self.tree.count_networks(),
            flattened.nodes.len(),
            flattened.records.len(),
            self.autonomous_systems.len(),
            self.buffer.len()
        );
        Ok(std::mem::take(&mut self.buffer))
    }

    /// Write the database to `path`.
    pub fn write_to_path(&mut self, path: &Path) -> Result<()> {
        let data = self.write()?;
        let mut file = fs::File::create(path)?;
        file.write_all(&data)?;
        Ok(())
    }

    /// Pad to the next page boundary and append `data`.
    fn write_section(&mut self, name: &'static str, data: &[u8]) -> Result<Section> {
        let aligned = self.buffer.len().div_ceil(PAGE_SIZE) * PAGE_SIZE;
        self.buffer.resize(aligned, 0);

        let offset = u32::try_from(aligned).map_err(|_| Error::SectionOverflow(name))?;
        let length = u32::try_from(data.len()).map_err(|_| Error::SectionOverflow(name))?;
        if offset.checked_add(length).is_none() {
            return Err(Error::SectionOverflow(name));
        }

        self.buffer.extend_from_slice(data);
        debug!("Wrote {} section: {} bytes at offset {}", name, length, offset);
        Ok(Section { offset, length })
    }
}
