//! Binary format constants and structures (version 0).
//!
//! All multi-byte fields are big-endian. Entries are decoded field by field
//! from byte slices rather than cast from raw pointers, so a mapped file is
//! never read out of bounds or at the wrong alignment.

use std::ops::Range;

use crate::{Error, Result};

/// Magic bytes identifying a location database.
pub const MAGIC: [u8; 7] = *b"LOCDBXX";

/// The only format version understood.
pub const FORMAT_VERSION: u8 = 0;

/// Magic plus version byte.
pub const MAGIC_SIZE: usize = 8;

/// Size of the version 0 header following the magic.
pub const HEADER_V0_SIZE: usize = 52;

/// Total header size in bytes.
pub const HEADER_SIZE: usize = MAGIC_SIZE + HEADER_V0_SIZE;

/// Section alignment.
pub const PAGE_SIZE: usize = 4096;

/// Network tree node: zero | one | network.
pub const NODE_SIZE: usize = 12;

/// Network record: country code | flags | asn.
pub const NETWORK_RECORD_SIZE: usize = 8;

/// AS record: number | name offset.
pub const AS_RECORD_SIZE: usize = 8;

/// Node `network` value for nodes without a record.
pub const NO_RECORD: u32 = u32::MAX;

fn read_u16(data: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([data[at], data[at + 1]])
}

fn read_u32(data: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn read_u64(data: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[at..at + 8]);
    u64::from_be_bytes(bytes)
}

/// Location of a section inside the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Section {
    pub offset: u32,
    pub length: u32,
}

impl Section {
    pub fn range(&self) -> Range<usize> {
        let start = self.offset as usize;
        start..start + self.length as usize
    }

    fn check(&self, name: &'static str, file_len: usize, element_size: usize) -> Result<()> {
        if self.range().end > file_len {
            return Err(Error::corrupt_section(
                name,
                format!(
                    "{} bytes at offset {} exceed file size {}",
                    self.length, self.offset, file_len
                ),
            ));
        }
        if self.length as usize % element_size != 0 {
            return Err(Error::corrupt_section(
                name,
                format!(
                    "length {} is not a multiple of {}",
                    self.length, element_size
                ),
            ));
        }
        Ok(())
    }
}

/// Database file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseHeader {
    /// Format version
    pub version: u8,
    /// Unix timestamp when the database was created
    pub created_at: u64,
    /// String pool offset of the vendor
    pub vendor: u32,
    /// String pool offset of the description
    pub description: u32,
    /// String pool offset of the license
    pub license: u32,
    /// Autonomous systems, sorted by number
    pub as_section: Section,
    /// Network records referenced by tree nodes
    pub network_data: Section,
    /// Network tree nodes, root first
    pub network_tree: Section,
    /// String pool
    pub pool: Section,
}

impl Default for DatabaseHeader {
    fn default() -> Self {
        Self::new()
    }
}

impl DatabaseHeader {
    /// Create an empty version 0 header.
    pub fn new() -> Self {
        Self {
            version: FORMAT_VERSION,
            created_at: 0,
            vendor: 0,
            description: 0,
            license: 0,
            as_section: Section::default(),
            network_data: Section::default(),
            network_tree: Section::default(),
            pool: Section::default(),
        }
    }

    /// Decode the header at the start of `data`, checking magic and version.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < MAGIC_SIZE {
            return Err(Error::InvalidHeaderSize {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }
        if data[..MAGIC.len()] != MAGIC {
            return Err(Error::InvalidMagic);
        }
        let version = data[MAGIC.len()];
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }
        if data.len() < HEADER_SIZE {
            return Err(Error::InvalidHeaderSize {
                expected: HEADER_SIZE,
                actual: data.len(),
            });
        }

        let h = &data[MAGIC_SIZE..HEADER_SIZE];
        let section = |at: usize| Section {
            offset: read_u32(h, at),
            length: read_u32(h, at + 4),
        };

        Ok(Self {
            version,
            created_at: read_u64(h, 0),
            vendor: read_u32(h, 8),
            description: read_u32(h, 12),
            license: read_u32(h, 16),
            as_section: section(20),
            network_data: section(28),
            network_tree: section(36),
            pool: section(44),
        })
    }

    /// Check that every section lies inside a file of `file_len` bytes and
    /// holds a whole number of entries.
    pub fn validate(&self, file_len: usize) -> Result<()> {
        self.as_section.check("AS", file_len, AS_RECORD_SIZE)?;
        self.network_data.check("network data", file_len, NETWORK_RECORD_SIZE)?;
        self.network_tree.check("network tree", file_len, NODE_SIZE)?;
        self.pool.check("string pool", file_len, 1)?;
        Ok(())
    }

    /// Encode the header including the magic.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = Vec::with_capacity(HEADER_SIZE);
        out.extend_from_slice(&MAGIC);
        out.push(self.version);
        out.extend_from_slice(&self.created_at.to_be_bytes());
        for value in [
            self.vendor,
            self.description,
            self.license,
            self.as_section.offset,
            self.as_section.length,
            self.network_data.offset,
            self.network_data.length,
            self.network_tree.offset,
            self.network_tree.length,
            self.pool.offset,
            self.pool.length,
        ] {
            out.extend_from_slice(&value.to_be_bytes());
        }

        let mut bytes = [0u8; HEADER_SIZE];
        bytes.copy_from_slice(&out);
        bytes
    }

    /// Number of nodes in the network tree.
    pub fn node_count(&self) -> usize {
        self.network_tree.length as usize / NODE_SIZE
    }

    /// Number of network records.
    pub fn network_record_count(&self) -> usize {
        self.network_data.length as usize / NETWORK_RECORD_SIZE
    }

    /// Number of autonomous systems.
    pub fn as_count(&self) -> usize {
        self.as_section.length as usize / AS_RECORD_SIZE
    }
}

/// Network tree node (12 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEntry {
    /// Index of the zero child, 0 if none
    pub zero: u32,
    /// Index of the one child, 0 if none
    pub one: u32,
    /// Index into the network records, or [`NO_RECORD`]
    pub network: u32,
}

impl NodeEntry {
    pub fn decode(data: &[u8]) -> Self {
        Self {
            zero: read_u32(data, 0),
            one: read_u32(data, 4),
            network: read_u32(data, 8),
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.zero.to_be_bytes());
        out.extend_from_slice(&self.one.to_be_bytes());
        out.extend_from_slice(&self.network.to_be_bytes());
    }

    /// Child in direction `bit`. The root is never a child, so 0 means none.
    pub fn child(&self, bit: bool) -> Option<u32> {
        let index = if bit { self.one } else { self.zero };
        (index != 0).then_some(index)
    }

    /// Record index carried by this node.
    pub fn record(&self) -> Option<u32> {
        (self.network != NO_RECORD).then_some(self.network)
    }
}

/// Network record (8 bytes). Address and prefix are implied by the node
/// that refers to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NetworkEntry {
    /// ASCII country code, `"\0\0"` if none
    pub country_code: [u8; 2],
    /// Network flags
    pub flags: u16,
    /// Autonomous system number, 0 if none
    pub asn: u32,
}

impl NetworkEntry {
    pub fn decode(data: &[u8]) -> Self {
        Self {
            country_code: [data[0], data[1]],
            flags: read_u16(data, 2),
            asn: read_u32(data, 4),
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.country_code);
        out.extend_from_slice(&self.flags.to_be_bytes());
        out.extend_from_slice(&self.asn.to_be_bytes());
    }
}

/// Autonomous system record (8 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AsEntry {
    /// AS number
    pub number: u32,
    /// String pool offset of the name
    pub name: u32,
}

impl AsEntry {
    pub fn decode(data: &[u8]) -> Self {
        Self {
            number: read_u32(data, 0),
            name: read_u32(data, 4),
        }
    }

    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.number.to_be_bytes());
        out.extend_from_slice(&self.name.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> DatabaseHeader {
        DatabaseHeader {
            created_at: 1_700_000_000,
            vendor: 1,
            description: 2,
            license: 3,
            as_section: Section { offset: 4096, length: 16 },
            network_data: Section { offset: 8192, length: 8 },
            network_tree: Section { offset: 12288, length: 24 },
            pool: Section { offset: 16384, length: 10 },
            ..DatabaseHeader::new()
        }
    }

    #[test]
    fn test_header_layout() {
        let bytes = sample_header().to_bytes();
        assert_eq!(bytes.len(), 60);
        assert_eq!(&bytes[..7], b"LOCDBXX");
        assert_eq!(bytes[7], 0);
        assert_eq!(&bytes[8..16], &1_700_000_000u64.to_be_bytes());
        assert_eq!(&bytes[20..24], &2u32.to_be_bytes());
        assert_eq!(&bytes[56..60], &10u32.to_be_bytes());
    }

    #[test]
    fn test_header_parse_roundtrip() {
        let header = sample_header();
        assert_eq!(DatabaseHeader::parse(&header.to_bytes()).unwrap(), header);
    }

    #[test]
    fn test_header_validation() {
        let header = sample_header();
        assert!(header.validate(16394).is_ok());
        assert!(matches!(
            header.validate(16000),
            Err(Error::CorruptSection { section: "string pool", .. })
        ));

        let mut bad = header;
        bad.network_tree.length = 25;
        assert!(matches!(
            bad.validate(16394),
            Err(Error::CorruptSection { section: "network tree", .. })
        ));
    }

    #[test]
    fn test_header_parse_errors() {
        let mut bytes = sample_header().to_bytes();
        bytes[0] = b'X';
        assert!(matches!(DatabaseHeader::parse(&bytes), Err(Error::InvalidMagic)));

        let mut bytes = sample_header().to_bytes();
        bytes[7] = 1;
        assert!(matches!(DatabaseHeader::parse(&bytes), Err(Error::UnsupportedVersion(1))));

        let bytes = sample_header().to_bytes();
        assert!(matches!(
            DatabaseHeader::parse(&bytes[..30]),
            Err(Error::InvalidHeaderSize { expected: 60, actual: 30 })
        ));
        assert!(DatabaseHeader::parse(b"LOC").is_err());
    }

    #[test]
    fn test_entry_encoding() {
        let node = NodeEntry { zero: 1, one: 0, network: NO_RECORD };
        let mut out = Vec::new();
        node.encode(&mut out);
        assert_eq!(out.len(), NODE_SIZE);
        assert_eq!(NodeEntry::decode(&out), node);
        assert_eq!(node.child(false), Some(1));
        assert_eq!(node.child(true), None);
        assert_eq!(node.record(), None);

        let record = NetworkEntry { country_code: *b"DE", flags: 0b0101, asn: 64512 };
        let mut out = Vec::new();
        record.encode(&mut out);
        assert_eq!(out, vec![b'D', b'E', 0, 5, 0, 0, 0xfc, 0]);
        assert_eq!(NetworkEntry::decode(&out), record);

        let entry = AsEntry { number: 204867, name: 9 };
        let mut out = Vec::new();
        entry.encode(&mut out);
        assert_eq!(out.len(), AS_RECORD_SIZE);
        assert_eq!(AsEntry::decode(&out), entry);
    }
}
