//! Error types for locdb.

use thiserror::Error;

/// Error type for locdb operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid database file magic bytes
    #[error("invalid magic bytes: not a location database")]
    InvalidMagic,

    /// Unsupported database format version
    #[error("unsupported format version: {0}")]
    UnsupportedVersion(u8),

    /// File too short to hold a header
    #[error("invalid header size: expected {expected}, got {actual}")]
    InvalidHeaderSize { expected: usize, actual: usize },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed address literal
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Two addresses of different families were compared or combined
    #[error("address family mismatch")]
    AddressFamilyMismatch,

    /// Prefix exceeds the bit width of the address family
    #[error("invalid prefix /{prefix}: maximum is /{max}")]
    InvalidPrefix { prefix: u8, max: u8 },

    /// Invalid country code
    #[error("invalid country code: {0}")]
    InvalidCountryCode(String),

    /// A different network already occupies this position in the tree
    #[error("duplicate network: {0}")]
    DuplicateNetwork(String),

    /// A section of the database file is malformed
    #[error("corrupt {section} section: {reason}")]
    CorruptSection {
        section: &'static str,
        reason: String,
    },

    /// The network tree references data outside of its sections
    #[error("corrupt network tree: {0}")]
    CorruptTree(String),

    /// A section does not fit into the 32-bit offsets of the format
    #[error("{0} section is too large for the database format")]
    SectionOverflow(&'static str),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for locdb operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn corrupt_section(section: &'static str, reason: impl Into<String>) -> Self {
        Error::CorruptSection {
            section,
            reason: reason.into(),
        }
    }
}
