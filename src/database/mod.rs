//! Binary database format for storing and querying location data.
//!
//! The file is a fixed header followed by page-aligned sections. Readers
//! memory-map the file and decode entries in place, so opening a database
//! costs the same regardless of its size.
//!
//! # File Structure
//!
//! ```text
//! +------------------+
//! |  MAGIC + VERSION |  8 bytes ("LOCDBXX", 0)
//! +------------------+
//! |     HEADER       |  52 bytes (fixed)
//! +------------------+
//! |   AS SECTION     |  8 bytes per AS, sorted by number
//! +------------------+
//! |  NETWORK DATA    |  8 bytes per record
//! +------------------+
//! |  NETWORK TREE    |  12 bytes per node, root first
//! +------------------+
//! |   STRING POOL    |  NUL-terminated strings
//! +------------------+
//! ```

mod codec;
mod enumerator;
mod format;
mod reader;
mod shared;
pub mod writer;


pub use codec::{flatten, AsView, FlattenedTree, RecordView, TreeView};
pub use enumerator::{AsEnumerator, NetworkEnumerator, NetworkFilter};
pub use format::*;
pub use reader::Database;
pub use shared::{CacheStats, SharedDatabase, SharedDatabaseConfig};
pub use writer::DatabaseWriter;
