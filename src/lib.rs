//! locdb - A compact, memory-mappable IP location database.
//!
//! This crate builds and queries databases that map IPv4 and IPv6 networks
//! to a country, an autonomous system and a set of flags.
//!
//! # Features
//!
//! - **Longest-prefix match**: find the most specific network containing an address
//! - **IPv4 and IPv6**: IPv4 is stored as IPv4-mapped IPv6, one tree serves both
//! - **Memory-mapped format**: opening a database does not read it into memory
//! - **Enumeration**: iterate networks filtered by country, ASN, flags or family
//! - **Set algebra**: exclude networks from each other, summarize address ranges
//! - **Hot reload**: swap in a new database while lookups keep running
//!
//! # Quick Start
//!
//! ```ignore
//! use locdb::{Database, DatabaseWriter, Network};
//!
//! // Build a database
//! let mut writer = DatabaseWriter::new();
//! writer.set_vendor("Example Networks");
//! writer.add_as(64512, "Example Transit");
//! writer.add_network("10.0.0.0/8".parse::<Network>()?.with_country_code("DE")?.with_asn(64512))?;
//! let data = writer.write()?;
//!
//! // Query it
//! let db = Database::from_bytes(data)?;
//! let network = db.lookup_str("10.1.2.3")?.unwrap();
//! assert_eq!(network.country_code().unwrap().as_str(), "DE");
//! ```
//!
//! # Enumerating Networks
//!
//! ```ignore
//! use locdb::{Database, NetworkFilter};
//! use std::path::Path;
//!
//! let db = Database::open(Path::new("location.db"))?;
//! for network in db.networks(NetworkFilter::new().country_code("DE")?)? {
//!     println!("{}", network?);
//! }
//! ```
//!
//! # Network Lists
//!
//! ```ignore
//! use locdb::{exclude_list, summarize, NetworkList};
//!
//! let excluded: NetworkList = ["10.0.0.128/25".parse()?].into_iter().collect();
//! let rest = exclude_list(&"10.0.0.0/24".parse()?, &excluded);
//! assert_eq!(rest.first().unwrap().to_string(), "10.0.0.0/25");
//!
//! let blocks = summarize("192.0.2.0".parse()?, "192.0.2.130".parse()?)?;
//! ```

mod error;

pub mod address;
pub mod autonomous_system;
pub mod country;
pub mod database;
pub mod network;
pub mod network_list;
pub mod source;
pub mod stringpool;
pub mod tree;

// Re-export core types
pub use error::{Error, Result};
pub use address::{Address, AddressFamily};
pub use autonomous_system::AutonomousSystem;
pub use country::CountryCode;
pub use network::{Network, NetworkFlags};

// Re-export set algebra
pub use network_list::{exclude, exclude_list, summarize, NetworkList};

// Re-export builder types
pub use source::DatabaseSource;
pub use tree::NetworkTree;

// Re-export database types
pub use database::{
    Database, DatabaseWriter, NetworkFilter, SharedDatabase, SharedDatabaseConfig,
};
