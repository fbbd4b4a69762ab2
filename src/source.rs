//! Database source descriptions.
//!
//! A source file lists the metadata, autonomous systems and networks that go
//! into a database. It can be written as JSON or YAML:
//!
//! ```yaml
//! vendor: Example Networks
//! description: Example location data
//! license: CC BY-SA 4.0
//! autonomous_systems:
//!   - number: 64512
//!     name: Example Transit
//! networks:
//!   - network: 10.0.0.0/8
//!     country_code: DE
//!     asn: 64512
//!   - network: 2001:db8::/32
//!     flags: [anycast]
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::database::{Database, DatabaseWriter, NetworkFilter};
use crate::network::{Network, NetworkFlags};
use crate::{Error, Result};

/// Everything needed to build a database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSource {
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub license: String,
    /// Unix timestamp; the time of writing when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<u64>,
    #[serde(default)]
    pub autonomous_systems: Vec<AsSource>,
    #[serde(default)]
    pub networks: Vec<NetworkSource>,
}

/// An autonomous system entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsSource {
    pub number: u32,
    #[serde(default)]
    pub name: String,
}

/// A network entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSource {
    /// `addr/prefix`, or a bare address for a host network
    pub network: String,
    /// Two-letter country code, or `A1`/`A2`/`A3`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
    /// Flag names such as `anycast` or `anonymous-proxy`
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
}

impl NetworkSource {
    /// Parse into a [`Network`] with its attributes.
    pub fn to_network(&self) -> Result<Network> {
        let mut network: Network = self.network.parse()?;

        if let Some(ref code) = self.country_code {
            network.set_country_code(code)?;
        }
        if let Some(asn) = self.asn {
            network.set_asn(asn);
        }

        let mut flags = NetworkFlags::empty();
        for name in &self.flags {
            flags |= NetworkFlags::from_flag_name(name).ok_or_else(|| {
                Error::Config(format!("unknown flag {:?} on {}", name, self.network))
            })?;
        }
        network.add_flags(flags);
        Ok(network)
    }

    fn from_network(network: &Network) -> Self {
        Self {
            network: network.to_string(),
            country_code: network.country_code().map(|c| c.to_string()),
            asn: network.asn(),
            flags: network.flags().names().into_iter().map(String::from).collect(),
        }
    }
}

impl DatabaseSource {
    /// Parse a JSON source.
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Parse a YAML source.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(content)?)
    }

    /// Load a source file, choosing the parser by extension.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            _ => Err(Error::Config(format!(
                "unsupported source file {:?}: expected .json, .yaml or .yml",
                path
            ))),
        }
    }

    /// Export the contents of an opened database.
    pub fn from_database(db: &Database) -> Result<Self> {
        let autonomous_systems = db
            .autonomous_systems("")?
            .map(|a| {
                a.map(|a| AsSource {
                    number: a.number(),
                    name: a.name().to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let networks = db
            .networks(NetworkFilter::new())?
            .map(|n| n.map(|n| NetworkSource::from_network(&n)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            vendor: db.vendor().to_string(),
            description: db.description().to_string(),
            license: db.license().to_string(),
            created_at: Some(db.created_at()),
            autonomous_systems,
            networks,
        })
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Build a writer holding everything in this source.
    pub fn into_writer(self) -> Result<DatabaseWriter> {
        let mut writer = DatabaseWriter::new();
        writer.set_vendor(self.vendor);
        writer.set_description(self.description);
        writer.set_license(self.license);
        if let Some(created_at) = self.created_at {
            writer.set_created_at(created_at);
        }

        for autonomous_system in self.autonomous_systems {
            writer.add_as(autonomous_system.number, autonomous_system.name);
        }
        for entry in &self.networks {
            writer.add_network(entry.to_network()?)?;
        }
        Ok(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const YAML: &str = r#"
vendor: Example Networks
description: Example location data
license: CC BY-SA 4.0
created_at: 1700000000
autonomous_systems:
  - number: 64512
    name: Example Transit
networks:
  - network: 10.0.0.0/8
    country_code: DE
    asn: 64512
  - network: 198.18.0.0/15
    country_code: A1
  - network: 2001:db8::/32
    flags: [anycast, drop]
"#;

    #[test]
    fn test_parse_yaml() {
        let source = DatabaseSource::from_yaml_str(YAML).unwrap();
        assert_eq!(source.vendor, "Example Networks");
        assert_eq!(source.created_at, Some(1_700_000_000));
        assert_eq!(source.autonomous_systems.len(), 1);
        assert_eq!(source.networks.len(), 3);
        assert_eq!(source.networks[2].flags, vec!["anycast", "drop"]);
    }

    #[test]
    fn test_parse_json_with_defaults() {
        let source = DatabaseSource::from_json_str(
            r#"{"networks": [{"network": "192.0.2.1"}]}"#,
        )
        .unwrap();
        assert_eq!(source.vendor, "");
        assert!(source.created_at.is_none());
        assert!(source.autonomous_systems.is_empty());

        let network = source.networks[0].to_network().unwrap();
        assert_eq!(network.to_string(), "192.0.2.1/32");
        assert!(!network.has_attributes());
    }

    #[test]
    fn test_network_attributes() {
        let source = DatabaseSource::from_yaml_str(YAML).unwrap();

        let first = source.networks[0].to_network().unwrap();
        assert_eq!(first.country_code().unwrap().as_str(), "DE");
        assert_eq!(first.asn(), Some(64512));

        let proxy = source.networks[1].to_network().unwrap();
        assert!(proxy.has_flag(NetworkFlags::ANONYMOUS_PROXY));
        assert!(proxy.country_code().is_none());

        let anycast = source.networks[2].to_network().unwrap();
        assert_eq!(anycast.flags(), NetworkFlags::ANYCAST | NetworkFlags::DROP);
    }

    #[test]
    fn test_invalid_entries() {
        let entry = |network: &str, country: Option<&str>, flags: &[&str]| NetworkSource {
            network: network.to_string(),
            country_code: country.map(String::from),
            asn: None,
            flags: flags.iter().map(|s| s.to_string()).collect(),
        };

        assert!(matches!(
            entry("10.0.0.0/8", None, &["teleport"]).to_network(),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            entry("10.0.0.0/8", Some("germany"), &[]).to_network(),
            Err(Error::InvalidCountryCode(_))
        ));
        assert!(matches!(
            entry("10.0.0.0/33", None, &[]).to_network(),
            Err(Error::InvalidAddress(_))
        ));
        assert!(DatabaseSource::from_yaml_str("networks: 5").is_err());
    }

    #[test]
    fn test_into_writer() {
        let source = DatabaseSource::from_yaml_str(YAML).unwrap();
        let mut writer = source.into_writer().unwrap();
        assert_eq!(writer.tree().count_networks(), 3);

        let db = Database::from_bytes(writer.write().unwrap()).unwrap();
        assert_eq!(db.vendor(), "Example Networks");
        assert_eq!(db.created_at(), 1_700_000_000);
        assert_eq!(db.get_as(64512).unwrap().unwrap().name(), "Example Transit");
        assert_eq!(db.lookup_str("10.1.1.1").unwrap().unwrap().asn(), Some(64512));
    }

    #[test]
    fn test_pseudo_country_exports_as_flag() {
        let source = DatabaseSource::from_yaml_str(YAML).unwrap();
        let db = Database::from_bytes(source.into_writer().unwrap().write().unwrap()).unwrap();

        let exported = DatabaseSource::from_database(&db).unwrap();
        let proxy = &exported.networks[1];
        assert_eq!(proxy.network, "198.18.0.0/15");
        assert!(proxy.country_code.is_none());
        assert_eq!(proxy.flags, vec!["anonymous-proxy"]);
    }

    #[test]
    fn test_export_round_trip() {
        let source = DatabaseSource::from_yaml_str(
            r#"
vendor: Example Networks
created_at: 1700000000
autonomous_systems:
  - number: 3320
    name: Deutsche Telekom AG
networks:
  - network: 10.0.0.0/8
    country_code: DE
    asn: 3320
  - network: 198.18.0.0/15
    flags: [anonymous-proxy, drop]
  - network: 2001:db8::/32
    country_code: FR
"#,
        )
        .unwrap();
        let db = Database::from_bytes(source.clone().into_writer().unwrap().write().unwrap())
            .unwrap();

        let exported = DatabaseSource::from_database(&db).unwrap();
        assert_eq!(exported, source);

        let json = exported.to_json_string().unwrap();
        assert_eq!(DatabaseSource::from_json_str(&json).unwrap(), source);
        let yaml = exported.to_yaml_string().unwrap();
        assert_eq!(DatabaseSource::from_yaml_str(&yaml).unwrap(), source);
    }

    #[test]
    fn test_from_path_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let yaml_path = dir.path().join("source.yml");
        fs::write(&yaml_path, YAML).unwrap();
        assert_eq!(DatabaseSource::from_path(&yaml_path).unwrap().networks.len(), 3);

        let json_path = dir.path().join("source.json");
        fs::write(&json_path, r#"{"vendor": "json"}"#).unwrap();
        assert_eq!(DatabaseSource::from_path(&json_path).unwrap().vendor, "json");

        let txt_path = dir.path().join("source.txt");
        fs::write(&txt_path, YAML).unwrap();
        assert!(matches!(
            DatabaseSource::from_path(&txt_path),
            Err(Error::Config(_))
        ));
    }
}
