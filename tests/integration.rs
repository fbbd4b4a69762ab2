//! End-to-end tests through the public API: source files, database files on
//! disk, lookups, enumeration and hot reload.

use locdb::{
    exclude_list, summarize, AddressFamily, Database, DatabaseSource, DatabaseWriter, Network,
    NetworkFilter, NetworkFlags, NetworkList, SharedDatabase, SharedDatabaseConfig,
};
use std::fs;
use std::sync::Arc;
use std::thread;

const SOURCE_YAML: &str = r#"
vendor: Example Networks
description: Integration test data
license: CC0
created_at: 1700000000
autonomous_systems:
  - number: 3320
    name: Deutsche Telekom AG
  - number: 15169
    name: Google LLC
networks:
  - network: 81.0.0.0/8
    country_code: DE
    asn: 3320
  - network: 81.200.0.0/16
    country_code: AT
  - network: 8.8.8.0/24
    country_code: US
    asn: 15169
  - network: 2001:db8::/32
    country_code: DE
  - network: 2001:db8:ffff::/48
    country_code: DE
  - network: 2001:4860::/32
    country_code: US
    asn: 15169
    flags: [anycast]
"#;

fn country(network: Option<Network>) -> Option<String> {
    network
        .and_then(|n| n.country_code())
        .map(|c| c.to_string())
}

fn net(s: &str) -> Network {
    s.parse().unwrap()
}

#[test]
fn test_build_from_yaml_and_open_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("source.yaml");
    let db_path = dir.path().join("location.db");
    fs::write(&source_path, SOURCE_YAML).unwrap();

    let source = DatabaseSource::from_path(&source_path).unwrap();
    source.into_writer().unwrap().write_to_path(&db_path).unwrap();

    let db = Database::open(&db_path).unwrap();
    assert_eq!(db.vendor(), "Example Networks");
    assert_eq!(db.description(), "Integration test data");
    assert_eq!(db.license(), "CC0");
    assert_eq!(db.created_at(), 1_700_000_000);
    assert_eq!(db.as_count(), 2);

    assert_eq!(country(db.lookup_str("81.1.2.3").unwrap()).as_deref(), Some("DE"));
    assert_eq!(country(db.lookup_str("81.200.1.1").unwrap()).as_deref(), Some("AT"));
    assert_eq!(country(db.lookup_str("8.8.8.8").unwrap()).as_deref(), Some("US"));
    assert!(db.lookup_str("1.1.1.1").unwrap().is_none());

    let google = db.lookup_str("2001:4860:4860::8888").unwrap().unwrap();
    assert_eq!(google.asn(), Some(15169));
    assert!(google.has_flag(NetworkFlags::ANYCAST));
    assert_eq!(db.get_as(15169).unwrap().unwrap().name(), "Google LLC");
}

#[test]
fn test_subnet_with_same_country_is_folded() {
    let source = DatabaseSource::from_yaml_str(SOURCE_YAML).unwrap();
    let db = Database::from_bytes(source.into_writer().unwrap().write().unwrap()).unwrap();

    for address in ["2001:db8::1", "2001:db8:ffff::1"] {
        let network = db.lookup_str(address).unwrap().unwrap();
        assert_eq!(network.country_code().unwrap().as_str(), "DE");
        assert_eq!(network.to_string(), "2001:db8::/32");
    }

    let german: Vec<String> = db
        .networks(NetworkFilter::new().country_code("DE").unwrap())
        .unwrap()
        .map(|n| n.unwrap().to_string())
        .collect();
    assert_eq!(german, vec!["81.0.0.0/8", "2001:db8::/32"]);
}

#[test]
fn test_json_source_matches_yaml_source() {
    let yaml = DatabaseSource::from_yaml_str(SOURCE_YAML).unwrap();
    let json = DatabaseSource::from_json_str(&yaml.to_json_string().unwrap()).unwrap();
    assert_eq!(yaml, json);

    let a = yaml.into_writer().unwrap().write().unwrap();
    let b = json.into_writer().unwrap().write().unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_enumerate_by_family_and_asn() {
    let source = DatabaseSource::from_yaml_str(SOURCE_YAML).unwrap();
    let db = Database::from_bytes(source.into_writer().unwrap().write().unwrap()).unwrap();

    let collect = |filter: NetworkFilter| -> Vec<String> {
        db.networks(filter)
            .unwrap()
            .map(|n| n.unwrap().to_string())
            .collect()
    };

    assert_eq!(
        collect(NetworkFilter::new().family(AddressFamily::V4)),
        vec!["8.8.8.0/24", "81.0.0.0/8", "81.200.0.0/16"]
    );
    assert_eq!(
        collect(NetworkFilter::new().asn(15169)),
        vec!["8.8.8.0/24", "2001:4860::/32"]
    );
    assert_eq!(
        collect(NetworkFilter::new().country_code("A3").unwrap()),
        vec!["2001:4860::/32"]
    );
}

#[test]
fn test_shared_database_reload_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("location.db");

    let mut writer = DatabaseWriter::new();
    writer
        .add_network(net("192.0.2.0/24").with_country_code("NL").unwrap())
        .unwrap();
    writer.write_to_path(&path).unwrap();

    let db = SharedDatabase::open(&path).unwrap();
    assert_eq!(country(db.lookup_str("192.0.2.1").unwrap()).as_deref(), Some("NL"));

    let mut writer = DatabaseWriter::new();
    writer
        .add_network(net("192.0.2.0/24").with_country_code("BE").unwrap())
        .unwrap();
    writer.write_to_path(&path).unwrap();

    db.reload(&path).unwrap();
    assert_eq!(db.generation(), 1);
    assert_eq!(country(db.lookup_str("192.0.2.1").unwrap()).as_deref(), Some("BE"));
}

#[test]
fn test_concurrent_lookups() {
    let source = DatabaseSource::from_yaml_str(SOURCE_YAML).unwrap();
    let data = source.into_writer().unwrap().write().unwrap();
    let db = Arc::new(
        SharedDatabase::from_bytes_with_config(data, SharedDatabaseConfig::with_capacity(64))
            .unwrap(),
    );

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let db = Arc::clone(&db);
            thread::spawn(move || {
                for j in 0..200u32 {
                    let address = format!("81.{}.{}.{}", i, j % 256, j % 7);
                    let network = db.lookup_str(&address).unwrap().unwrap();
                    assert_eq!(network.asn(), Some(3320));

                    let snapshot = db.snapshot();
                    let mut networks = snapshot.networks(NetworkFilter::new()).unwrap();
                    assert!(networks.next().is_some());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
    assert!(db.cache_stats().len <= 64);
}

#[test]
fn test_exclude_and_summarize() {
    let excluded: NetworkList = [net("10.0.0.128/25")].into_iter().collect();
    let remaining = exclude_list(&net("10.0.0.0/24"), &excluded);
    let remaining: Vec<String> = remaining.iter().map(|n| n.to_string()).collect();
    assert_eq!(remaining, vec!["10.0.0.0/25"]);

    let blocks = summarize("192.0.2.0".parse().unwrap(), "192.0.2.130".parse().unwrap()).unwrap();
    let blocks: Vec<String> = blocks.iter().map(|n| n.to_string()).collect();
    assert_eq!(blocks, vec!["192.0.2.0/25", "192.0.2.128/31", "192.0.2.130/32"]);

    assert!(summarize("10.0.0.1".parse().unwrap(), "::1".parse().unwrap()).is_err());
}
