//! locdb: CLI tool for building and querying location databases.

use clap::{Parser, Subcommand};
use locdb::{
    exclude_list, summarize, AddressFamily, Database, DatabaseSource, Network, NetworkFilter,
    NetworkFlags, NetworkList,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "locdb")]
#[command(version = "0.1.0")]
#[command(about = "Build and query IP location databases", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a database from a JSON or YAML source file
    Build {
        /// Input source file (.json, .yaml or .yml)
        #[arg(short, long)]
        input: PathBuf,

        /// Output database file
        #[arg(short, long)]
        output: PathBuf,

        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Export a database as a JSON or YAML source file
    Export {
        /// Database file
        #[arg(short, long)]
        database: PathBuf,

        /// Output source file (.json, .yaml or .yml)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Look up the network of one or more addresses
    Lookup {
        /// Database file
        #[arg(short, long)]
        database: PathBuf,

        /// Addresses to look up
        #[arg(required = true)]
        addresses: Vec<String>,
    },

    /// List networks matching the given filters
    ListNetworks {
        /// Database file
        #[arg(short, long)]
        database: PathBuf,

        /// Country code (A1, A2 and A3 select the matching flag)
        #[arg(long)]
        country_code: Option<String>,

        /// Autonomous system number
        #[arg(long)]
        asn: Option<u32>,

        /// Flag name, can be repeated
        #[arg(long = "flag")]
        flags: Vec<String>,

        /// Only IPv4 networks
        #[arg(long, conflicts_with = "ipv6")]
        ipv4: bool,

        /// Only IPv6 networks
        #[arg(long)]
        ipv6: bool,
    },

    /// Search autonomous systems by name
    SearchAs {
        /// Database file
        #[arg(short, long)]
        database: PathBuf,

        /// Case-insensitive substring of the name
        #[arg(default_value = "")]
        name: String,
    },

    /// Show database metadata
    Info {
        /// Database file
        #[arg(short, long)]
        database: PathBuf,
    },

    /// Print the smallest list of networks covering an address range
    Summarize {
        /// First address of the range
        first: String,

        /// Last address of the range
        last: String,
    },

    /// Print what remains of a network after removing others from it
    Exclude {
        /// Network to cut from
        network: String,

        /// Networks to remove
        #[arg(required = true)]
        excluded: Vec<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Build {
            input,
            output,
            verbose,
        } => build(&input, &output, verbose),
        Commands::Export { database, output } => export(&database, &output),
        Commands::Lookup {
            database,
            addresses,
        } => lookup(&database, &addresses),
        Commands::ListNetworks {
            database,
            country_code,
            asn,
            flags,
            ipv4,
            ipv6,
        } => {
            let family = match (ipv4, ipv6) {
                (true, _) => Some(AddressFamily::V4),
                (_, true) => Some(AddressFamily::V6),
                _ => None,
            };
            list_networks(&database, country_code.as_deref(), asn, &flags, family)
        }
        Commands::SearchAs { database, name } => search_as(&database, &name),
        Commands::Info { database } => info(&database),
        Commands::Summarize { first, last } => summarize_range(&first, &last),
        Commands::Exclude { network, excluded } => exclude_networks(&network, &excluded),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn build(input: &Path, output: &Path, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    if verbose {
        println!("Reading source file: {:?}", input);
    }

    let source = DatabaseSource::from_path(input)?;
    if verbose {
        println!(
            "Parsed source: {} networks, {} autonomous systems",
            source.networks.len(),
            source.autonomous_systems.len()
        );
    }

    let mut writer = source.into_writer()?;
    let data = writer.write()?;

    if verbose {
        println!("Writing output file: {:?} ({} bytes)", output, data.len());
    }
    fs::write(output, &data)?;

    println!("Successfully built {:?} -> {:?}", input, output);
    Ok(())
}

fn export(database: &Path, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(database)?;
    let source = DatabaseSource::from_database(&db)?;

    let content = match output.extension().and_then(|e| e.to_str()) {
        Some("json") => source.to_json_string()?,
        Some("yaml") | Some("yml") => source.to_yaml_string()?,
        _ => return Err(format!("unsupported output file {:?}", output).into()),
    };
    fs::write(output, content)?;

    println!(
        "Exported {} networks and {} autonomous systems to {:?}",
        source.networks.len(),
        source.autonomous_systems.len(),
        output
    );
    Ok(())
}

fn describe(db: &Database, network: &Network) -> Result<String, Box<dyn std::error::Error>> {
    let mut parts = vec![network.to_string()];

    if let Some(country) = network.country_code() {
        parts.push(format!("country {}", country));
    }
    if let Some(asn) = network.asn() {
        match db.get_as(asn)? {
            Some(autonomous_system) => parts.push(autonomous_system.to_string()),
            None => parts.push(format!("AS{}", asn)),
        }
    }
    let flags = network.flags().names();
    if !flags.is_empty() {
        parts.push(format!("flags {}", flags.join(",")));
    }
    Ok(parts.join(", "))
}

fn lookup(database: &Path, addresses: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(database)?;

    for address in addresses {
        match db.lookup_str(address)? {
            Some(network) => println!("{}: {}", address, describe(&db, &network)?),
            None => println!("{}: not found", address),
        }
    }
    Ok(())
}

fn list_networks(
    database: &Path,
    country_code: Option<&str>,
    asn: Option<u32>,
    flags: &[String],
    family: Option<AddressFamily>,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(database)?;

    let mut filter = NetworkFilter::new();
    if let Some(code) = country_code {
        filter = filter.country_code(code)?;
    }
    if let Some(asn) = asn {
        filter = filter.asn(asn);
    }
    for name in flags {
        let flag = NetworkFlags::from_flag_name(name)
            .ok_or_else(|| format!("unknown flag {:?}", name))?;
        filter = filter.flags(flag);
    }
    if let Some(family) = family {
        filter = filter.family(family);
    }

    for network in db.networks(filter)? {
        println!("{}", network?);
    }
    Ok(())
}

fn search_as(database: &Path, name: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(database)?;

    for autonomous_system in db.autonomous_systems(name)? {
        println!("{}", autonomous_system?);
    }
    Ok(())
}

fn info(database: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::open(database)?;

    println!("Vendor:          {}", db.vendor());
    println!("Description:     {}", db.description());
    println!("License:         {}", db.license());
    println!("Created at:      {}", db.created_at());
    println!("AS records:      {}", db.as_count());
    println!("Network records: {}", db.network_record_count());
    println!("Tree nodes:      {}", db.network_node_count());
    Ok(())
}

fn summarize_range(first: &str, last: &str) -> Result<(), Box<dyn std::error::Error>> {
    for network in &summarize(first.parse()?, last.parse()?)? {
        println!("{}", network);
    }
    Ok(())
}

fn exclude_networks(network: &str, excluded: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let network: Network = network.parse()?;
    let excluded = excluded
        .iter()
        .map(|s| s.parse::<Network>())
        .collect::<Result<NetworkList, _>>()?;

    for remaining in &exclude_list(&network, &excluded) {
        println!("{}", remaining);
    }
    Ok(())
}
