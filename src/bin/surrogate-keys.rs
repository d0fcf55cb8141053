//! Offline helper for surrogate keys.
//!
//! Computes the keys an origin's cache tags map to at the edge, so purge
//! requests can be built without going through the proxy.

use std::io::Read;

use clap::{Parser, Subcommand};

use surrogate_key_proxy::surrogate::{
    fingerprint, projector::surrogate_key_value, purge_key_list, Projection,
};

#[derive(Parser)]
#[command(name = "surrogate-keys")]
#[command(about = "Compute surrogate keys and fingerprints for cache tags", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the fingerprint of each tag
    Fingerprint {
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Read a raw X-Drupal-Cache-Tags value from stdin and print the Surrogate-Key value
    Project,
    /// Print every key that must be purged to invalidate the given tags
    PurgeKeys {
        #[arg(required = true)]
        tags: Vec<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Fingerprint { tags } => {
            for tag in &tags {
                println!("{} {}", tag, fingerprint(tag));
            }
        }
        Commands::Project => {
            let mut raw = Vec::new();
            std::io::stdin().read_to_end(&mut raw)?;
            while matches!(raw.last(), Some(b'\n' | b'\r')) {
                raw.pop();
            }

            let (value, projection) = surrogate_key_value(&raw);
            if let Projection::Fingerprinted { tags } = projection {
                eprintln!("{} bytes exceeds the limit; fingerprinted {} tags", raw.len(), tags);
            }
            println!("{}", String::from_utf8_lossy(&value));
        }
        Commands::PurgeKeys { tags } => {
            for key in purge_key_list(tags.iter().map(String::as_str)) {
                println!("{}", key);
            }
        }
    }

    Ok(())
}
