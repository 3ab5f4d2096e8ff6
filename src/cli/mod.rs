//! # bgpd-contacts CLI
//!
//! Runs the contact daemon and inspects the contact store it keeps.
//!
//! ```sh
//! $ bgpd-contacts run ./config.toml -vv
//! $ bgpd-contacts ingest ./config.toml
//! $ bgpd-contacts show sces.bin
//!  Start                     End                       Duration (ms)  AS 1  Gateway 1  AS 2  Gateway 2  Valid
//! ---------------------------------------------------------------------------------------------------------------
//!  2030-01-01T00:00:00.000Z  2030-01-01T00:00:00.500Z  500            10    1.1.1.11   20    2.2.2.21   yes
//! $ bgpd-contacts export sces.bin -o sces.cbor
//! $ bgpd-contacts decode sces.cbor
//! ```
use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Parser;
use colored::*;
use itertools::Itertools;

use crate::config::ServerConfig;
use crate::contacts::store::DEFAULT_STORE_FILE;
use crate::contacts::{codec, ContactStore, ScheduledContactEntry};
use crate::handler::serve;

mod display;
mod table;

use table::OutputTable;

#[derive(Parser, Debug)]
#[clap(name = "bgpd-contacts", rename_all = "kebab-case")]
/// Scheduled inter-AS contacts for BGP
pub struct Args {
    #[clap(subcommand)]
    pub cmd: Command,
    /// Show debug logs (additive for trace logs)
    #[clap(short, parse(from_occurrences), global = true)]
    pub verbose: u8,
}

#[derive(Parser, Debug)]
#[clap(rename_all = "kebab-case")]
pub enum Command {
    /// Run the contact daemon
    Run(ConfigOptions),
    /// Merge the contacts of a config file into its store
    #[clap(alias = "i")]
    Ingest(ConfigOptions),
    /// View stored contacts
    #[clap(alias = "s")]
    Show(ShowOptions),
    /// Write the CBOR export of a store
    Export(ExportOptions),
    /// Read back a CBOR export
    Decode(DecodeOptions),
}

#[derive(Parser, Debug)]
#[clap(rename_all = "kebab-case")]
pub struct ConfigOptions {
    /// Path to config.toml
    pub config_path: String,
}

#[derive(Parser, Debug)]
#[clap(rename_all = "kebab-case")]
pub struct ShowOptions {
    /// Contact store file
    #[clap(default_value = DEFAULT_STORE_FILE)]
    store_path: PathBuf,
    /// Print as JSON
    #[clap(long)]
    json: bool,
}

#[derive(Parser, Debug)]
#[clap(rename_all = "kebab-case")]
pub struct ExportOptions {
    /// Contact store file
    #[clap(default_value = DEFAULT_STORE_FILE)]
    store_path: PathBuf,
    /// Output file (hex on stdout if not given)
    #[clap(short, long)]
    output: Option<PathBuf>,
}

#[derive(Parser, Debug)]
#[clap(rename_all = "kebab-case")]
pub struct DecodeOptions {
    /// CBOR export file
    path: PathBuf,
    /// Print as JSON
    #[clap(long)]
    json: bool,
}

fn print_contacts(entries: &[ScheduledContactEntry], json: bool) -> Result<(), Box<dyn Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(entries)?);
    } else if entries.is_empty() {
        println!("No contacts");
    } else {
        let table: OutputTable<ScheduledContactEntry> = entries.iter().collect();
        table.print();
    }
    Ok(())
}

async fn run_cmd(args: &Args) -> Result<(), Box<dyn Error>> {
    match &args.cmd {
        Command::Run(options) => serve(&options.config_path).await?,
        Command::Ingest(options) => {
            let config = ServerConfig::from_file(&options.config_path)?;
            let store = ContactStore::new(&config.store_path);
            let new = store.ingest(&config.contacts)?;
            println!(
                "Ingested {} contacts into {} ({} new)",
                config.contacts.len(),
                store.path().display(),
                new.len()
            );
            let new: Vec<_> = new.into_iter().collect();
            if !new.is_empty() {
                print_contacts(&new, false)?;
            }
        }
        Command::Show(options) => {
            let store = ContactStore::new(&options.store_path);
            match store.load()? {
                Some(stored) => {
                    let stored: Vec<_> = stored.into_iter().collect();
                    print_contacts(&stored, options.json)?;
                }
                None => println!("No contact store at {}", store.path().display()),
            }
        }
        Command::Export(options) => {
            let stored = ContactStore::new(&options.store_path)
                .load()?
                .unwrap_or_default();
            let bytes = codec::export(&stored)?;
            match &options.output {
                Some(path) => {
                    fs::write(path, &bytes)?;
                    println!(
                        "Exported {} contacts ({} bytes) to {}",
                        stored.len(),
                        bytes.len(),
                        path.display()
                    );
                }
                None => println!("{}", bytes.iter().map(|b| format!("{:02x}", b)).join("")),
            }
        }
        Command::Decode(options) => {
            let bytes = fs::read(&options.path)?;
            let entries = codec::decode(&bytes)?;
            print_contacts(&entries, options.json)?;
        }
    }
    Ok(())
}

/// Run the parsed command, reporting any error before exiting non-zero
pub async fn run(args: &Args) {
    if let Err(err) = run_cmd(args).await {
        eprintln!("{}", err.to_string().red());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_args() {
        let args = Args::try_parse_from(&["bgpd-contacts", "-vv", "run", "config.toml"]).unwrap();
        assert_eq!(args.verbose, 2);
        assert!(matches!(
            args.cmd,
            Command::Run(ConfigOptions { ref config_path }) if config_path == "config.toml"
        ));

        let args = Args::try_parse_from(&["bgpd-contacts", "show"]).unwrap();
        match args.cmd {
            Command::Show(options) => {
                assert_eq!(options.store_path, PathBuf::from("sces.bin"));
                assert!(!options.json);
            }
            other => panic!("Unexpected command {:?}", other),
        }

        let args =
            Args::try_parse_from(&["bgpd-contacts", "export", "store.bin", "-o", "out.cbor"])
                .unwrap();
        match args.cmd {
            Command::Export(options) => {
                assert_eq!(options.store_path, PathBuf::from("store.bin"));
                assert_eq!(options.output, Some(PathBuf::from("out.cbor")));
            }
            other => panic!("Unexpected command {:?}", other),
        }
        assert!(Args::try_parse_from(&["bgpd-contacts", "decode"]).is_err());
    }
}
