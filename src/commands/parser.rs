//! Command line parsing
//!
//! `semlayer` is a thin front end over the sync manager and the query engine
//! client; every subcommand maps to exactly one remote workflow.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Semantic layer configuration sync for the query engine
#[derive(Parser, Debug, Clone)]
#[command(
    name = "semlayer",
    about = "Sync a local semantic-layer directory with the query engine",
    version,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Settings file (defaults to ~/.semlayer/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `semlayer=trace` (overrides RUST_LOG)
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Also append logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Pack the local directory and upload it
    Push {
        /// Version label to publish under (current configuration when omitted)
        #[arg(long)]
        version: Option<String>,
    },

    /// Replace the local directory with the server's configuration
    Pull {
        /// Snapshot to fetch instead of the current configuration
        #[arg(long)]
        version: Option<String>,
    },

    /// Recompute user-wide data for one day
    Backfill {
        /// Day to recompute (YYYY-MM-DD)
        #[arg(value_name = "DATE", value_parser = parse_date)]
        date: NaiveDate,
        #[arg(long)]
        version: Option<String>,
    },

    /// Show the columns of a warehouse table
    Columns {
        /// Fully-qualified table name
        #[arg(value_name = "TABLE")]
        table: String,
    },

    /// List daily datasources as JSON
    Datasources {
        #[arg(long)]
        version: Option<String>,
    },

    /// Evaluate a chart request read from a JSON file
    Chart {
        #[arg(long, value_name = "FILE")]
        request: PathBuf,
        #[arg(long)]
        version: Option<String>,
    },

    /// Submit warehouse credentials
    DbAuth {
        /// Database type
        #[arg(long = "type", value_name = "TYPE")]
        database_type: Option<String>,
        /// Credential property (KEY=VALUE, repeatable)
        #[arg(long = "property", value_name = "KEY=VALUE", value_parser = parse_property)]
        properties: Vec<(String, String)>,
        /// Fail instead of prompting for missing options
        #[arg(long)]
        no_wizard: bool,
    },
}

impl Cli {
    /// Parse from an explicit argv (used by tests)
    pub fn try_parse_args<I, T>(iter: I) -> Result<Cli, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Cli::try_parse_from(iter)
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|err| format!("expected YYYY-MM-DD, got '{raw}': {err}"))
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got '{raw}'")),
    }
}
