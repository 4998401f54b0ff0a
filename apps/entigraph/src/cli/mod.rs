//! # Entigraph CLI Module
//!
//! ## Available Commands
//!
//! - `server` - Start the HTTP server
//! - `status` - Show store table counts, datasets and namespaces
//! - `details` - Print an entity's latest snapshot and history per dataset
//! - `inspect-key` - Explain a hex index key from a `Corrupt` error
//! - `load` - Seed the store from a fixture file
//! - `tombstone` - Mark a dataset deleted
//! - `init` - Initialize a new database
//! - `compact` - Compact the database file

mod commands;

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use entigraph_core::EntigraphError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// Entigraph - versioned entity graph store
///
/// Per-dataset latest snapshots and full change history for linked-data
/// entities.
#[derive(Parser, Debug)]
#[command(name = "entigraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Path to the database (overrides config and ENTIGRAPH_DATABASE)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start HTTP server
    Server {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show store status
    Status,

    /// Show latest snapshot and change history of an entity
    Details {
        /// Entity curie or URI
        #[arg(short, long)]
        id: String,

        /// Restrict to this dataset (repeatable)
        #[arg(short = 's', long = "dataset")]
        datasets: Vec<String>,
    },

    /// Explain a hex index key (as reported by a corrupt-record error)
    InspectKey {
        /// Hex-encoded key
        key: String,
    },

    /// Load a fixture file (namespaces, dataset versions, tombstones)
    Load {
        /// Path to the fixture JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Mark a dataset as deleted
    Tombstone {
        /// Dataset name
        #[arg(short = 's', long)]
        dataset: String,
    },

    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Compact the database file
    Compact,
}

impl Cli {
    /// Resolve configuration: file/defaults, then environment, then flags.
    pub fn resolve_config(&self) -> Result<AppConfig, EntigraphError> {
        let mut config = AppConfig::load(self.config.as_deref())?;
        if let Some(database) = &self.database {
            config.database.clone_from(database);
        }
        if let Some(Commands::Server { host, port }) = &self.command {
            if let Some(host) = host {
                config.server.host.clone_from(host);
            }
            if let Some(port) = port {
                config.server.port = *port;
            }
        }
        Ok(config)
    }
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments and resolved configuration.
pub async fn execute(cli: Cli, config: AppConfig) -> Result<(), EntigraphError> {
    let db_path = &config.database;
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Server { .. }) => cmd_server(&config).await,
        Some(Commands::Status) => cmd_status(db_path, json_mode),
        Some(Commands::Details { id, datasets }) => cmd_details(db_path, &id, &datasets),
        Some(Commands::InspectKey { key }) => cmd_inspect_key(db_path, json_mode, &key),
        Some(Commands::Load { file }) => cmd_load(db_path, json_mode, &file),
        Some(Commands::Tombstone { dataset }) => cmd_tombstone(db_path, &dataset),
        Some(Commands::Init { force }) => cmd_init(db_path, force),
        Some(Commands::Compact) => cmd_compact(db_path),
        None => cmd_status(db_path, json_mode),
    }
}
