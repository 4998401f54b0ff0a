//! # Entigraph
//!
//! The binary for the Entigraph versioned entity graph store.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                apps/entigraph (THE BINARY)           │
//! │                                                      │
//! │   ┌─────────────┐   ┌─────────────┐   ┌──────────┐   │
//! │   │    CLI      │   │  HTTP API   │   │  Config  │   │
//! │   │   (clap)    │   │   (axum)    │   │  (toml)  │   │
//! │   └──────┬──────┘   └──────┬──────┘   └──────────┘   │
//! │          └────────┬────────┘                         │
//! │                   ▼                                  │
//! │          ┌────────────────┐                          │
//! │          │ entigraph-core │                          │
//! │          │  (THE LOGIC)   │                          │
//! │          └────────────────┘                          │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! entigraph init
//! entigraph load -f fixtures.json
//! entigraph details --id ex:3 -s people
//! entigraph server --host 0.0.0.0 --port 8080
//! ```

use clap::Parser;
use entigraph::cli;
use entigraph::config::{AppConfig, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let config = match cli.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };

    init_tracing(&config, cli.verbose);

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli, config).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `--verbose`.
fn init_tracing(config: &AppConfig, verbose: bool) {
    let default_filter = if verbose {
        "entigraph=debug,entigraph_core=debug,tower_http=debug"
    } else {
        "entigraph=info,entigraph_core=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match config.log.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn print_banner() {
    println!(
        r#"
  entigraph v{}
  versioned entity graph store
"#,
        env!("CARGO_PKG_VERSION")
    );
}
