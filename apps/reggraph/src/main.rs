//! # reggraph
//!
//! The main binary for the regulatory knowledge graph builder.
//!
//! This application provides:
//! - CLI commands over the five-phase document pipeline and its artifacts
//! - HTTP service feeding candidate batches into one shared store (axum)
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                apps/reggraph (THE BINARY)             │
//! │                                                       │
//! │   ┌─────────────┐   ┌─────────────┐   ┌──────────┐   │
//! │   │    CLI      │   │  HTTP API   │   │  Config  │   │
//! │   │   (clap)    │   │   (axum)    │   │  (toml)  │   │
//! │   └──────┬──────┘   └──────┬──────┘   └────┬─────┘   │
//! │          └─────────────────┼───────────────┘         │
//! │                            ▼                         │
//! │                   ┌────────────────┐                 │
//! │                   │ reggraph-core  │                 │
//! │                   │  (THE ENGINE)  │                 │
//! │                   └────────────────┘                 │
//! └───────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! reggraph run --input-path regulation.txt --responses responses.json
//! reggraph status --artifact artifacts/graph.json
//! reggraph serve --host 0.0.0.0 --port 8080
//! ```

use clap::Parser;
use reggraph::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    // REGGRAPH_LOG_FORMAT=json switches to machine-parseable output.
    let log_format = std::env::var("REGGRAPH_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let default_filter = if cli.verbose {
        "reggraph=debug,reggraph_core=debug,tower_http=debug"
    } else {
        "reggraph=info,reggraph_core=info,tower_http=debug"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner.
fn print_banner() {
    println!(
        "reggraph v{} - identity-stable regulatory graph builder\n",
        env!("CARGO_PKG_VERSION")
    );
}
