//! # reggraph CLI Module
//!
//! This module implements the CLI interface for reggraph.
//!
//! ## Available Commands
//!
//! - `run` - Run the five-phase pipeline and write an artifact
//! - `resolve` - Re-run the reference resolver over a saved artifact
//! - `status` - Show counts of a saved artifact
//! - `hash` - Compute the BLAKE3 hash of a saved artifact
//! - `serve` - Start the HTTP service

mod commands;

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use reggraph_core::GraphError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// reggraph - regulatory knowledge graph builder
///
/// Builds an identity-stable labeled property graph from a regulation
/// text and extracted candidate facts.
#[derive(Parser, Debug)]
#[command(name = "reggraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to a TOML configuration file (falls back to REGGRAPH_CONFIG)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full pipeline and write the artifact
    Run {
        /// Regulation text; a built-in fallback is used when absent or empty
        #[arg(short, long)]
        input_path: Option<PathBuf>,

        /// JSON object mapping chapter ids to recorded extractor responses
        #[arg(short, long)]
        responses: Option<PathBuf>,

        /// Artifact path (defaults to `[pipeline] output_path`)
        #[arg(short, long)]
        output_path: Option<PathBuf>,
    },

    /// Reload an artifact, re-run the resolver and rewrite it
    Resolve {
        /// Artifact to resolve
        #[arg(short, long)]
        artifact: PathBuf,

        /// Where to write the result (defaults to overwriting the input)
        #[arg(short, long)]
        output_path: Option<PathBuf>,
    },

    /// Show counts of a saved artifact
    Status {
        /// Artifact to inspect
        #[arg(short, long)]
        artifact: PathBuf,
    },

    /// Compute BLAKE3 cryptographic hash of an artifact
    Hash {
        /// Artifact to hash
        #[arg(short, long)]
        artifact: PathBuf,
    },

    /// Start HTTP server
    Serve {
        /// Host to bind to (defaults to `[server] host`)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (defaults to `[server] port`)
        #[arg(short, long)]
        port: Option<u16>,

        /// Artifact to preload into the served store
        #[arg(short, long)]
        artifact: Option<PathBuf>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), GraphError> {
    let config = AppConfig::load(cli.config.as_deref())?;
    let json_mode = cli.json_mode;

    match cli.command {
        Commands::Run {
            input_path,
            responses,
            output_path,
        } => {
            let output = output_path.unwrap_or_else(|| config.pipeline.output_path.clone());
            cmd_run(
                &config,
                input_path.as_deref(),
                responses.as_deref(),
                &output,
                json_mode,
            )
        }
        Commands::Resolve {
            artifact,
            output_path,
        } => {
            let output = output_path.unwrap_or_else(|| artifact.clone());
            cmd_resolve(&config, &artifact, &output, json_mode)
        }
        Commands::Status { artifact } => cmd_status(&config, &artifact, json_mode),
        Commands::Hash { artifact } => cmd_hash(&artifact, json_mode),
        Commands::Serve {
            host,
            port,
            artifact,
        } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            cmd_serve(&config, &host, port, artifact.as_deref()).await
        }
    }
}
