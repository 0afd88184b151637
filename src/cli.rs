//! Command-line interface definitions using clap
//!
//! This module defines the operator CLI for linkpulse using clap's derive macros.

use clap::{Parser, Subcommand};

/// linkpulse - URL shortening core with click analytics
#[derive(Parser)]
#[command(name = "linkpulse")]
#[command(version)]
#[command(about = "Short links, cache-fronted redirects and click analytics", long_about = None)]
pub struct Cli {
    /// Configuration file path (default: linkpulse.toml)
    #[arg(long, short = 'c', global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run background maintenance (expiry sweep, retention) until Ctrl+C
    Run,

    /// Create a short link
    Create {
        /// Target URL
        url: String,

        /// Custom alias instead of a generated code
        #[arg(long)]
        alias: Option<String>,

        /// Expiration time (RFC3339 or relative like "1d", "2h")
        #[arg(long)]
        expire: Option<String>,

        /// Opaque owner id
        #[arg(long)]
        owner: Option<String>,
    },

    /// Create links from a file, one `URL` or `ALIAS URL` per line
    Bulk {
        /// Input file path
        file_path: String,
    },

    /// Show a short link
    Get {
        /// Short code
        short_code: String,
    },

    /// Edit a short link
    Update {
        /// Short code
        short_code: String,

        /// New target URL
        #[arg(long)]
        url: Option<String>,

        /// New expiration time
        #[arg(long, conflicts_with = "no_expire")]
        expire: Option<String>,

        /// Remove the expiration time
        #[arg(long)]
        no_expire: bool,
    },

    /// Resolve a short code and record the click
    Resolve {
        /// Short code
        short_code: String,

        #[arg(long)]
        user_agent: Option<String>,

        #[arg(long)]
        referrer: Option<String>,

        /// Coarse location, e.g. ISO country code
        #[arg(long)]
        geo: Option<String>,
    },

    /// Deactivate a short link
    Deactivate {
        /// Short code
        short_code: String,
    },

    /// Show daily rollups for a short link
    Analytics {
        /// Short code
        short_code: String,

        /// First day (YYYY-MM-DD, default: 7 days ago)
        #[arg(long)]
        from: Option<String>,

        /// Last day (YYYY-MM-DD, default: today)
        #[arg(long)]
        to: Option<String>,

        /// geo, device, referrer or outcome
        #[arg(long, default_value = "outcome")]
        dimension: String,
    },

    /// Rebuild all rollups from the click event log
    RebuildRollups,

    /// Deactivate all expired links
    Sweep,

    /// Show storage and pipeline counters
    Stats,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigCommands,
    },
}

/// Configuration management commands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate example configuration file
    Generate {
        /// Output path (default: linkpulse.example.toml)
        output_path: Option<String>,

        /// Force overwrite without confirmation
        #[arg(long)]
        force: bool,
    },
}
