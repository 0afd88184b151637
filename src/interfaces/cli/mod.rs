//! CLI interface module
//!
//! This module provides the operator command-line interface for linkpulse.

pub mod commands;

use std::fmt;

use crate::cli::{Commands, ConfigCommands};
use crate::errors::LinkpulseError;
use crate::runtime::AppContext;

#[derive(Debug)]
pub enum CliError {
    StorageError(String),
    ParseError(String),
    CommandError(String),
}

impl CliError {
    /// Format as simple output
    pub fn format_simple(&self) -> String {
        match self {
            CliError::StorageError(msg) => format!("Storage error: {}", msg),
            CliError::ParseError(msg) => format!("Parse error: {}", msg),
            CliError::CommandError(msg) => format!("Command error: {}", msg),
        }
    }

    /// Format as colored output
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        match self {
            CliError::StorageError(msg) => {
                format!("{} {}", "Storage error:".red().bold(), msg.white())
            }
            CliError::ParseError(msg) => {
                format!("{} {}", "Parse error:".yellow().bold(), msg.white())
            }
            CliError::CommandError(msg) => {
                format!("{} {}", "Command error:".red().bold(), msg.white())
            }
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for CliError {}

impl From<LinkpulseError> for CliError {
    fn from(err: LinkpulseError) -> Self {
        match err {
            LinkpulseError::DatabaseConnection(_) | LinkpulseError::DatabaseOperation(_) => {
                CliError::StorageError(err.message().to_string())
            }
            LinkpulseError::DateParse(_) | LinkpulseError::Validation(_) => {
                CliError::ParseError(err.message().to_string())
            }
            _ => CliError::CommandError(err.format_simple()),
        }
    }
}

/// 不需要应用上下文的命令（返回 None 表示需要上下文）
pub fn run_offline_command(cmd: &Commands) -> Option<Result<(), CliError>> {
    match cmd {
        Commands::Config {
            action: ConfigCommands::Generate { output_path, force },
        } => Some(commands::generate_config(output_path.clone(), *force)),
        _ => None,
    }
}

/// Run a CLI command against an assembled application context
pub async fn run_cli_command(ctx: &AppContext, cmd: Commands) -> Result<(), CliError> {
    match cmd {
        Commands::Create {
            url,
            alias,
            expire,
            owner,
        } => commands::create_link(ctx, url, alias, expire, owner).await,
        Commands::Bulk { file_path } => commands::bulk_create(ctx, &file_path).await,
        Commands::Get { short_code } => commands::show_link(ctx, &short_code).await,
        Commands::Update {
            short_code,
            url,
            expire,
            no_expire,
        } => commands::update_link(ctx, &short_code, url, expire, no_expire).await,
        Commands::Resolve {
            short_code,
            user_agent,
            referrer,
            geo,
        } => commands::resolve_link(ctx, &short_code, user_agent, referrer, geo).await,
        Commands::Deactivate { short_code } => {
            commands::deactivate_link(ctx, &short_code).await
        }
        Commands::Analytics {
            short_code,
            from,
            to,
            dimension,
        } => commands::show_analytics(ctx, &short_code, from, to, &dimension).await,
        Commands::RebuildRollups => commands::rebuild_rollups(ctx).await,
        Commands::Sweep => commands::sweep_expired(ctx).await,
        Commands::Stats => commands::show_stats(ctx).await,
        Commands::Run | Commands::Config { .. } => Err(CliError::CommandError(
            "Command cannot run as a one-shot CLI command".to_string(),
        )),
    }
}
