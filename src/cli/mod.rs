//! Command-line interface for oasis-export
//!
//! This module handles:
//! - Command-line argument parsing using clap
//! - Configuration loading and overrides
//! - Informational subcommands (version, config, completion)
//! - Rendering export outcomes as text or JSON

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde_json::json;
use std::path::PathBuf;

use crate::config::{Config, LogLevel};
use crate::error::{ExportError, Result};
use crate::export::ExportReport;
use crate::utils::time::parse_duration;

/// Exports a tenant dataset from an Oracle stored procedure into MongoDB
#[derive(Parser, Debug)]
#[command(
    name = "oasis-export",
    version,
    about = "Export a tenant dataset from Oracle into a MongoDB collection",
    long_about = "Calls the export stored procedure for one tenant, parses the JSON it returns
and replaces the contents of the configured MongoDB collection with the records."
)]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short = 'c', long = "config", value_name = "FILE", global = true)]
    pub config_file: Option<PathBuf>,

    /// MongoDB connection URI (overrides config and environment)
    #[arg(long, value_name = "URI", global = true)]
    pub mongodb_uri: Option<String>,

    /// Target collection (overrides config and environment)
    #[arg(long, value_name = "NAME", global = true)]
    pub collection: Option<String>,

    /// Procedure call timeout, e.g. 90s or 2m
    #[arg(long, value_name = "DURATION", value_parser = parse_timeout_secs, global = true)]
    pub procedure_timeout: Option<u64>,

    /// Quiet mode (errors only)
    #[arg(short = 'q', long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    /// Very verbose mode (trace logging)
    #[arg(long = "vv", global = true)]
    pub very_verbose: bool,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands for oasis-export
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export one tenant's dataset into the target collection
    Export {
        /// Tenant (company) identifier
        #[arg(value_name = "TENANT_ID", allow_negative_numbers = true)]
        tenant_id: i64,

        /// Call the procedure and parse the payload without writing
        #[arg(long)]
        dry_run: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Validate configuration
        #[arg(long)]
        validate: bool,
    },

    /// Show version information
    Version,

    /// Generate shell completion script
    Completion {
        /// Shell type
        #[arg(value_enum, value_name = "SHELL")]
        shell: Shell,
    },
}

/// Arguments of the `export` subcommand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportArgs {
    pub tenant_id: i64,
    pub dry_run: bool,
    pub json: bool,
}

/// CLI interface handler
pub struct CliInterface {
    /// Parsed command-line arguments
    args: CliArgs,

    /// Effective configuration
    config: Config,
}

impl CliInterface {
    /// Create a new CLI interface from process arguments
    ///
    /// # Returns
    /// * `Result<Self>` - New CLI interface or error
    pub fn new() -> Result<Self> {
        Self::from_args(CliArgs::parse())
    }

    /// Create a CLI interface from already parsed arguments
    pub fn from_args(args: CliArgs) -> Result<Self> {
        let config = Self::load_config(&args)?;
        Ok(Self { args, config })
    }

    /// Load configuration from file, then environment, then arguments
    ///
    /// # Arguments
    /// * `args` - Command-line arguments
    ///
    /// # Returns
    /// * `Result<Config>` - Effective configuration or error
    fn load_config(args: &CliArgs) -> Result<Config> {
        let mut config = Config::load_from_file(args.config_file.as_deref())?;
        config.apply_env();
        Self::apply_args_to_config(&mut config, args);
        Ok(config)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Arguments of the export subcommand, if that is the one selected
    pub fn export_args(&self) -> Option<ExportArgs> {
        match self.args.command {
            Commands::Export {
                tenant_id,
                dry_run,
                json,
            } => Some(ExportArgs {
                tenant_id,
                dry_run,
                json,
            }),
            _ => None,
        }
    }

    /// Apply CLI arguments to configuration
    ///
    /// # Arguments
    /// * `config` - Configuration to modify
    /// * `args` - Parsed arguments
    fn apply_args_to_config(config: &mut Config, args: &CliArgs) {
        config.logging.level = if args.very_verbose {
            LogLevel::Trace
        } else if args.verbose {
            LogLevel::Debug
        } else if args.quiet {
            LogLevel::Error
        } else {
            config.logging.level
        };

        if let Some(uri) = &args.mongodb_uri {
            config.mongodb.uri = uri.clone();
        }
        if let Some(collection) = &args.collection {
            config.mongodb.collection = collection.clone();
        }
        if let Some(secs) = args.procedure_timeout {
            config.oracle.call_timeout = secs;
        }
    }

    /// Handle informational subcommands
    ///
    /// # Returns
    /// * `Result<bool>` - True if subcommand was handled, false to continue
    pub fn handle_subcommand(&self) -> Result<bool> {
        match &self.args.command {
            Commands::Version => {
                self.show_version();
                Ok(true)
            }
            Commands::Completion { shell } => {
                let mut command = CliArgs::command();
                clap_complete::generate(*shell, &mut command, "oasis-export", &mut std::io::stdout());
                Ok(true)
            }
            Commands::Config { show, validate } => {
                self.handle_config_command(*show, *validate)?;
                Ok(true)
            }
            Commands::Export { .. } => Ok(false),
        }
    }

    /// Show version information
    fn show_version(&self) {
        println!("oasis-export version {}", env!("CARGO_PKG_VERSION"));
        println!("Rust version: {}", env!("CARGO_PKG_RUST_VERSION"));
    }

    /// Handle config subcommand
    ///
    /// With neither flag set, behaves like `--show`.
    fn handle_config_command(&self, show: bool, validate: bool) -> Result<()> {
        if validate {
            self.config.validate()?;
            println!("Configuration is valid");
        }
        if show || !validate {
            println!("{}", self.config.to_display_toml()?);
        }
        Ok(())
    }
}

/// Render a successful run
///
/// # Arguments
/// * `report` - Export report
/// * `as_json` - Render as a JSON object instead of one line of text
pub fn render_report(report: &ExportReport, as_json: bool) -> String {
    if !as_json {
        return report.message();
    }
    let body = json!({
        "success": true,
        "message": report.message(),
        "report": report,
    });
    serde_json::to_string_pretty(&body).unwrap_or_else(|_| report.message())
}

/// Render a failed run, including what happened to the target collection
///
/// # Arguments
/// * `error` - The error that ended the run
/// * `as_json` - Render as a JSON object instead of text
pub fn render_failure(error: &ExportError, as_json: bool) -> String {
    if !as_json {
        return format!(
            "Export failed ({:?}): {}. Target collection: {:?}",
            error.category(),
            error,
            error.target_state()
        );
    }
    let body = json!({
        "success": false,
        "category": error.category(),
        "target_state": error.target_state(),
        "message": error.to_string(),
        "store_error": error.store_info(),
    });
    serde_json::to_string_pretty(&body).unwrap_or_else(|_| error.to_string())
}

fn parse_timeout_secs(s: &str) -> std::result::Result<u64, String> {
    match parse_duration(s) {
        Some(d) if d.as_secs() > 0 => Ok(d.as_secs()),
        _ => Err(format!("invalid duration '{s}', expected e.g. 45, 90s, 2m")),
    }
}
