//! oasis-export
//!
//! Exports one tenant's dataset from an Oracle stored procedure into a
//! MongoDB collection, replacing whatever the collection held before.
//!
//! # Usage
//!
//! ```bash
//! oasis-export export 42
//! oasis-export export 42 --dry-run --json
//! ```

use std::fs::OpenOptions;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use oasis_export::cli::{self, CliInterface, ExportArgs};
use oasis_export::connection::ConnectionManager;
use oasis_export::dataset::DatasetParser;
use oasis_export::error::Result;
use oasis_export::export::ExportOrchestrator;
use oasis_export::gateway::OracleProcedureGateway;
use oasis_export::store::{DocumentStoreWriter, MongoCollectionStore};

/// Application entry point
#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

/// Main application logic
///
/// 1. Parse command-line arguments and load configuration
/// 2. Initialize logging
/// 3. Handle informational subcommands or run the export
///
/// # Returns
/// * `Result<i32>` - Process exit code or error
async fn run() -> Result<i32> {
    let cli = CliInterface::new()?;

    initialize_logging(&cli)?;

    if cli.handle_subcommand()? {
        return Ok(0);
    }

    match cli.export_args() {
        Some(args) => run_export(&cli, args).await,
        None => Ok(0),
    }
}

/// Wire the pipeline together and run one export
async fn run_export(cli: &CliInterface, args: ExportArgs) -> Result<i32> {
    let config = cli.config();
    config.validate()?;

    let gateway = OracleProcedureGateway::from_config(&config.oracle);

    let mut conn_manager = ConnectionManager::new(config.mongodb.clone());
    conn_manager.connect().await?;
    let database = conn_manager.get_database(&config.mongodb.database)?;

    let writer = DocumentStoreWriter::new(
        MongoCollectionStore::new(database),
        config.mongodb.collection.clone(),
    );
    let parser = DatasetParser::new(config.dataset.records_field.clone());

    let cancel_token = CancellationToken::new();
    let orchestrator = ExportOrchestrator::new(gateway, parser, writer, config.procedure_timeout())
        .with_cancellation(cancel_token.clone());

    let ctrl_c_handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Interrupt received, cancelling export");
                cancel_token.cancel();
            }
            Err(err) => eprintln!("Failed to listen for Ctrl+C: {}", err),
        }
    });

    let outcome = if args.dry_run {
        orchestrator.export_dry_run(args.tenant_id).await
    } else {
        orchestrator.export(args.tenant_id).await
    };

    ctrl_c_handle.abort();
    conn_manager.disconnect().await;

    match outcome {
        Ok(report) => {
            println!("{}", cli::render_report(&report, args.json));
            Ok(0)
        }
        Err(e) => {
            let rendered = cli::render_failure(&e, args.json);
            if args.json {
                println!("{}", rendered);
            } else {
                eprintln!("{}", rendered);
            }
            Ok(e.exit_code())
        }
    }
}

/// Initialize logging from the effective configuration
///
/// `RUST_LOG` takes precedence over the configured level. Logs go to stderr
/// unless `logging.file_path` is set; stdout carries only the outcome.
fn initialize_logging(cli: &CliInterface) -> Result<()> {
    let logging = &cli.config().logging;
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(logging.level.to_tracing_level()).into())
        .from_env_lossy();

    let (writer, ansi) = match &logging.file_path {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(false);

    if logging.timestamps {
        subscriber.init();
    } else {
        subscriber.without_time().init();
    }

    if let Some(path) = &logging.file_path {
        info!("Logging to {}", path.display());
    }
    Ok(())
}
