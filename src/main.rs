//! Command line tool for extracting bulk entity data from Sage Intacct

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sage_extract::{Config, LocalDirSink, ScanRequest, Scanner, run_full_extract};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments for sage-extract
#[derive(Parser, Debug)]
#[command(
    name = "sage-extract",
    version = env!("CARGO_PKG_VERSION"),
    about = "Extract bulk entity data from Sage Intacct into durable page files"
)]
struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Command {
    /// Grab one entity with a query and save it in storage
    OneEntity {
        /// Entity name to save (ex: CUSTOMER)
        #[arg(long, default_value = "CUSTOMER")]
        entity: String,

        /// SQL-like query to filter down the results
        #[arg(
            long,
            default_value = "WHENMODIFIED >= 06/01/2022 AND WHENMODIFIED <= 06/10/2022"
        )]
        query: String,

        /// File name prefix for this run's pages
        #[arg(long, default_value = "adhoc")]
        prefix: String,
    },
    /// Loop through months for an entity and save to storage
    FullExtract {
        /// Entity name to save (ex: CUSTOMER)
        #[arg(long, default_value = "CUSTOMER")]
        entity: String,

        /// Date the extract starts on (ex: 2022-01-01)
        #[arg(long)]
        start_date: String,

        /// Date AFTER the day the extract ends on (ex: 2022-07-01)
        #[arg(long)]
        end_date: String,
    },
}

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "sage_extract=debug,info"
    } else {
        "sage_extract=info,warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn parse_date(raw: &str, which: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| format!("invalid {which} {raw:?} (expected YYYY-MM-DD): {e}"))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    if let Err(message) = run(args).await {
        eprintln!("Error: {message}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), String> {
    let config = Config::from_env().map_err(|e| e.to_string())?;
    let sink = Arc::new(LocalDirSink::new(config.storage.root.clone()));
    let scanner = Scanner::new(config, sink).map_err(|e| e.to_string())?;

    match args.command {
        Command::OneEntity {
            entity,
            query,
            prefix,
        } => {
            let request = ScanRequest::new(&entity, query).with_run_prefix(prefix);
            let outcome = scanner.run(&request).await.map_err(|e| e.to_string())?;
            println!(
                "{entity}: {} records in {} pages ({} remaining)",
                outcome.total_record_count, outcome.pages_written, outcome.records_remaining
            );
        }
        Command::FullExtract {
            entity,
            start_date,
            end_date,
        } => {
            let start = parse_date(&start_date, "start date")?;
            let end = parse_date(&end_date, "end date")?;
            let audit_path = PathBuf::from(format!(
                "{entity}_{}_audit.json",
                chrono::Local::now().format("%Y%m%dT%H%M%S")
            ));

            let audit = run_full_extract(&scanner, &entity, start, end, &audit_path)
                .await
                .map_err(|e| e.to_string())?;
            println!(
                "{entity}: {} month chunk(s) finished, audit log at {}",
                audit.len(),
                audit_path.display()
            );
        }
    }

    Ok(())
}
