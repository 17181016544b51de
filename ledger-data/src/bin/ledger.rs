use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ledger_core::StaticIdentity;
use ledger_core::db::{Backend, LedgerStores, StoreConfig};
use ledger_data::{LedgerImporter, render_summary};
use ledger_db_sqlite::SqliteStore;

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Material delivery ledger: import transcribed paper ledgers and report
/// running order, pass and stock quantities per item.
#[derive(Debug, Parser)]
#[command(name = "ledger", version, about, long_about = None)]
struct Cli {
    /// Storage backend (`sqlite` or `memory`).
    #[arg(long, default_value = "sqlite", global = true)]
    backend: Backend,

    /// Store location.
    /// For SQLite this is a file path (e.g. `ledger.db`) or `:memory:`.
    #[arg(long, default_value = "ledger.db", global = true)]
    db: String,

    /// User id recorded on imported entries.
    #[arg(long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Append the rows of a ledger CSV file.
    Import {
        /// Path to the CSV file
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Print per-group totals and stale snapshots.
    Summary {
        /// Only report this material
        #[arg(long)]
        material: Option<String>,
    },
}

// ─── tracing ─────────────────────────────────────────────────────────────────

/// Initialise the tracing subscriber.
///
/// * Honours `RUST_LOG` when set.
/// * Falls back to `info` so normal runs are quiet.
/// * Strips timestamps and target names to keep CLI output clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::from("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .without_time()
        .with_target(false)
        .init();
}

fn linked_stores() -> LedgerStores {
    LedgerStores::new().with(Box::new(SqliteStore))
}

// ─── entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let config = StoreConfig {
        backend: cli.backend,
        location: cli.db,
    };
    let identity = cli
        .user
        .map(StaticIdentity::new)
        .unwrap_or_else(StaticIdentity::anonymous);

    let mut manager = linked_stores()
        .open_manager(&config, Box::new(identity))
        .await
        .with_context(|| format!("Failed to open {} store at {}", config.backend, config.location))?;

    match cli.command {
        Command::Import { file } => {
            let reader =
                File::open(&file).with_context(|| format!("Failed to open: {}", file.display()))?;
            let records = LedgerImporter::parse(reader)
                .with_context(|| format!("Failed to parse CSV: {}", file.display()))?;
            info!("parsed {} rows from {}", records.len(), file.display());

            let summary = LedgerImporter::load(&mut manager, &records)
                .await
                .context("Failed to import ledger rows")?;
            println!(
                "Imported {} entries ({} new materials).",
                summary.entries_created, summary.materials_created
            );
        }
        Command::Summary { material } => {
            let mut printed = 0;
            for ledger in manager.ledgers() {
                if material
                    .as_deref()
                    .is_some_and(|name| name != ledger.material().name)
                {
                    continue;
                }
                print!("{}", render_summary(ledger));
                printed += 1;
            }

            if printed == 0 {
                match material {
                    Some(name) => bail!("no material named '{}'", name),
                    None => println!("No materials recorded."),
                }
            }
        }
    }

    Ok(())
}
