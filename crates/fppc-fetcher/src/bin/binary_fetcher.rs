//! Binary Fetcher binary (spec section 4.2, component C2).

use anyhow::Result;
use clap::{Parser, Subcommand};
use fppc_core::{PipelineConfig, StateStore};
use fppc_fetcher::Fetcher;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

#[derive(Parser)]
#[command(name = "binary-fetcher")]
#[command(about = "Download pending advice-letter PDFs into the local raw store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch up to `--limit` pending rows (all of them if omitted).
    FetchPending {
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Print download statistics.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    fppc_core::logging::init();

    let cli = Cli::parse();
    let config = PipelineConfig::load()?;
    let store = StateStore::open(&config.state_db_path())?;
    let fetcher = Fetcher::new(store, config);

    match cli.command {
        Commands::FetchPending { limit } => {
            let pending = fetcher.pending(limit)?;
            let total = pending.len();
            info!(total, "fetching pending documents");

            let mut downloaded = 0u64;
            let mut adopted = 0u64;
            let mut failed = 0u64;
            let mut total_bytes = 0i64;

            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::with_template(
                    "{bar:40.cyan/blue} {pos}/{len} ({eta}) {msg}",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            );

            for doc in pending.iter() {
                match fetcher.fetch_one(doc).await? {
                    fppc_fetcher::FetchOutcome::Downloaded { size_bytes } => {
                        downloaded += 1;
                        total_bytes += size_bytes;
                    }
                    fppc_fetcher::FetchOutcome::Adopted { size_bytes } => {
                        adopted += 1;
                        total_bytes += size_bytes;
                    }
                    fppc_fetcher::FetchOutcome::Failed => failed += 1,
                }
                bar.set_message(doc.pdf_url.clone());
                bar.inc(1);

                if bar.position() < total as u64 {
                    fetcher.politeness_delay().await;
                }
            }
            bar.finish_and_clear();

            println!("Downloaded: {downloaded}");
            println!("Adopted:    {adopted}");
            println!("Failed:     {failed}");
            println!("Total bytes: {total_bytes}");
        }
        Commands::Stats => {
            let stats = fetcher.store().download_stats()?;
            println!("Pending:    {}", stats.pending);
            println!("Downloaded: {}", stats.downloaded);
            println!("Failed:     {}", stats.failed);
            println!("Total bytes: {}", stats.total_bytes);
        }
    }

    Ok(())
}
