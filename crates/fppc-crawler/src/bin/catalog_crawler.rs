//! Catalog Crawler binary (spec section 4.1, component C1).

use anyhow::Result;
use clap::{Parser, Subcommand};
use fppc_core::{PipelineConfig, StateStore};
use fppc_crawler::Crawler;
use tracing::info;

#[derive(Parser)]
#[command(name = "catalog-crawler")]
#[command(about = "Crawl the FPPC advice-letter catalog and populate the State Store")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl all configured years, resuming from the checkpoint unless
    /// `--start-year` is given.
    CrawlAll {
        #[arg(long)]
        start_year: Option<i32>,
    },

    /// Crawl a single year only.
    CrawlYear {
        year: i32,
        #[arg(long, default_value = "1")]
        start_page: u32,
    },

    /// Print State Store statistics.
    Stats,

    /// Remove the crawler's checkpoint file (SPEC_FULL.md B).
    ClearCheckpoint,
}

#[tokio::main]
async fn main() -> Result<()> {
    fppc_core::logging::init();

    let cli = Cli::parse();
    let config = PipelineConfig::load()?;
    let year_range = config.year_range_start..=config.year_range_end;
    let store = StateStore::open(&config.state_db_path())?;
    let crawler = Crawler::new(store, config);

    match cli.command {
        Commands::CrawlAll { start_year } => {
            let summary = crawler.crawl(year_range, start_year).await;
            info!(?summary, "crawl complete");
            println!("Years attempted: {}", summary.years_attempted);
            println!("Years skipped:   {}", summary.years_skipped);
            println!("Documents found: {}", summary.documents_found);
            println!("Documents new:   {}", summary.documents_inserted);
        }
        Commands::CrawlYear { year, start_page } => {
            let summary = crawler.crawl_year(year, start_page).await;
            println!("Documents found: {}", summary.documents_found);
            println!("Documents new:   {}", summary.documents_inserted);
        }
        Commands::Stats => {
            let stats = crawler.store().stats()?;
            println!("Total documents: {}", stats.total_documents);
            println!("By download status:");
            for (status, count) in &stats.by_download_status {
                println!("  {status}: {count}");
            }
            println!("By year:");
            for (year, count) in &stats.by_year {
                println!("  {year}: {count}");
            }
        }
        Commands::ClearCheckpoint => {
            crawler.clear_checkpoint()?;
            println!("Checkpoint cleared.");
        }
    }

    Ok(())
}
