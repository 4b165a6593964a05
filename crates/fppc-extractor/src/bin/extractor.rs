//! Text Extractor binary (spec section 4.4, component C4).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fppc_clients::{EndpointConfig, HttpApiClient};
use fppc_core::{ApiKeyConfig, PipelineConfig, StateStore};
use fppc_extractor::{ExtractOutcome, Extractor};
use tracing::info;

#[derive(Parser)]
#[command(name = "extractor")]
#[command(about = "Extract structured records from downloaded advice-letter PDFs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract up to `--limit` pending rows (all of them if omitted).
    ExtractPending {
        #[arg(long)]
        limit: Option<i64>,
        /// Disable the vision-OCR fallback even when configured and needed.
        #[arg(long)]
        no_vision_ocr: bool,
    },

    /// Print extraction statistics.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    fppc_core::logging::init();

    let cli = Cli::parse();
    let config = PipelineConfig::load()?;
    let store = StateStore::open(&config.state_db_path())?;

    match cli.command {
        Commands::ExtractPending { limit, no_vision_ocr } => {
            let api_client: Option<Arc<dyn fppc_clients::RemoteApiClient>> = if no_vision_ocr {
                None
            } else {
                let keys = ApiKeyConfig::from_env();
                match keys.get(ApiKeyConfig::VISION_OCR) {
                    Some(key) => {
                        let endpoint = EndpointConfig {
                            base_url: config.vision_ocr_base_url.clone(),
                            model: config.vision_ocr_model.clone(),
                            api_key: key.to_string(),
                        };
                        let client = HttpApiClient::new(
                            endpoint.clone(),
                            endpoint.clone(),
                            endpoint,
                            Duration::from_secs(config.request_timeout_secs),
                        )?;
                        Some(Arc::new(client) as Arc<dyn fppc_clients::RemoteApiClient>)
                    }
                    None => None,
                }
            };

            let extractor = Extractor::new(store, config, api_client);
            let pending = extractor.pending(limit)?;
            let total = pending.len();
            info!(total, "extracting pending documents");

            let mut extracted = 0u64;
            let mut flagged_for_synthesis = 0u64;
            let mut errored = 0u64;

            for (i, doc) in pending.iter().enumerate() {
                match extractor.extract_one(doc).await? {
                    ExtractOutcome::Extracted {
                        letter_id,
                        method,
                        needs_llm_extraction,
                    } => {
                        extracted += 1;
                        if needs_llm_extraction {
                            flagged_for_synthesis += 1;
                        }
                        println!("[{}/{}] {letter_id} ({method})", i + 1, total);
                    }
                    ExtractOutcome::Error => {
                        errored += 1;
                        println!("[{}/{}] {} -- error", i + 1, total, doc.pdf_url);
                    }
                }
            }

            println!("Extracted:            {extracted}");
            println!("Flagged for synthesis: {flagged_for_synthesis}");
            println!("Errored:               {errored}");
        }
        Commands::Stats => {
            let stats = store.stats()?;
            println!("Total documents:        {}", stats.total_documents);
            println!("Needs LLM extraction:   {}", stats.needs_llm_extraction);
            println!("By extraction status:");
            for (status, count) in &stats.by_extraction_status {
                println!("  {status}: {count}");
            }
        }
    }

    Ok(())
}
