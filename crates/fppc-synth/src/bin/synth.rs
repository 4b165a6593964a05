//! LLM Section Synthesiser binary (spec section 4.6, component C6).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fppc_clients::{EndpointConfig, HttpApiClient};
use fppc_core::{ApiKeyConfig, PipelineConfig, StateStore};
use fppc_synth::{SynthOutcome, Synthesiser};
use tracing::info;

#[derive(Parser)]
#[command(name = "synth")]
#[command(about = "Synthesise Question/Conclusion sections for low-confidence structured records")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synthesise up to `--limit` pending rows (all of them if omitted).
    ProcessPending {
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Project the cost of running `process-pending` without calling the API.
    EstimateCost {
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Print pipeline statistics.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    fppc_core::logging::init();

    let cli = Cli::parse();
    let config = PipelineConfig::load()?;
    let store = StateStore::open(&config.state_db_path())?;

    match cli.command {
        Commands::ProcessPending { limit } => {
            let keys = ApiKeyConfig::from_env();
            let key = keys
                .get(ApiKeyConfig::TEXT_LLM)
                .ok_or_else(|| anyhow::anyhow!("FPPC_TEXT_LLM_API_KEY is not set"))?;
            let endpoint = EndpointConfig {
                base_url: config.text_llm_base_url.clone(),
                model: config.text_llm_model.clone(),
                api_key: key.to_string(),
            };
            let client = HttpApiClient::new(
                endpoint.clone(),
                endpoint.clone(),
                endpoint,
                Duration::from_secs(config.request_timeout_secs),
            )?;

            let synth = Synthesiser::new(store, config, Arc::new(client));
            let pending = synth.pending(limit)?;
            let total = pending.len();
            info!(total, "synthesising pending documents");

            let mut synthesised = 0u64;
            let mut errored = 0u64;
            for (i, doc) in pending.iter().enumerate() {
                match synth.synthesise_one(doc).await? {
                    SynthOutcome::Synthesised { letter_id, confidence } => {
                        synthesised += 1;
                        println!("[{}/{}] {letter_id} (confidence {confidence:.2})", i + 1, total);
                    }
                    SynthOutcome::Error => {
                        errored += 1;
                        println!("[{}/{}] {} -- error", i + 1, total, doc.pdf_url);
                    }
                }
            }

            println!("Synthesised: {synthesised}");
            println!("Errored:     {errored}");
        }
        Commands::EstimateCost { limit } => {
            let synth = Synthesiser::new(
                store,
                config,
                Arc::new(fppc_clients::MockApiClient::new()),
            );
            let estimate = synth.estimate_cost(limit)?;
            println!("Documents:              {}", estimate.documents);
            println!("Estimated input tokens:  {}", estimate.estimated_input_tokens);
            println!("Estimated output tokens: {}", estimate.estimated_output_tokens);
            println!("Estimated cost (USD):    {:.4}", estimate.estimated_usd);
        }
        Commands::Stats => {
            let stats = store.stats()?;
            println!("Total documents:      {}", stats.total_documents);
            println!("Needs LLM synthesis:  {}", stats.needs_llm_extraction);
        }
    }

    Ok(())
}
