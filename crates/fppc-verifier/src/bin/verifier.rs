//! Fidelity Verifier binary (spec section 4.7, component C7).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fppc_clients::{EndpointConfig, HttpApiClient};
use fppc_core::models::FidelityRisk;
use fppc_core::{ApiKeyConfig, PipelineConfig, StateStore};
use fppc_verifier::{report, CostTracker, Verifier, DEFAULT_SAMPLE_SEED};
use tracing::info;

#[derive(Parser)]
#[command(name = "verifier")]
#[command(about = "Assess and repair vision-OCR fidelity across the advice-letter corpus")]
struct Cli {
    /// Global cost ceiling in USD; the run halts cleanly at the next safe
    /// point once spend reaches this value (spec section 6, exit code 2).
    #[arg(long)]
    max_usd: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Phase 1: classical-OCR canary scan of every vision-OCR'd document.
    CanaryScan {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        resume: bool,
    },

    /// Phase 2: vision-LLM adjudication of the critical/high-risk tier.
    VerifyHighRisk,

    /// Phase 3: statistical sampling of the medium-risk tier.
    SampleMediumRisk {
        #[arg(long, default_value_t = DEFAULT_SAMPLE_SEED)]
        seed: u64,
    },

    /// Phase 4: full page-by-page re-transcription of a risk tier.
    Retranscribe {
        #[arg(long, value_enum)]
        risk: RiskArg,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Write the combined fidelity_report.md from whatever phase reports
    /// are present on disk.
    Report,
}

#[derive(Clone, clap::ValueEnum)]
enum RiskArg {
    Critical,
    High,
    Medium,
}

impl From<RiskArg> for FidelityRisk {
    fn from(value: RiskArg) -> Self {
        match value {
            RiskArg::Critical => FidelityRisk::Critical,
            RiskArg::High => FidelityRisk::High,
            RiskArg::Medium => FidelityRisk::Medium,
        }
    }
}

fn build_vision_client(config: &PipelineConfig) -> Result<Arc<dyn fppc_clients::RemoteApiClient>> {
    let keys = ApiKeyConfig::from_env();
    let key = keys
        .get(ApiKeyConfig::VISION_LLM)
        .ok_or_else(|| anyhow::anyhow!("FPPC_VISION_LLM_API_KEY is not set"))?;
    let endpoint = EndpointConfig {
        base_url: config.vision_llm_base_url.clone(),
        model: config.vision_llm_model.clone(),
        api_key: key.to_string(),
    };
    let client = HttpApiClient::new(
        endpoint.clone(),
        endpoint.clone(),
        endpoint,
        Duration::from_secs(config.request_timeout_secs),
    )?;
    Ok(Arc::new(client))
}

#[tokio::main]
async fn main() -> Result<()> {
    fppc_core::logging::init();

    let cli = Cli::parse();
    let config = PipelineConfig::load()?;
    let store = StateStore::open(&config.state_db_path())?;

    let mut ceiling_hit = false;

    match cli.command {
        Commands::CanaryScan { limit, resume } => {
            // The canary scan calls no remote API, so any client will do.
            let verifier = Verifier::new(store, config, Arc::new(fppc_clients::MockApiClient::new()));
            let report = verifier.run_canary_scan(limit, resume).await?;
            println!("Scanned:           {}", report.total_scanned);
            println!("Errors:            {}", report.errors);
            println!("Description mode:  {}", report.description_mode_count);
            for (tier, count) in &report.tier_distribution {
                println!("  {tier}: {count}");
            }
        }
        Commands::VerifyHighRisk => {
            let client = build_vision_client(&config)?;
            let verifier = Verifier::new(store, config, client);
            let mut cost = CostTracker::new(cli.max_usd);
            let report = verifier.run_high_risk_verification(&mut cost).await?;
            println!("Verified:   {}", report.total_verified);
            println!("OK:         {}", report.verified_ok);
            println!("Hallucin.:  {}", report.hallucinated);
            println!("Fixed:      {}", report.fixed);
            println!("Unreadable: {}", report.unreadable);
            println!("Cost (USD): {:.4}", report.total_cost_usd);
            ceiling_hit = cost.exceeded();
        }
        Commands::SampleMediumRisk { seed } => {
            let client = build_vision_client(&config)?;
            let verifier = Verifier::new(store, config, client);
            let mut cost = CostTracker::new(cli.max_usd);
            let report = verifier.run_medium_risk_sampling(seed, &mut cost).await?;
            println!("Medium tier total: {}", report.medium_tier_total);
            println!("Sample size:       {}", report.sample_size);
            println!("Error rate:        {:.3}", report.error_rate);
            println!("Decision:          {}", report.decision);
            println!("Cost (USD):        {:.4}", report.total_cost_usd);
            ceiling_hit = cost.exceeded();
        }
        Commands::Retranscribe { risk, limit } => {
            let client = build_vision_client(&config)?;
            let verifier = Verifier::new(store, config, client);
            let mut cost = CostTracker::new(cli.max_usd);
            let report = verifier.run_full_retranscription(risk.into(), limit, &mut cost).await?;
            println!("Retranscribed: {}", report.total_retranscribed);
            println!("Errors:        {}", report.errors);
            println!("Cost (USD):    {:.4}", report.total_cost_usd);
            ceiling_hit = cost.exceeded();
        }
        Commands::Report => {
            let stats = store.stats()?;
            let reports_dir = config.reports_dir();
            let canary = read_report::<report::CanaryReport>(&reports_dir, "canary_scan");
            let high_risk = read_report::<report::HighRiskReport>(&reports_dir, "high_risk_verification");
            let medium_risk = read_report::<report::MediumSamplingReport>(&reports_dir, "medium_risk_sampling");
            let markdown = report::generate_markdown(&stats, canary.as_ref(), high_risk.as_ref(), medium_risk.as_ref());
            report::write_fidelity_report_markdown(&reports_dir, &markdown)?;
            println!("{markdown}");
        }
    }

    if ceiling_hit {
        info!("cost ceiling reached; exiting with partial-completion code");
        std::process::exit(2);
    }

    Ok(())
}

fn read_report<T: serde::de::DeserializeOwned>(reports_dir: &std::path::Path, name: &str) -> Option<T> {
    let path = reports_dir.join(format!("{name}.json"));
    let body = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&body).ok()
}
