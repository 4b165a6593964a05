//! Phase report types and the checkpointed JSON writers they share (spec
//! section 4.7: "Reports... written under `<data-root>/reports/`"), grounded
//! on the original `run_tesseract_canary.py` / `verify_high_risk.py` /
//! `sample_medium_risk.py` / `fidelity_report.py` report shapes.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use fppc_core::CoreResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanaryResult {
    pub doc_id: i32,
    pub letter_id: String,
    pub score: f64,
    pub risk_tier: String,
    pub description_mode: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CanaryReport {
    pub scan_time: String,
    pub total_scanned: usize,
    pub errors: usize,
    pub elapsed_seconds: f64,
    pub tier_distribution: BTreeMap<String, usize>,
    pub description_mode_count: usize,
    pub results: Vec<CanaryResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjudicationResult {
    pub doc_id: i32,
    pub letter_id: String,
    pub similarity: Option<f64>,
    pub unreadable: bool,
    pub hallucinated: bool,
    pub fixed: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HighRiskReport {
    pub scan_time: String,
    pub total_verified: usize,
    pub verified_ok: usize,
    pub hallucinated: usize,
    pub fixed: usize,
    pub unreadable: usize,
    pub errors: usize,
    pub total_cost_usd: f64,
    pub results: Vec<AdjudicationResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MediumSamplingReport {
    pub scan_time: String,
    pub medium_tier_total: usize,
    pub sample_size: usize,
    pub sample_fraction: f64,
    pub verified_ok: usize,
    pub hallucinated: usize,
    pub unreadable: usize,
    pub errors: usize,
    pub error_rate: f64,
    pub decision: String,
    pub total_cost_usd: f64,
    pub results: Vec<AdjudicationResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FullRetranscriptionResult {
    pub doc_id: i32,
    pub letter_id: String,
    pub page_count: usize,
    pub new_quality_score: f64,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FullRetranscriptionReport {
    pub scan_time: String,
    pub total_retranscribed: usize,
    pub errors: usize,
    pub total_cost_usd: f64,
    pub results: Vec<FullRetranscriptionResult>,
}

fn write_json<T: Serialize>(dir: &Path, name: &str, value: &T) -> CoreResult<()> {
    std::fs::create_dir_all(dir)?;
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| fppc_core::CoreError::Config(format!("failed to serialise {name} report: {e}")))?;
    std::fs::write(dir.join(format!("{name}.json")), json)?;
    Ok(())
}

pub fn write_canary_report(reports_dir: &Path, report: &CanaryReport) -> CoreResult<()> {
    write_json(reports_dir, "canary_scan", report)
}

pub fn write_high_risk_report(reports_dir: &Path, report: &HighRiskReport) -> CoreResult<()> {
    write_json(reports_dir, "high_risk_verification", report)
}

pub fn write_medium_risk_report(reports_dir: &Path, report: &MediumSamplingReport) -> CoreResult<()> {
    write_json(reports_dir, "medium_risk_sampling", report)
}

pub fn write_full_retranscription_report(reports_dir: &Path, report: &FullRetranscriptionReport) -> CoreResult<()> {
    write_json(reports_dir, "full_retranscription", report)
}

/// Markdown fidelity summary (spec 4.7 / `fidelity_report.py`'s
/// `generate_markdown`): executive summary plus per-risk-tier and
/// per-method breakdowns, built from whatever phase reports are present.
pub fn generate_markdown(
    stats: &fppc_core::store::PipelineStats,
    canary: Option<&CanaryReport>,
    high_risk: Option<&HighRiskReport>,
    medium_risk: Option<&MediumSamplingReport>,
) -> String {
    let mut out = String::new();
    out.push_str("# Fidelity Report\n\n");
    out.push_str("## Executive Summary\n\n");
    out.push_str("| Metric | Count |\n|---|---|\n");
    out.push_str(&format!("| Total documents | {} |\n", stats.total_documents));
    out.push_str(&format!("| Needs LLM extraction | {} |\n", stats.needs_llm_extraction));
    out.push('\n');

    out.push_str("## Risk Tier Distribution\n\n");
    out.push_str("| Risk | Count |\n|---|---|\n");
    for (risk, count) in &stats.by_fidelity_risk {
        out.push_str(&format!("| {risk} | {count} |\n"));
    }
    out.push('\n');

    out.push_str("## Assessment Methods\n\n");
    out.push_str("| Method | Count |\n|---|---|\n");
    for (method, count) in &stats.by_extraction_status {
        out.push_str(&format!("| {method} | {count} |\n"));
    }
    out.push('\n');

    if let Some(canary) = canary {
        out.push_str("## Phase 1: Canary Scan\n\n");
        out.push_str(&format!("Scanned {} documents, {} errors, {} flagged description-mode.\n\n",
            canary.total_scanned, canary.errors, canary.description_mode_count));
        out.push_str("| Tier | Count |\n|---|---|\n");
        for (tier, count) in &canary.tier_distribution {
            out.push_str(&format!("| {tier} | {count} |\n"));
        }
        out.push('\n');
    }

    if let Some(high_risk) = high_risk {
        out.push_str("## Phase 2: High-Risk Adjudication\n\n");
        out.push_str(&format!(
            "Verified {} documents: {} ok, {} hallucinated, {} repaired, {} unreadable. Cost: ${:.2}\n\n",
            high_risk.total_verified, high_risk.verified_ok, high_risk.hallucinated,
            high_risk.fixed, high_risk.unreadable, high_risk.total_cost_usd,
        ));
    }

    if let Some(medium_risk) = medium_risk {
        out.push_str("## Phase 3: Medium-Risk Sampling\n\n");
        out.push_str(&format!(
            "Sampled {} of {} medium-risk documents ({:.1}% error rate). Decision: {}. Cost: ${:.2}\n\n",
            medium_risk.sample_size, medium_risk.medium_tier_total,
            medium_risk.error_rate * 100.0, medium_risk.decision, medium_risk.total_cost_usd,
        ));
    }

    out
}

pub fn write_fidelity_report_markdown(reports_dir: &Path, markdown: &str) -> CoreResult<()> {
    std::fs::create_dir_all(reports_dir)?;
    std::fs::write(reports_dir.join("fidelity_report.md"), markdown)?;
    Ok(())
}
