//! Pipeline configuration, layered the way the rest of the ecosystem does it:
//! built-in defaults, an optional TOML file, then environment variables
//! prefixed `FPPC_`. API keys are kept separate, read directly from env.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Quality-scorer component weights (spec section 4.3). Frozen; not exposed
/// as a tuning surface.
pub const WEIGHT_DENSITY: f64 = 0.15;
pub const WEIGHT_CHAR_QUALITY: f64 = 0.15;
pub const WEIGHT_WORD_STRUCTURAL: f64 = 0.15;
pub const WEIGHT_DICTIONARY: f64 = 0.40;
pub const WEIGHT_CONTENT_PATTERN: f64 = 0.15;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root directory under which raw binaries, extracted records, the
    /// state store, checkpoints and reports all live.
    pub data_root: PathBuf,

    /// Templated catalog search URL; crawler substitutes year and page.
    pub catalog_base_url: String,
    pub year_range_start: i32,
    pub year_range_end: i32,

    /// Politeness delay between catalog pages / binary downloads.
    pub politeness_delay_ms: u64,

    pub retry_max_attempts: u32,
    pub retry_backoff_base_ms: u64,
    pub rate_limit_backoff_base_ms: u64,
    pub request_timeout_secs: u64,

    /// Section parser: minimum words for a section to survive (open
    /// question, defaults to 1 per the frozen decision in the design doc).
    pub min_section_words: usize,

    /// Year below which documents are assumed scanned-era (OCR fallback).
    pub legacy_year_cutoff: i32,

    /// Quality-score threshold below which OCR fallback is considered.
    pub ocr_quality_threshold: f64,
    pub ocr_min_words_per_page: f64,
    pub ocr_min_alpha_ratio: f64,
    pub ocr_max_garbage_tokens: usize,

    /// Cap on pages rendered for vision-OCR per document.
    pub max_ocr_pages: usize,
    pub ocr_render_dpi: u32,
    pub canary_render_dpi: u32,
    pub full_retranscription_dpi: u32,
    pub max_image_bytes: usize,

    /// Page-level rate limit against the vision-OCR backend (spec 4.4 step
    /// 5: "one page per request, with page-level rate limiting").
    pub vision_ocr_rate_limit_per_sec: u32,

    /// Section-parse confidence below which a record is flagged for LLM
    /// synthesis (spec 4.4 step 9, open question: frozen default).
    pub llm_synthesis_confidence_threshold: f64,

    /// Verifier thresholds.
    pub canary_critical_max: f64,
    pub canary_high_max: f64,
    pub canary_medium_max: f64,
    pub adjudication_similarity_threshold: f64,
    pub medium_risk_sample_fraction: f64,
    pub medium_risk_sample_minimum: usize,
    pub medium_risk_hallucination_threshold: f64,
    pub classical_ocr_quality_threshold: f64,
    pub checkpoint_flush_every: usize,
    pub verifier_worker_pool_size: usize,

    /// Cost accounting, USD per million tokens.
    pub text_llm_input_cost_per_million: f64,
    pub text_llm_output_cost_per_million: f64,
    pub vision_llm_input_cost_per_million: f64,
    pub vision_llm_output_cost_per_million: f64,

    /// Classical OCR subprocess.
    pub classical_ocr_binary: String,
    pub classical_ocr_language: String,

    pub extractor_worker_pool_size: usize,

    /// Endpoint configuration for the three remote-API roles (spec section
    /// 6 "Remote interfaces"); the API key itself lives in [`ApiKeyConfig`],
    /// read straight from the environment, never through this layered
    /// config surface.
    pub vision_ocr_base_url: String,
    pub vision_ocr_model: String,
    pub text_llm_base_url: String,
    pub text_llm_model: String,
    pub vision_llm_base_url: String,
    pub vision_llm_model: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("./data"),
            catalog_base_url: "https://www.fppc.ca.gov/transparency/AdviceLetters.html"
                .to_string(),
            year_range_start: 1975,
            year_range_end: 2026,
            politeness_delay_ms: 1000,
            retry_max_attempts: 5,
            retry_backoff_base_ms: 500,
            rate_limit_backoff_base_ms: 2000,
            request_timeout_secs: 30,
            min_section_words: 1,
            legacy_year_cutoff: 1995,
            ocr_quality_threshold: 0.55,
            ocr_min_words_per_page: 50.0,
            ocr_min_alpha_ratio: 0.5,
            ocr_max_garbage_tokens: 30,
            max_ocr_pages: 20,
            ocr_render_dpi: 200,
            canary_render_dpi: 300,
            full_retranscription_dpi: 300,
            max_image_bytes: 5 * 1024 * 1024,
            vision_ocr_rate_limit_per_sec: 2,
            llm_synthesis_confidence_threshold: 0.6,
            canary_critical_max: 0.30,
            canary_high_max: 0.50,
            canary_medium_max: 0.70,
            adjudication_similarity_threshold: 0.70,
            medium_risk_sample_fraction: 0.10,
            medium_risk_sample_minimum: 20,
            medium_risk_hallucination_threshold: 0.10,
            classical_ocr_quality_threshold: 0.55,
            checkpoint_flush_every: 100,
            verifier_worker_pool_size: 1,
            text_llm_input_cost_per_million: 3.0,
            text_llm_output_cost_per_million: 15.0,
            vision_llm_input_cost_per_million: 3.0,
            vision_llm_output_cost_per_million: 15.0,
            classical_ocr_binary: "tesseract".to_string(),
            classical_ocr_language: "eng".to_string(),
            extractor_worker_pool_size: 4,
            vision_ocr_base_url: "https://api.openai.com/v1".to_string(),
            vision_ocr_model: "gpt-4o-mini".to_string(),
            text_llm_base_url: "https://api.anthropic.com/v1".to_string(),
            text_llm_model: "claude-haiku-4-5".to_string(),
            vision_llm_base_url: "https://api.anthropic.com/v1".to_string(),
            vision_llm_model: "claude-haiku-4-5".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from (in ascending precedence): built-in defaults,
    /// `./fppc.toml` if present, then `FPPC_*` environment variables.
    ///
    /// `.env` is loaded first via `dotenvy`, matching the rest of the
    /// ecosystem's layering convention.
    pub fn load() -> CoreResult<Self> {
        let _ = dotenvy::dotenv();

        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default()).map_err(|e| {
                CoreError::Config(format!("failed to serialise default config: {e}"))
            })?)
            .add_source(config::File::with_name("fppc").required(false))
            .add_source(config::Environment::with_prefix("FPPC").separator("__"))
            .build()
            .map_err(|e| CoreError::Config(e.to_string()))?;

        settings
            .try_deserialize()
            .map_err(|e| CoreError::Config(e.to_string()))
    }

    pub fn raw_dir(&self, year: i32) -> PathBuf {
        self.data_root.join("raw").join(year.to_string())
    }

    pub fn extracted_dir(&self, year: i32) -> PathBuf {
        self.data_root.join("extracted").join(year.to_string())
    }

    pub fn state_db_path(&self) -> PathBuf {
        self.data_root.join("state.db")
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.data_root.join("checkpoint.json")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_root.join("reports")
    }
}

/// Remote API keys, read directly from environment variables. Only
/// required when the stage that needs them is enabled (spec section 6).
#[derive(Debug, Clone, Default)]
pub struct ApiKeyConfig {
    keys: HashMap<String, String>,
}

impl ApiKeyConfig {
    pub const VISION_OCR: &'static str = "VISION_OCR";
    pub const TEXT_LLM: &'static str = "TEXT_LLM";
    pub const VISION_LLM: &'static str = "VISION_LLM";

    pub fn from_env() -> Self {
        let mut keys = HashMap::new();
        for (name, env_var) in [
            (Self::VISION_OCR, "FPPC_VISION_OCR_API_KEY"),
            (Self::TEXT_LLM, "FPPC_TEXT_LLM_API_KEY"),
            (Self::VISION_LLM, "FPPC_VISION_LLM_API_KEY"),
        ] {
            if let Ok(key) = std::env::var(env_var) {
                keys.insert(name.to_string(), key);
            }
        }
        Self { keys }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.keys.get(name).map(String::as_str)
    }

    pub fn require(&self, name: &str) -> CoreResult<&str> {
        self.get(name)
            .ok_or_else(|| CoreError::Config(format!("missing required API key: {name}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_year_range() {
        let cfg = PipelineConfig::default();
        assert!(cfg.year_range_start < cfg.year_range_end);
        assert_eq!(cfg.min_section_words, 1);
    }

    #[test]
    fn weights_sum_to_one() {
        let total = WEIGHT_DENSITY
            + WEIGHT_CHAR_QUALITY
            + WEIGHT_WORD_STRUCTURAL
            + WEIGHT_DICTIONARY
            + WEIGHT_CONTENT_PATTERN;
        assert!((total - 1.0).abs() < 1e-9);
    }

    #[test]
    fn api_key_config_reads_env() {
        std::env::set_var("FPPC_VISION_OCR_API_KEY", "test-key");
        let cfg = ApiKeyConfig::from_env();
        assert_eq!(cfg.get(ApiKeyConfig::VISION_OCR), Some("test-key"));
        assert!(cfg.get(ApiKeyConfig::TEXT_LLM).is_none());
        std::env::remove_var("FPPC_VISION_OCR_API_KEY");
    }
}
