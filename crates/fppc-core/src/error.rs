use thiserror::Error;

/// Error taxonomy for the ingestion and fidelity pipeline (spec section 7).
///
/// Transient and rate-limited errors are expected to be retried by the
/// caller's own backoff loop before ever reaching a `CoreError`; by the time
/// one of these variants is constructed, the stage has already decided how
/// to persist the failure (row left `pending`, row moved to `failed`, etc).
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("database connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("database pool configuration error: {0}")]
    PoolBuild(String),

    #[error("migration error: {0}")]
    Migration(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transient network failure after retries: {0}")]
    TransientNetwork(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("failed to parse {what}: {detail}")]
    ParseFailed { what: String, detail: String },

    #[error("required local input missing: {0}")]
    InputMissing(String),

    #[error("cost ceiling reached: spent {spent_usd:.4} of {ceiling_usd:.4} budgeted")]
    CostCeilingHit { spent_usd: f64, ceiling_usd: f64 },

    #[error("extracted text quality too low: {0}")]
    QualityTooLow(String),

    #[error("hallucination detected: {0}")]
    HallucinationDetected(String),

    #[error("{0}")]
    Other(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
