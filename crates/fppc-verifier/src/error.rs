use thiserror::Error;

#[derive(Error, Debug)]
pub enum VerifyError {
    #[error("document {0} has no local PDF path recorded")]
    MissingPdf(i32),

    #[error("document {0} has no structured record on disk")]
    MissingRecord(i32),

    #[error("classical OCR binary failed: {0}")]
    ClassicalOcr(String),

    #[error("cost ceiling of ${0:.2} reached")]
    CostCeiling(f64),

    #[error(transparent)]
    Core(#[from] fppc_core::CoreError),

    #[error(transparent)]
    Client(#[from] fppc_clients::ClientError),

    #[error(transparent)]
    Extract(#[from] fppc_extractor::ExtractError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type VerifyResult<T> = Result<T, VerifyError>;
