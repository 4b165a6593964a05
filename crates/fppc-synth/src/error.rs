use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynthError {
    #[error("no structured record on disk for document {0}")]
    RecordMissing(i32),

    #[error("LLM returned no usable JSON envelope after retries: {0}")]
    Envelope(String),

    #[error(transparent)]
    Core(#[from] fppc_core::CoreError),

    #[error(transparent)]
    Client(#[from] fppc_clients::ClientError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type SynthResult<T> = Result<T, SynthError>;
