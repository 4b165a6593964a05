use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to open PDF: {0}")]
    PdfOpen(String),

    #[error("failed to render page {page} at {dpi} DPI: {detail}")]
    Render { page: u32, dpi: u32, detail: String },

    #[error("no local binary found for document {0}")]
    BinaryMissing(i32),

    #[error(transparent)]
    Core(#[from] fppc_core::CoreError),

    #[error(transparent)]
    Client(#[from] fppc_clients::ClientError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type ExtractResult<T> = Result<T, ExtractError>;
