use thiserror::Error;

#[derive(Error, Debug)]
pub enum CitegraphError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("failed to walk extracted directory: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type CitegraphResult<T> = Result<T, CitegraphError>;
