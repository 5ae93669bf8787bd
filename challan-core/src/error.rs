use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChallanError {
    #[error("Classification error: {0}")]
    Classification(String),

    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Narration error: {0}")]
    Narration(String),

    #[error("Delivery error: {0}")]
    Delivery(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, ChallanError>;
