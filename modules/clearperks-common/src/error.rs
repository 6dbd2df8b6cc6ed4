use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClearPerksError {
    #[error("Store error: {0}")]
    Store(String),

    #[error("Push provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
