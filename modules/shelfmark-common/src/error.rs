use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShelfmarkError {
    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}
