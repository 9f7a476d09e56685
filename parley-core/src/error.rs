use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParleyError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid identifier format: {0}")]
    Format(String),

    #[error("Session is already closed")]
    AlreadyClosed,

    #[error("External service error: {0}")]
    External(String),

    #[error("Other error: {0}")]
    Other(String),
}
