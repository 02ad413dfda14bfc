use thiserror::Error;

/// Errors shared across the Ontap crates
#[derive(Error, Debug)]
pub enum OntapError {
    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("Parsing Error: {0}")]
    ParsingError(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// Result type for Ontap operations
pub type OntapResult<T> = Result<T, OntapError>;
