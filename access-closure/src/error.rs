use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClosureError {
    /// The upstream edge source failed. Fatal to the whole dataset build.
    #[error("Ingestion failed: {0}")]
    Ingestion(String),

    #[error("Invalid edge: {0}")]
    InvalidEdge(String),

    #[error("Unknown edge kind: {0}")]
    UnknownEdgeKind(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl ClosureError {
    /// Whether the error came from ingesting edges, as opposed to local setup.
    /// Reading or decoding a relationship dump counts as ingestion.
    pub fn is_ingestion(&self) -> bool {
        matches!(
            self,
            Self::Ingestion(_) | Self::InvalidEdge(_) | Self::Io(_) | Self::Serialization(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ClosureError>;
