use thiserror::Error;

#[derive(Error, Debug)]
pub enum SalesPerformanceError {
    #[error("Cannot commit {period}: missing staged input(s): {}", .missing.join(", "))]
    IncompleteInput { period: String, missing: Vec<String> },

    #[error("Cannot delete or move the root node '{0}'")]
    RootDeletion(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("No snapshot committed for period {0}")]
    NoSnapshotForPeriod(String),

    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    #[error("Invalid day range {start}..={end}: days must satisfy 1 <= start <= end <= 31")]
    InvalidDayRange { start: u32, end: u32 },

    #[error("Cannot place node under '{parent}': {reason}")]
    InvalidPlacement { parent: String, reason: String },

    #[error("A node with id '{0}' already exists in the hierarchy")]
    DuplicateNode(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SalesPerformanceError>;
