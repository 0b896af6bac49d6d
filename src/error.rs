use thiserror::Error;

#[derive(Error, Debug)]
pub enum GovernanceError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Remote write rejected: {0}")]
    RemoteWrite(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Rename of option {option_id} failed and was rolled back: {cause}")]
    RenameRolledBack { option_id: String, cause: String },

    #[error(
        "Rename of option {option_id} failed ({cause}) and rollback failed ({rollback_error}); \
         replay the backup at {snapshot}"
    )]
    RollbackFailed {
        option_id: String,
        cause: String,
        rollback_error: String,
        snapshot: String,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, GovernanceError>;
