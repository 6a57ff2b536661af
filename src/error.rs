use thiserror::Error;

pub type TrustResult<T> = Result<T, OrchestratorError>;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Policy '{policy_id}' failed validation: {reason}")]
    PolicyValidation { policy_id: String, reason: String },

    #[error("Orchestrator is not initialized")]
    NotInitialized,

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
