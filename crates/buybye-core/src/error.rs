use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("unknown concept: {0}")]
    UnknownConcept(String),

    #[error("unknown operation: {0}")]
    UnknownAction(String),

    #[error("concept already registered: {0}")]
    DuplicateConcept(String),

    #[error("sync already registered: {0}")]
    DuplicateSync(String),

    #[error("sync '{0}' has no when patterns")]
    EmptyWhen(String),

    #[error("sync '{sync}': {action} is a query and cannot be dispatched from then")]
    QueryInThen { sync: String, action: String },

    #[error("sync '{sync}': {action} is an action and cannot be called from where")]
    ActionInWhere { sync: String, action: String },

    #[error("sync '{sync}': variable '{var}' is never bound")]
    UnboundVariable { sync: String, var: String },

    #[error("sync '{sync}': collect_as would overwrite bound variable '{var}'")]
    CollectOverwrites { sync: String, var: String },

    #[error("round limit of {0} exceeded")]
    RoundLimitExceeded(usize),

    #[error("request timed out after {0} ms")]
    Timeout(u64),

    #[error("no response was produced for request {0}")]
    NoResponse(String),

    #[error("query {action} failed: {reason}")]
    QueryFailed { action: String, reason: String },

    #[error("expected a JSON object, got {0}")]
    NotARecord(String),

    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
