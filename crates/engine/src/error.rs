//! Error types for the crossing engine

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Search space exhausted after {attempts} attempts: {context}")]
    ExhaustedSearchSpace { attempts: usize, context: String },

    #[error("Invalid decision call: {0}")]
    InvalidDecisionCall(String),

    #[error("Strategy used after stop")]
    DisposedEngineUse,

    #[error(transparent)]
    Config(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
