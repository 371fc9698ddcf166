use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("Invalid params: {0}")]
    InvalidParams(String),
    #[error("Invalid type: {0}")]
    InvalidType(String),
    #[error("Item not found: {0}")]
    ItemNotFound(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Parse error: {message}")]
    Parse { message: String, line: Option<usize>, col: Option<usize> },
    #[error("Config error: {0}")]
    Config(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
    #[error("Protocol error: {0}")]
    Protocol(String),
}

pub type Result<T> = std::result::Result<T, PatternError>;

impl PatternError {
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse { message: message.into(), line: None, col: None }
    }
}

// Helper conversions
impl From<config::ConfigError> for PatternError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl From<serde_json::Error> for PatternError {
    fn from(e: serde_json::Error) -> Self { Self::Protocol(e.to_string()) }
}
impl<T> From<std::sync::PoisonError<T>> for PatternError {
    fn from(e: std::sync::PoisonError<T>) -> Self { Self::Lock(e.to_string()) }
}
