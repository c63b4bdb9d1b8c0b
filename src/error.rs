use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoaddataError {
    #[error("Malformed key: {0}")]
    MalformedKey(String),
    #[error("Unknown model: {0}")]
    UnknownModel(String),
    #[error("Unknown field '{field}' on model '{model}'")]
    UnknownField { model: String, field: String },
    #[error("Invalid value for field '{field}': {message}")]
    FieldValidation { field: String, message: String },
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("Persistence error: {0}")]
    Persistence(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, LoaddataError>;

impl LoaddataError {
    pub(crate) fn field(field: &str, message: impl Into<String>) -> Self {
        Self::FieldValidation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

// Helper conversions
impl From<rusqlite::Error> for LoaddataError {
    fn from(e: rusqlite::Error) -> Self { Self::Persistence(e.to_string()) }
}
impl From<config::ConfigError> for LoaddataError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
