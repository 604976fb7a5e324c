/// Domain-specific error types for the normalization pipeline.
/// Every variant is fatal for the current run. The pipeline must:
/// - Never swallow a failure inside a stage
/// - Leave the previously published document untouched on any error
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("unknown view: {0}")]
    UnknownView(String),

    #[error("schema violation in {view} record {record}: field `{field}` {reason}")]
    SchemaViolation {
        view: String,
        record: String,
        field: String,
        reason: String,
    },

    #[error("malformed document: {0}")]
    MalformedDocument(String),

    #[error("invalid schema for {view}: {reason}")]
    InvalidSchema { view: String, reason: String },

    #[error("reserved key cannot hold a view: {0}")]
    ReservedKey(String),

    #[error("io error: {0}")]
    Io(String),

    #[error("config error: {0}")]
    Config(String),
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(e: serde_json::Error) -> Self {
        PipelineError::MalformedDocument(e.to_string())
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;
