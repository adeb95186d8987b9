use thiserror::Error;

/// Failures surfaced by the conversion, backfill and export pipelines.
#[derive(Debug, Error)]
pub enum ChessError {
    /// The move list could not be parsed or replayed; the whole record is unusable.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("source not found: {0}")]
    SourceNotFound(String),
    #[error("no data rows at or after row {0}")]
    NoData(usize),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("row store error: {0}")]
    Store(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type ChessResult<T> = Result<T, ChessError>;

#[derive(Debug, Clone, Default)]
pub struct ErrorAccumulator(Option<String>);

impl ErrorAccumulator {
    pub fn push(&mut self, msg: &str) {
        match &mut self.0 {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(msg);
            }
            None => {
                self.0 = Some(msg.to_string());
            }
        }
    }

    pub fn take(&mut self) -> Option<String> {
        self.0.take()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}
