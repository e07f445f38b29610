use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transient network error: {0}")]
    TransientNetwork(String),

    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("timed out waiting for selector: {selector}")]
    RenderTimeout { selector: String },

    #[error("browser error: {0}")]
    Browser(String),

    #[error("image processing failed: {0}")]
    ImageProcessing(String),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl EngineError {
    /// Network failures worth retrying: transport errors, 5xx and 429.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::TransientNetwork(_) => true,
            EngineError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
