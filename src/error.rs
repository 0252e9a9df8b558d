use serde::ser::Serializer;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("request failed with status {status} {status_text}")]
    Status { status: u16, status_text: String },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("websocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),
    #[error("json decode error: {0}")]
    Decode(#[from] simd_json::Error),
    #[error("invalid record: {0}")]
    InvalidRecord(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("no tokio runtime: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),
}

impl SyncError {
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::WebSocket(_) | Self::Io(_) => true,
            Self::Status { status, .. } => *status == 408 || *status == 429 || *status >= 500,
            Self::InvalidArgument(_)
            | Self::Configuration(_)
            | Self::Decode(_)
            | Self::InvalidRecord(_)
            | Self::Runtime(_) => false,
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for SyncError {
    fn from(value: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(value))
    }
}

impl serde::Serialize for SyncError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
