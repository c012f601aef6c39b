use thiserror::Error;
#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("malformed inbound message: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("cannot allocate a {width}x{height} drawing surface")]
    SurfaceAllocation { width: u32, height: u32 },
    #[error("failed to encode snapshot: {0}")]
    Snapshot(String),
}
impl From<image::ImageError> for ScopeError {
    fn from(value: image::ImageError) -> Self {
        ScopeError::Snapshot(value.to_string())
    }
}
impl From<tungstenite::Error> for ScopeError {
    fn from(value: tungstenite::Error) -> Self {
        ScopeError::Transport(value.to_string())
    }
}
