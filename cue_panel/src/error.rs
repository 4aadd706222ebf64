use thiserror::Error;

#[derive(Debug, Error)]
pub enum PanelError {
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("unsupported url scheme `{0}` (expected http, https, ws or wss)")]
    UnsupportedScheme(String),
    #[error("url has no host: {0}")]
    MissingHost(String),
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("connection closed by peer")]
    Closed,
    #[error("invalid cue layout: {0}")]
    Layout(String),
}
