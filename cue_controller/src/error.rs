use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("ws bind failed on {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid controller config: {0}")]
    Config(String),
}
