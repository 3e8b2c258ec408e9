#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Recognition error: {0}")]
    Recognition(String),

    #[error("Vault error: {0}")]
    Vault(String),

    #[error("{0}")]
    General(String),
}
