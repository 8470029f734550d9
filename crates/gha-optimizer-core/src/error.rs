use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid repository reference '{0}': expected format 'owner/repo'")]
    InvalidRepository(String),

    #[error("GitHub authentication failed: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("GitHub API error ({status}): {message}")]
    GitHub { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse workflow YAML in {path}: {message}")]
    Yaml { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OptimizerError>;
