use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BlogError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid front matter in {path}: {message}")]
    FrontMatter { path: PathBuf, message: String },
    #[error("unrecognised post date `{0}`, expected DD.MM.YYYY or YYYY-MM-DD")]
    InvalidDate(String),
    #[error("remote request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("remote responded with status {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),
}

impl BlogError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BlogError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = BlogError> = std::result::Result<T, E>;
