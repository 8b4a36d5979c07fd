use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("failed to read {}: {source}", file.display())]
    Read {
        file: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {detail}", file.display())]
    Parse { file: PathBuf, detail: String },

    #[error("unknown operator: {0}")]
    UnknownOperator(String),

    #[error("workspace setup failed: {0}")]
    Workspace(String),

    #[error("go mod tidy failed:\n{0}")]
    Tidy(String),

    #[error("test compilation failed for {package}:\n{output}")]
    Compile { package: String, output: String },

    #[error("invalid package path contains newline: {0:?}")]
    InvalidPackagePath(String),

    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
