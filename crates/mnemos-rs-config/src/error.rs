//! Errors raised while reading `mnemos.json5` layers.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read mnemos config: {0}")]
    ReadFailed(#[from] std::io::Error),
    /// The file is not valid JSON5.
    #[error("mnemos config is not valid json5: {0}")]
    ParseFailed(#[from] json5::Error),
    /// The merged value does not fit `MnemosConfig`.
    #[error("mnemos config does not match the schema: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// `path` is `<layer>:<dotted.key>`.
    #[error("{path}: {message}")]
    InvalidField { path: String, message: String },
    #[error("mnemos config rejected: {0}")]
    Invalid(String),
}
