//! Portal HTTP error types

use portalflow_order::OrderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortalHttpError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Portal returned {status} for {method} {path}: {body}")]
    Status {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PortalHttpError {
    /// HTTP status code of a rejected request
    pub fn status(&self) -> Option<u16> {
        match self {
            PortalHttpError::Status { status, .. } => Some(*status),
            PortalHttpError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

impl From<PortalHttpError> for OrderError {
    fn from(err: PortalHttpError) -> Self {
        match err {
            PortalHttpError::Decode { source, .. } => OrderError::Decode(source),
            other => OrderError::Transport(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, PortalHttpError>;
