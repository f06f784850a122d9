use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(
        "No portal configuration found. Looked for:\n\
        - the file named by PORTAL_CONFIG_PATH\n\
        - ./portal.yaml\n\
        - ~/.config/portalflow/config.yaml\n\
        Alternatively set PORTAL_API_URL and PORTAL_TOKEN"
    )]
    NotFound,

    #[error("Missing configuration value: {0}")]
    MissingValue(String),

    #[error("Invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
