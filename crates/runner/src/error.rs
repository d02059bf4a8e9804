use thiserror::Error;

use crate::config::ConfigError;

#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Mirror error: {0}")]
    Mirror(#[from] concord_mirror::Error),

    #[error("Dispatch thread failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
