// SPDX-License-Identifier: GPL-3.0-or-later
use refrain_config::ConfigError;
use refrain_engine::EngineError;
use thiserror::Error;

use crate::sanitize::EncodingError;

/// Everything that ends the process with a non-zero status.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}. Exiting")]
    Configuration(#[from] ConfigError),

    #[error("{0}")]
    Usage(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}
