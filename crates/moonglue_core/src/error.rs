//! Error types for moonglue

use thiserror::Error;

/// Main error type for moonglue operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Result type alias for moonglue operations
pub type Result<T> = std::result::Result<T, Error>;
