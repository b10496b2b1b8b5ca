//! Error taxonomy for module and shell operations.
//!
//! Per-module failures (load, unload, preload) are reported to stderr by the
//! dispatcher and isolated from the rest of the invocation; only CLI parse
//! failures abort the whole run.

use std::path::PathBuf;
use thiserror::Error;

/// Raised by shell-recorder operations.
#[derive(Debug, Error)]
pub enum ShellError {
    /// A recipe running in reverse-operation mode invoked an operation that
    /// has no inverse.
    #[error("shell operation {0} cannot be reversed")]
    ReverseOperation(&'static str),

    /// A path check with enforce semantics failed.
    #[error("{0} is not an executable directory")]
    PathCheck(String),
}

/// Raised while locating or parsing a recipe file.
#[derive(Debug, Error)]
pub enum RecipeError {
    #[error("Module {0} not found")]
    NotFound(String),

    #[error("unable to read recipe {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse recipe {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Raised while validating a module's preconditions.
#[derive(Debug, Error)]
pub enum PreloadError {
    #[error("Module {module} conflicts with loaded module {conflict}")]
    Conflict { module: String, conflict: String },

    #[error("dependency cycle through {0}")]
    Cycle(String),
}

/// Raised when a module cannot be loaded.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Module {0} already loaded")]
    AlreadyLoaded(String),

    #[error(transparent)]
    Recipe(#[from] RecipeError),

    #[error(transparent)]
    Preload(#[from] PreloadError),

    #[error("unable to load {module}: {source}")]
    Shell {
        module: String,
        #[source]
        source: ShellError,
    },
}

/// Raised when a module cannot be unloaded.
#[derive(Debug, Error)]
pub enum UnloadError {
    #[error("Module {0} not loaded")]
    NotLoaded(String),

    #[error("Module(s) ({dependants}) still depend on {module}.")]
    StillNeeded { module: String, dependants: String },

    #[error(transparent)]
    Recipe(#[from] RecipeError),

    #[error("unable to unload {module}: {source}")]
    Shell {
        module: String,
        #[source]
        source: ShellError,
    },
}

/// Raised when an atomic swap cannot complete. The environment is left in
/// its pre-call state.
#[derive(Debug, Error)]
pub enum SwapError {
    #[error(transparent)]
    Unload(#[from] UnloadError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Raised when a persisted-state payload cannot be decoded. Non-fatal: the
/// caller discards the prior state and continues from an empty one.
#[derive(Debug, Error)]
pub enum StateDecodeError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid state payload: {0}")]
    Payload(#[from] serde_json::Error),
}
