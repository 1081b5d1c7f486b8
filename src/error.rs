use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for treefence operations
#[derive(Error, Debug)]
pub enum TreefenceError {
    /// Source path does not exist, is not a directory, or matched nothing
    #[error("Directory not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid style, depth, or directive option
    #[error("Invalid configuration for `{option}`: {message}")]
    Configuration { option: String, message: String },

    /// Remote source rejected or unreachable, or a path escaping the base directory
    #[error("Access denied to {target}: {reason}")]
    Access { target: String, reason: String },

    /// IO error when reading directories
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// `WalkDir` error when traversing directories
    #[error("Directory traversal error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// Error from the gitignore-aware walker
    #[error("Directory traversal error: {0}")]
    Ignore(#[from] ignore::Error),

    /// Invalid exclude pattern
    #[error("Glob error: {0}")]
    Glob(#[from] globset::Error),

    /// Regex compilation error
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification reported to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Configuration,
    Access,
}

impl TreefenceError {
    pub(crate) fn config(option: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            option: option.into(),
            message: message.into(),
        }
    }

    pub(crate) fn access(target: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Access {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Maps the error onto the not-found / configuration / access taxonomy.
    ///
    /// Traversal and IO failures mean the source could not be read, so they
    /// count as `NotFound`.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } | Self::Io(_) | Self::WalkDir(_) | Self::Ignore(_) => {
                ErrorKind::NotFound
            }
            Self::Configuration { .. } | Self::Glob(_) | Self::Regex(_) | Self::Json(_) => {
                ErrorKind::Configuration
            }
            Self::Access { .. } => ErrorKind::Access,
        }
    }
}

pub type Result<T> = std::result::Result<T, TreefenceError>;
