// ============================================================================
// Error Type
// ============================================================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApodError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("APOD API returned HTTP {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid date '{0}' (expected YYYY-MM-DD between 1995-06-16 and today)")]
    InvalidDate(String),

    #[error("{0}")]
    Usage(String),

    #[error("Failed to set wallpaper: {0}")]
    #[cfg_attr(not(target_os = "windows"), allow(dead_code))]
    Wallpaper(String),

    #[error("{0} is only supported on Windows")]
    Unsupported(&'static str),
}

impl ApodError {
    /// Exit status for the process: usage mistakes are distinguished from
    /// runtime failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            ApodError::Usage(_) | ApodError::InvalidDate(_) => 2,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApodError>;
