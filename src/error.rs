use thiserror::Error;

#[derive(Error, Debug)]
pub enum CogsError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid coverage factor {0}: must be a finite, non-negative number")]
    InvalidCoverageFactor(f64),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("No known fiscal period contains {0}")]
    PeriodNotFound(String),

    #[error("Date range {start} to {end} spans {days} days; upstream allows at most {max}")]
    DateRangeTooLong {
        start: String,
        end: String,
        days: i64,
        max: i64,
    },

    #[error("Coverage calibration failed for {label}: {details}")]
    Calibration { label: String, details: String },

    #[error("{operation} failed after {attempts} attempt(s): {message}")]
    Upstream {
        operation: String,
        attempts: u32,
        message: String,
    },

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Missing environment variable: {0}")]
    MissingEnv(String),

    #[cfg(feature = "upstream")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CogsError>;
