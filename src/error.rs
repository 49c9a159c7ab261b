//! Error types for media-acquire
//!
//! This module provides the error taxonomy for the acquisition pipeline:
//! - Run-level errors (configuration, I/O, serialization) that abort a run before it starts
//! - Fetch errors raised by the fetch engine collaborator, contained within one job
//! - Report errors raised while writing the audit document
//!
//! Per-job failures never escape a job: they are converted into an
//! [`AcquisitionOutcome`](crate::types::AcquisitionOutcome) and a report row.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for media-acquire operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-acquire
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "case_id")
        key: Option<String>,
    },

    /// Fetch engine failure (network, extraction, missing stream)
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Audit report failure
    #[error("report error: {0}")]
    Report(#[from] ReportError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The run was cancelled before this operation completed
    #[error("run cancelled")]
    Cancelled,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Machine-readable failure category
    ///
    /// Integrity failures are not errors (a hash mismatch is a terminal outcome),
    /// so `integrity_failure` is only produced by
    /// [`OutcomeStatus::category`](crate::types::OutcomeStatus::category).
    pub fn category(&self) -> &'static str {
        match self {
            Error::Config { .. } => "configuration_error",
            Error::Fetch(FetchError::Thumbnail(_)) => "auxiliary_failure",
            Error::Fetch(_) => "fetch_failure",
            Error::Report(_) => "report_write_failure",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Cancelled => "cancelled",
            Error::Other(_) => "internal_error",
        }
    }
}

/// Errors raised by a [`FetchEngine`](crate::engine::FetchEngine)
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network failure while talking to the remote host
    #[error("network error: {0}")]
    Network(String),

    /// The engine could not extract media information from the URL
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// The URL resolved, but no downloadable stream matched the format policy
    #[error("no downloadable stream: {0}")]
    NoStream(String),

    /// The engine's external binary could not be found or started
    #[error("fetch engine unavailable: {0}")]
    ToolMissing(String),

    /// Thumbnail retrieval failed (auxiliary, never fatal to a job)
    #[error("thumbnail fetch failed: {0}")]
    Thumbnail(String),

    /// The fetch was interrupted by run cancellation
    #[error("run cancelled")]
    Cancelled,

    /// Local I/O failure inside the engine
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// Classify a raw engine error line into a fetch error variant
    ///
    /// yt-dlp reports everything on stderr as `ERROR: ...`; the wording is the
    /// only signal available for telling network failures from extraction ones.
    pub fn classify(message: &str) -> Self {
        let message = message.trim();
        let text = message.strip_prefix("ERROR:").unwrap_or(message).trim();
        let lower = text.to_ascii_lowercase();

        if lower.contains("requested format is not available")
            || lower.contains("no video formats found")
        {
            FetchError::NoStream(text.to_string())
        } else if lower.contains("unable to download webpage")
            || lower.contains("connection")
            || lower.contains("timed out")
            || lower.contains("name or service not known")
            || lower.contains("temporary failure in name resolution")
        {
            FetchError::Network(text.to_string())
        } else {
            FetchError::Extraction(text.to_string())
        }
    }
}

/// Errors raised by the [`ReportWriter`](crate::report::ReportWriter)
#[derive(Debug, Error)]
pub enum ReportError {
    /// The report has already been closed; nothing may be appended
    #[error("report {path} is already closed")]
    Closed {
        /// Report file path
        path: PathBuf,
    },

    /// Writing to the report file failed
    #[error("failed to write report {path}: {source}")]
    Write {
        /// Report file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
