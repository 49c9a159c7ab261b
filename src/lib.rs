//! # media-acquire
//!
//! Bulk media acquisition with forensic integrity checks.
//!
//! ## Design Philosophy
//!
//! media-acquire is designed to be:
//! - **Evidence-grade** - Every artifact is hashed before and after it is moved
//! - **Fault-contained** - One bad URL never affects its siblings or the report
//! - **Library-first** - The `acquire` binary is a thin shell over this crate
//! - **Event-driven** - Consumers observe a lifecycle event stream, no polling required
//!
//! For every URL the pipeline asks a [`FetchEngine`] to retrieve the primary
//! artifact and a thumbnail, hashes the artifact with SHA-256, moves it into
//! the case directory, hashes it again, and appends one row to an HTML audit
//! report. A run ends with exactly one [`Event::Finished`] naming the report.
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_acquire::{Acquirer, Config, Event};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::new("CASE007", "/cases");
//!     config.concurrency = 8;
//!
//!     let acquirer = Acquirer::new(config);
//!     let mut run = acquirer
//!         .start(vec![
//!             "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
//!             "https://www.youtube.com/watch?v=9bZkp7q19f0".to_string(),
//!         ])
//!         .await?;
//!
//!     while let Some(event) = run.events().recv().await {
//!         println!("Event: {:?}", event);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Fetch engine collaborator
pub mod engine;
/// Error types
pub mod error;
/// Streaming content hashing
pub mod hashing;
/// Acquisition pipeline (jobs, scheduler, orchestration)
pub mod pipeline;
/// Artifact relocation
pub mod relocate;
/// HTML audit report
pub mod report;
/// Persisted operator preferences
pub mod settings;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;
/// Source (egress address) verification
pub mod verification;

// Re-export commonly used types
pub use config::{Config, LayoutConfig, NetworkConfig, ToolsConfig};
pub use engine::{
    EngineCapabilities, FetchEngine, FetchMetadata, FetchOptions, FetchStatus, FormatPolicy,
    MergeTool, ProgressSink, UnavailableEngine, YtDlpEngine,
};
pub use error::{Error, FetchError, ReportError, Result};
pub use pipeline::{Acquirer, RunHandle, RunSession};
pub use relocate::{FsRelocator, Relocator};
pub use report::{ReportRecord, ReportWriter};
pub use settings::Settings;
pub use types::{
    AcquisitionOutcome, AcquisitionRequest, CaseLayout, ContentHash, Event, JobResult, JobState,
    OutcomeStatus, RunSummary,
};
pub use verification::{SourceVerification, VerificationStatus};

/// Cancel a run when the process receives a termination signal
///
/// Waits for a termination signal and then triggers `token`. Jobs that have
/// not started yet, and fetches in progress, end as failed; the report is
/// still closed.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use media_acquire::{Acquirer, Config, cancel_on_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let acquirer = Acquirer::new(Config::new("CASE001", "."));
///     let run = acquirer.start(vec!["https://example.com/clip".into()]).await?;
///
///     tokio::spawn(cancel_on_signal(run.cancellation_token()));
///     let summary = run.wait().await?;
///     println!("{} verified", summary.verified);
///     Ok(())
/// }
/// ```
pub async fn cancel_on_signal(token: tokio_util::sync::CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => {
            tracing::warn!("cancelling run");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => tracing::info!("received SIGTERM"),
                _ = sigint.recv() => tracing::info!("received SIGINT (Ctrl+C)"),
            }
        }
        (Err(e), Ok(mut sigint)) => {
            tracing::warn!(error = %e, "could not register SIGTERM handler, waiting for SIGINT only");
            sigint.recv().await;
            tracing::info!("received SIGINT (Ctrl+C)");
        }
        (Ok(mut sigterm), Err(e)) => {
            tracing::warn!(error = %e, "could not register SIGINT handler, waiting for SIGTERM only");
            sigterm.recv().await;
            tracing::info!("received SIGTERM");
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "could not register any signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received Ctrl+C"),
        Err(e) => tracing::error!(error = %e, "failed to listen for Ctrl+C"),
    }
}
