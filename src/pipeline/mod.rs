//! Acquisition pipeline
//!
//! Split into focused submodules:
//! - [`job`] - Per-URL state machine (fetch, hash, relocate, verify)
//! - [`scheduler`] - Bounded worker pool, settling, finalize-once
//! - [`session`] - Aggregate run counters
//!
//! [`Acquirer`] is the entry point. It validates the configuration, creates
//! the case layout, verifies the source address, opens the report, and then
//! hands the URLs to the scheduler on a background task. The returned
//! [`RunHandle`] carries the event stream and cancellation.
//!
//! ```no_run
//! use media_acquire::{Acquirer, Config, Event};
//!
//! # #[tokio::main]
//! # async fn main() -> media_acquire::Result<()> {
//! let acquirer = Acquirer::new(Config::new("CASE007", "/cases"));
//! let mut run = acquirer
//!     .start(vec!["https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string()])
//!     .await?;
//!
//! while let Some(event) = run.events().recv().await {
//!     if let Event::Finished { report_path, .. } = event {
//!         println!("report at {}", report_path.display());
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod job;
mod scheduler;
mod session;

pub use job::MERGING_PERCENT;
pub use session::RunSession;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::engine::{FetchEngine, UnavailableEngine, YtDlpEngine};
use crate::error::{Error, Result};
use crate::relocate::{FsRelocator, Relocator};
use crate::report::ReportWriter;
use crate::types::{CaseLayout, Event, RunSummary};
use crate::verification::verify_source;
use scheduler::Scheduler;

/// Orchestrates acquisition runs for one configuration
#[derive(Clone)]
pub struct Acquirer {
    config: Arc<Config>,
    engine: Arc<dyn FetchEngine>,
    relocator: Arc<dyn Relocator>,
}

impl Acquirer {
    /// Create an acquirer with the default collaborators
    ///
    /// Uses [`YtDlpEngine`] when a `yt-dlp` binary can be found and
    /// [`UnavailableEngine`] otherwise.
    pub fn new(config: Config) -> Self {
        let engine: Arc<dyn FetchEngine> =
            match YtDlpEngine::from_config(&config.tools, config.network.thumbnail_timeout) {
                Some(engine) => {
                    tracing::debug!(binary = %engine.binary_path().display(), "using yt-dlp engine");
                    Arc::new(engine)
                }
                None => {
                    tracing::warn!("yt-dlp not found, every acquisition will fail");
                    Arc::new(UnavailableEngine)
                }
            };
        Self::with_engine(config, engine)
    }

    /// Create an acquirer with a specific fetch engine
    pub fn with_engine(config: Config, engine: Arc<dyn FetchEngine>) -> Self {
        Self {
            config: Arc::new(config),
            engine,
            relocator: Arc::new(FsRelocator),
        }
    }

    /// Replace the relocation step
    pub fn relocator(mut self, relocator: Arc<dyn Relocator>) -> Self {
        self.relocator = relocator;
        self
    }

    /// Configuration of this acquirer
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Fetch engine of this acquirer
    pub fn engine(&self) -> &Arc<dyn FetchEngine> {
        &self.engine
    }

    /// Start a run in the background
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for invalid input, in which case nothing has
    /// been created on disk, and an I/O or report error if the case layout or
    /// report cannot be created. Per-URL failures never surface here.
    pub async fn start(&self, urls: Vec<String>) -> Result<RunHandle> {
        self.config.validate(&urls)?;

        let layout = Arc::new(CaseLayout::from_config(&self.config));
        layout.create().await?;

        let source = verify_source(&self.config.network).await;
        let report = ReportWriter::open(&layout.report_path, &layout.case_id, &source).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let scheduler = Scheduler {
            layout: Arc::clone(&layout),
            engine: Arc::clone(&self.engine),
            relocator: Arc::clone(&self.relocator),
            report: Arc::new(report),
            events: tx,
            cancel: cancel.clone(),
            concurrency: self.config.effective_concurrency(),
            merge_output_format: self.config.tools.merge_output_format.clone(),
        };

        let task = tokio::spawn(scheduler.run(urls));

        Ok(RunHandle {
            events: rx,
            cancel,
            task,
            report_path: layout.report_path.clone(),
        })
    }

    /// Run to completion, discarding events
    pub async fn run(&self, urls: Vec<String>) -> Result<RunSummary> {
        self.start(urls).await?.wait().await
    }
}

/// Handle to a run in progress
pub struct RunHandle {
    events: mpsc::UnboundedReceiver<Event>,
    cancel: CancellationToken,
    task: JoinHandle<RunSummary>,
    report_path: PathBuf,
}

impl RunHandle {
    /// Lifecycle events; the channel closes after `Finished`
    pub fn events(&mut self) -> &mut mpsc::UnboundedReceiver<Event> {
        &mut self.events
    }

    /// Consume the handle as an event stream
    ///
    /// The run keeps going in the background; the stream ends after
    /// `Finished`.
    pub fn into_stream(self) -> UnboundedReceiverStream<Event> {
        UnboundedReceiverStream::new(self.events)
    }

    /// Stop dispatching new jobs and interrupt running fetches
    ///
    /// Affected URLs end as failed with a report row; the report is still
    /// closed once everything has settled.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this run when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Report path of this run
    pub fn report_path(&self) -> &Path {
        &self.report_path
    }

    /// Wait for every job to settle and the report to close
    pub async fn wait(self) -> Result<RunSummary> {
        self.task
            .await
            .map_err(|e| Error::Other(format!("run task failed: {}", e)))
    }
}
