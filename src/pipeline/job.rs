//! One acquisition job: fetch, hash, relocate, verify
//!
//! A job walks `Pending → Fetching → Relocating → Verifying` and ends in
//! exactly one terminal state. Every error is caught here and turned into a
//! `Failed` outcome; nothing propagates to the scheduler.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::engine::{FetchEngine, FetchMetadata, FetchOptions, FetchStatus, ProgressSink};
use crate::error::{Error, Result};
use crate::hashing::digest_async;
use crate::relocate::Relocator;
use crate::types::{AcquisitionOutcome, AcquisitionRequest, ContentHash, Event, JobResult, JobState};
use crate::utils::parse_percent;

/// Progress value announced when the engine starts merging
pub const MERGING_PERCENT: f32 = 99.0;

/// Translates engine progress callbacks into lifecycle events
struct EventProgress {
    url: String,
    events: UnboundedSender<Event>,
    merging: AtomicBool,
}

impl ProgressSink for EventProgress {
    fn on_progress(&self, status: FetchStatus, percent: &str) {
        // Nothing but the terminal event may follow Merging
        if self.merging.load(Ordering::Acquire) {
            return;
        }
        let event = match status {
            FetchStatus::Downloading => Event::Downloading {
                url: self.url.clone(),
                percent: parse_percent(percent),
            },
            FetchStatus::Finished => {
                if self.merging.swap(true, Ordering::AcqRel) {
                    return;
                }
                Event::Merging {
                    url: self.url.clone(),
                    percent: MERGING_PERCENT,
                }
            }
            FetchStatus::Other => return,
        };
        let _ = self.events.send(event);
    }
}

/// Shared collaborators of every job in a run
#[derive(Clone)]
pub(crate) struct JobContext {
    pub engine: Arc<dyn FetchEngine>,
    pub relocator: Arc<dyn Relocator>,
    pub options: Arc<FetchOptions>,
    pub events: UnboundedSender<Event>,
    pub cancel: CancellationToken,
}

/// A single URL's acquisition
pub(crate) struct AcquisitionJob {
    request: AcquisitionRequest,
    ctx: JobContext,
    state: JobState,
    title: Option<String>,
    thumbnail: Option<PathBuf>,
}

impl AcquisitionJob {
    pub(crate) fn new(request: AcquisitionRequest, ctx: JobContext) -> Self {
        Self {
            request,
            ctx,
            state: JobState::Pending,
            title: None,
            thumbnail: None,
        }
    }

    /// Run the job to its terminal outcome
    pub(crate) async fn run(mut self) -> JobResult {
        let outcome = match self.execute().await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(
                    url = %self.request.url,
                    state = ?self.state,
                    category = e.category(),
                    error = %e,
                    "acquisition failed"
                );
                AcquisitionOutcome::failed(e)
            }
        };
        self.transition(outcome.job_state());

        // Only succeeds once relocation emptied it
        let _ = tokio::fs::remove_dir(self.request.working_dir()).await;

        JobResult {
            url: self.request.url,
            title: self.title,
            thumbnail: self.thumbnail,
            outcome,
            completed_at: chrono::Utc::now(),
        }
    }

    fn transition(&mut self, next: JobState) {
        tracing::debug!(url = %self.request.url, from = ?self.state, to = ?next, "job state");
        self.state = next;
    }

    async fn execute(&mut self) -> Result<AcquisitionOutcome> {
        self.transition(JobState::Fetching);
        tokio::fs::create_dir_all(self.request.working_dir()).await?;
        let metadata = self.fetch().await?;
        self.title = Some(metadata.title.clone());

        let thumbnail_hash = self.fetch_thumbnail(&metadata).await;

        let hash_before = digest(&metadata.temp_path).await?;

        self.transition(JobState::Relocating);
        let layout = &self.request.layout;
        let final_path = self
            .ctx
            .relocator
            .relocate(&metadata.temp_path, &layout.final_path_for(&metadata.temp_path))
            .await?;

        self.transition(JobState::Verifying);
        let hash_after = digest(&final_path).await?;

        if hash_before == hash_after {
            tracing::info!(url = %self.request.url, hash = %hash_after, "artifact verified");
            Ok(AcquisitionOutcome::Verified {
                final_path,
                content_hash: hash_after,
                thumbnail_hash,
            })
        } else {
            tracing::warn!(
                url = %self.request.url,
                hash_before = %hash_before,
                hash_after = %hash_after,
                "artifact changed during relocation"
            );
            Ok(AcquisitionOutcome::HashMismatch {
                final_path,
                hash_before,
                hash_after,
                thumbnail_hash,
            })
        }
    }

    async fn fetch(&self) -> Result<FetchMetadata> {
        let url = &self.request.url;
        let template = self.request.output_template();
        let progress = EventProgress {
            url: url.clone(),
            events: self.ctx.events.clone(),
            merging: AtomicBool::new(false),
        };

        tokio::select! {
            biased;
            _ = self.ctx.cancel.cancelled() => Err(Error::Cancelled),
            result = self.ctx.engine.fetch(url, &template, &self.ctx.options, &progress) => {
                Ok(result?)
            }
        }
    }

    /// Best-effort thumbnail retrieval; failures only lose the thumbnail
    async fn fetch_thumbnail(&mut self, metadata: &FetchMetadata) -> Option<ContentHash> {
        let thumbnail_url = metadata.thumbnail_url.as_deref()?;
        if !self.ctx.engine.capabilities().can_fetch_thumbnail {
            tracing::debug!(url = %self.request.url, engine = self.ctx.engine.name(), "engine cannot fetch thumbnails");
            return None;
        }
        let dest = self.request.layout.thumbnail_path(&metadata.id);

        if let Err(e) = self.ctx.engine.fetch_thumbnail(thumbnail_url, &dest).await {
            tracing::warn!(url = %self.request.url, error = %e, "thumbnail unavailable");
            return None;
        }
        self.thumbnail = Some(dest.clone());

        match digest_async(dest).await {
            Ok(hash) => Some(hash),
            Err(e) => {
                tracing::warn!(url = %self.request.url, error = %e, "thumbnail could not be hashed");
                None
            }
        }
    }
}

async fn digest(path: &Path) -> Result<ContentHash> {
    Ok(digest_async(path.to_path_buf()).await?)
}
