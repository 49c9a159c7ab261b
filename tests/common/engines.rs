//! Stub fetch engines and relocators

use async_trait::async_trait;
use media_acquire::engine::render_template;
use media_acquire::{
    EngineCapabilities, FetchEngine, FetchError, FetchMetadata, FetchOptions, FetchStatus,
    FsRelocator, MergeTool, ProgressSink, Relocator,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Resource id the stub derives from a URL (its last path segment)
pub fn resource_id(url: &str) -> String {
    url.rsplit('/').next().unwrap_or("unknown").to_string()
}

/// Bytes the stub writes for a URL
///
/// Larger than one hashing block so digests cover several reads.
pub fn artifact_bytes(url: &str) -> Vec<u8> {
    url.as_bytes().iter().copied().cycle().take(20_000).collect()
}

/// Configurable deterministic fetch engine
///
/// Writes [`artifact_bytes`] for every URL, reports a short progress
/// sequence, and tracks how many jobs are active at once. A job counts as
/// active from the start of its fetch until the fetch ends, or, with
/// [`StubEngine::holding_until_relocated`], until a [`TrackingRelocator`]
/// has moved its artifact.
#[derive(Default)]
pub struct StubEngine {
    delay: Duration,
    fail_urls: HashSet<String>,
    panic_urls: HashSet<String>,
    fail_thumbnails: bool,
    title: Option<String>,
    hold_until_relocated: bool,
    merge_tool: Option<MergeTool>,
    active: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
    options_seen: Mutex<Vec<FetchOptions>>,
}

impl StubEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold each fetch for `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the fetch of `url` with an extraction error
    pub fn failing(mut self, url: &str) -> Self {
        self.fail_urls.insert(url.to_string());
        self
    }

    /// Panic inside the fetch of `url`
    pub fn panicking(mut self, url: &str) -> Self {
        self.panic_urls.insert(url.to_string());
        self
    }

    /// Fail every thumbnail retrieval
    pub fn without_thumbnails(mut self) -> Self {
        self.fail_thumbnails = true;
        self
    }

    /// Resolve every URL to the same title
    pub fn titled(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// Keep a job counted as active until [`StubEngine::release`]
    pub fn holding_until_relocated(mut self) -> Self {
        self.hold_until_relocated = true;
        self
    }

    /// Mark one job as no longer active
    pub fn release(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Report a merge tool capability
    pub fn with_merge_tool(mut self, tool: MergeTool) -> Self {
        self.merge_tool = Some(tool);
        self
    }

    /// Largest number of fetches observed in flight at once
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Number of fetches started
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Options passed to each fetch
    pub fn options_seen(&self) -> Vec<FetchOptions> {
        self.options_seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl FetchEngine for StubEngine {
    async fn fetch(
        &self,
        url: &str,
        output_template: &Path,
        options: &FetchOptions,
        progress: &dyn ProgressSink,
    ) -> Result<FetchMetadata, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.options_seen.lock().unwrap().push(options.clone());
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        progress.on_progress(FetchStatus::Downloading, "  0.0%");
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        progress.on_progress(FetchStatus::Downloading, " 50.0%");
        progress.on_progress(FetchStatus::Downloading, "N/A");
        progress.on_progress(FetchStatus::Finished, "100.0%");

        let succeeds = !self.panic_urls.contains(url) && !self.fail_urls.contains(url);
        if !(self.hold_until_relocated && succeeds) {
            self.release();
        }

        if self.panic_urls.contains(url) {
            panic!("stub engine exploded on {url}");
        }
        if self.fail_urls.contains(url) {
            return Err(FetchError::classify(&format!(
                "ERROR: [generic] {}: Unsupported URL",
                resource_id(url)
            )));
        }

        let id = resource_id(url);
        let title = self.title.clone().unwrap_or_else(|| id.clone());
        let temp_path = render_template(output_template, &title, "mp4");
        if let Some(parent) = temp_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&temp_path, artifact_bytes(url)).await?;

        Ok(FetchMetadata {
            title,
            thumbnail_url: Some(format!("https://img.example.com/{id}.jpg")),
            id,
            temp_path,
        })
    }

    async fn fetch_thumbnail(&self, thumbnail_url: &str, dest: &Path) -> Result<(), FetchError> {
        if self.fail_thumbnails {
            return Err(FetchError::Thumbnail(format!("HTTP 404 for {thumbnail_url}")));
        }
        tokio::fs::write(dest, format!("thumbnail {thumbnail_url}"))
            .await
            .map_err(|e| FetchError::Thumbnail(e.to_string()))
    }

    fn merge_tool(&self) -> MergeTool {
        self.merge_tool.clone().unwrap_or(MergeTool::Unavailable)
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            can_fetch_thumbnail: true,
        }
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Relocator that lingers after each move, then releases the job in the
/// engine's active count
pub struct TrackingRelocator {
    engine: Arc<StubEngine>,
    linger: Duration,
}

impl TrackingRelocator {
    pub fn new(engine: Arc<StubEngine>, linger: Duration) -> Self {
        Self { engine, linger }
    }
}

#[async_trait]
impl Relocator for TrackingRelocator {
    async fn relocate(&self, from: &Path, to: &Path) -> media_acquire::Result<PathBuf> {
        let moved = FsRelocator.relocate(from, to).await;
        tokio::time::sleep(self.linger).await;
        self.engine.release();
        moved
    }

    fn name(&self) -> &'static str {
        "tracking"
    }
}

/// Relocator that damages the artifact after moving it
pub struct CorruptingRelocator;

#[async_trait]
impl Relocator for CorruptingRelocator {
    async fn relocate(&self, from: &Path, to: &Path) -> media_acquire::Result<PathBuf> {
        let moved = FsRelocator.relocate(from, to).await?;
        let mut bytes = tokio::fs::read(&moved).await?;
        bytes.push(0xff);
        tokio::fs::write(&moved, bytes).await?;
        Ok(moved)
    }

    fn name(&self) -> &'static str {
        "corrupting"
    }
}

/// Relocator that always fails
pub struct FailingRelocator;

#[async_trait]
impl Relocator for FailingRelocator {
    async fn relocate(&self, _from: &Path, _to: &Path) -> media_acquire::Result<PathBuf> {
        Err(media_acquire::Error::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "destination is read-only",
        )))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}
