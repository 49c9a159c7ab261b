//! Traits and types for the fetch engine collaborator

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::config::ToolsConfig;
use crate::error::FetchError;

/// Status tag attached to a progress callback
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchStatus {
    /// Bytes are being transferred
    Downloading,
    /// Transfer complete; the engine may now merge streams
    Finished,
    /// Any other engine status (e.g. `error`), ignored by the pipeline
    Other,
}

impl FetchStatus {
    /// Parse an engine status string
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "downloading" => FetchStatus::Downloading,
            "finished" => FetchStatus::Finished,
            _ => FetchStatus::Other,
        }
    }
}

/// Receiver of `(status, percent)` progress tuples
///
/// The percent is passed through as the engine's raw string, which may be
/// padded, colored, or `N/A`.
pub trait ProgressSink: Send + Sync {
    /// Called zero or more times during a fetch
    fn on_progress(&self, status: FetchStatus, percent: &str);
}

/// Progress sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn on_progress(&self, _status: FetchStatus, _percent: &str) {}
}

/// External merge tool as discovered for a run
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeTool {
    /// Explicitly configured location (passed to the engine)
    Bundled(PathBuf),
    /// Found on `PATH`; the engine finds it on its own
    OnPath(PathBuf),
    /// No merge tool available
    Unavailable,
}

impl MergeTool {
    /// Discover the merge tool from configuration and `PATH`
    pub fn discover(tools: &ToolsConfig) -> Self {
        if let Some(path) = &tools.ffmpeg_path {
            if path.exists() {
                return MergeTool::Bundled(path.clone());
            }
            tracing::warn!(path = %path.display(), "configured ffmpeg path does not exist");
        }
        if tools.search_path
            && let Ok(path) = which::which("ffmpeg")
        {
            return MergeTool::OnPath(path);
        }
        MergeTool::Unavailable
    }

    /// Whether separate streams can be merged
    pub fn is_available(&self) -> bool {
        !matches!(self, MergeTool::Unavailable)
    }

    /// Location to hand to the engine explicitly, if any
    pub fn location(&self) -> Option<&Path> {
        match self {
            MergeTool::Bundled(path) => Some(path),
            MergeTool::OnPath(_) | MergeTool::Unavailable => None,
        }
    }
}

/// Stream selection policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormatPolicy {
    /// Best single pre-merged stream
    BestSingle,
    /// Best video plus best audio, merged; best single stream as fallback
    BestMerged,
}

impl FormatPolicy {
    /// yt-dlp format selector for this policy
    pub fn selector(&self) -> &'static str {
        match self {
            FormatPolicy::BestSingle => "best",
            FormatPolicy::BestMerged => "bestvideo+bestaudio/best",
        }
    }
}

/// Per-run options handed to every fetch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchOptions {
    /// Stream selection policy
    pub format: FormatPolicy,
    /// Output container for merged streams
    pub merge_output_format: Option<String>,
    /// Explicit merge tool location
    pub merge_tool_location: Option<PathBuf>,
}

impl FetchOptions {
    /// Choose options from the merge tool capability
    pub fn for_merge_tool(tool: &MergeTool, merge_output_format: &str) -> Self {
        if tool.is_available() {
            Self {
                format: FormatPolicy::BestMerged,
                merge_output_format: Some(merge_output_format.to_string()),
                merge_tool_location: tool.location().map(Path::to_path_buf),
            }
        } else {
            Self {
                format: FormatPolicy::BestSingle,
                merge_output_format: None,
                merge_tool_location: None,
            }
        }
    }
}

/// Metadata resolved by a successful fetch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchMetadata {
    /// Engine resource id
    pub id: String,
    /// Resource title
    pub title: String,
    /// Thumbnail URL, if the source has one
    pub thumbnail_url: Option<String>,
    /// Where the engine left the artifact
    pub temp_path: PathBuf,
}

/// Capabilities of a fetch engine implementation
#[derive(Debug, Clone, Copy)]
pub struct EngineCapabilities {
    /// Can retrieve thumbnails
    pub can_fetch_thumbnail: bool,
}

/// Trait for the fetch engine collaborator
///
/// A fetch engine resolves a URL to downloadable media and retrieves it into
/// a local file. Stream selection and merging are the engine's business; the
/// pipeline only picks a [`FormatPolicy`] and consumes progress.
///
/// # Examples
///
/// ```no_run
/// use media_acquire::engine::{FetchEngine, FetchOptions, NullProgress, YtDlpEngine};
/// use media_acquire::config::ToolsConfig;
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = YtDlpEngine::from_config(&ToolsConfig::default(), std::time::Duration::from_secs(15))
///     .expect("yt-dlp not found");
/// let options = FetchOptions::for_merge_tool(&engine.merge_tool(), "mp4");
/// let meta = engine
///     .fetch(
///         "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
///         Path::new("/tmp/%(title)s.%(ext)s"),
///         &options,
///         &NullProgress,
///     )
///     .await?;
/// println!("saved {} to {}", meta.title, meta.temp_path.display());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait FetchEngine: Send + Sync {
    /// Retrieve the primary artifact of `url`
    ///
    /// `output_template` uses `%(title)s` / `%(ext)s` placeholders. `progress`
    /// receives zero or more `(status, percent)` callbacks.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] for network, extraction, or missing-stream
    /// failures, and [`FetchError::ToolMissing`] when the engine cannot run.
    async fn fetch(
        &self,
        url: &str,
        output_template: &Path,
        options: &FetchOptions,
        progress: &dyn ProgressSink,
    ) -> Result<FetchMetadata, FetchError>;

    /// Retrieve a thumbnail into `dest`
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Thumbnail`] on any failure.
    async fn fetch_thumbnail(&self, thumbnail_url: &str, dest: &Path) -> Result<(), FetchError>;

    /// Merge tool available to this engine, consulted once per run
    fn merge_tool(&self) -> MergeTool;

    /// Query capabilities of this engine
    ///
    /// Jobs skip [`fetch_thumbnail`](Self::fetch_thumbnail) when
    /// `can_fetch_thumbnail` is false.
    fn capabilities(&self) -> EngineCapabilities;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// Expand `%(title)s` and `%(ext)s` in an output template
///
/// Path separators in the title are replaced so the result stays inside the
/// template's directory.
pub fn render_template(template: &Path, title: &str, ext: &str) -> PathBuf {
    let safe_title: String = title
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    let file_name = template
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "%(title)s.%(ext)s".to_string())
        .replace("%(title)s", &safe_title)
        .replace("%(ext)s", ext);
    match template.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}
