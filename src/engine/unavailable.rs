//! Fetch engine used when no engine binary is available

use async_trait::async_trait;
use std::path::Path;

use super::traits::{
    EngineCapabilities, FetchEngine, FetchMetadata, FetchOptions, MergeTool, ProgressSink,
};
use crate::error::FetchError;

/// Fetch engine that fails every request with [`FetchError::ToolMissing`]
///
/// Lets a run proceed without `yt-dlp`: every URL ends as a recorded
/// failure and the report is still produced.
///
/// # Examples
///
/// ```
/// use media_acquire::engine::{FetchEngine, UnavailableEngine};
///
/// let engine = UnavailableEngine;
/// assert!(!engine.capabilities().can_fetch_thumbnail);
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableEngine;

#[async_trait]
impl FetchEngine for UnavailableEngine {
    async fn fetch(
        &self,
        _url: &str,
        _output_template: &Path,
        _options: &FetchOptions,
        _progress: &dyn ProgressSink,
    ) -> Result<FetchMetadata, FetchError> {
        Err(FetchError::ToolMissing(
            "fetching requires the yt-dlp binary. \
             Configure tools.yt_dlp_path or ensure yt-dlp is in PATH."
                .into(),
        ))
    }

    async fn fetch_thumbnail(&self, _thumbnail_url: &str, _dest: &Path) -> Result<(), FetchError> {
        Err(FetchError::Thumbnail("no fetch engine available".into()))
    }

    fn merge_tool(&self) -> MergeTool {
        MergeTool::Unavailable
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            can_fetch_thumbnail: false,
        }
    }

    fn name(&self) -> &'static str {
        "unavailable"
    }
}
