//! Parser for yt-dlp process output
//!
//! The engine is invoked with a progress template and an `after_move` print
//! template that prefix their lines with fixed markers, so the two interesting
//! kinds of line can be picked out of ordinary log output.

use serde::Deserialize;
use std::path::PathBuf;

use super::traits::{FetchMetadata, FetchStatus};
use crate::error::FetchError;

/// Prefix of progress lines
pub(crate) const PROGRESS_MARKER: &str = "ACQ_PROGRESS";

/// Prefix of the metadata line printed after the final move
pub(crate) const META_MARKER: &str = "ACQ_META";

/// `--progress-template` argument producing [`PROGRESS_MARKER`] lines
pub(crate) const PROGRESS_TEMPLATE: &str =
    "download:ACQ_PROGRESS|%(progress.status)s|%(progress._percent_str)s";

/// `--print` argument producing the [`META_MARKER`] line
pub(crate) const META_TEMPLATE: &str = "after_move:ACQ_META %(.{id,title,thumbnail,filepath})j";

/// One classified output line
#[derive(Debug, PartialEq)]
pub(crate) enum OutputLine {
    /// Progress callback
    Progress {
        status: FetchStatus,
        percent: String,
    },
    /// Resolved metadata of the finished artifact
    Metadata(RawMetadata),
    /// An `ERROR:` line
    Error(String),
    /// Anything else
    Other,
}

/// Metadata as printed by the engine
#[derive(Debug, Default, PartialEq, Deserialize)]
pub(crate) struct RawMetadata {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    thumbnail: Option<String>,
    #[serde(default)]
    filepath: Option<PathBuf>,
}

/// Classify one line of engine output
pub(crate) fn parse_line(line: &str) -> OutputLine {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(rest) = line.strip_prefix(PROGRESS_MARKER) {
        let mut fields = rest.trim_start_matches('|').splitn(2, '|');
        let status = FetchStatus::parse(fields.next().unwrap_or_default());
        let percent = fields.next().unwrap_or_default().to_string();
        return OutputLine::Progress { status, percent };
    }

    if let Some(rest) = line.strip_prefix(META_MARKER) {
        return match serde_json::from_str::<RawMetadata>(rest.trim()) {
            Ok(meta) => OutputLine::Metadata(meta),
            Err(e) => {
                tracing::debug!(error = %e, line = %line, "unparsable metadata line");
                OutputLine::Other
            }
        };
    }

    if line.trim_start().starts_with("ERROR:") {
        return OutputLine::Error(line.trim().to_string());
    }

    OutputLine::Other
}

/// Accumulates the parts of the output needed to decide a fetch result
#[derive(Debug, Default)]
pub(crate) struct OutputCollector {
    metadata: Option<RawMetadata>,
    last_error: Option<String>,
    last_stderr: Option<String>,
}

impl OutputCollector {
    /// Record a metadata line
    pub(crate) fn metadata(&mut self, meta: RawMetadata) {
        self.metadata = Some(meta);
    }

    /// Record an `ERROR:` line
    pub(crate) fn error(&mut self, line: String) {
        self.last_error = Some(line);
    }

    /// Record a non-empty stderr line
    pub(crate) fn stderr(&mut self, line: &str) {
        let line = line.trim();
        if !line.is_empty() {
            self.last_stderr = Some(line.to_string());
        }
    }

    /// Decide the fetch result once the process has exited
    pub(crate) fn finish(self, success: bool) -> Result<FetchMetadata, FetchError> {
        if !success {
            let message = self
                .last_error
                .or(self.last_stderr)
                .unwrap_or_else(|| "yt-dlp exited with an error".to_string());
            return Err(FetchError::classify(&message));
        }

        let meta = self.metadata.ok_or_else(|| {
            FetchError::Extraction("engine finished without reporting the output file".into())
        })?;
        let temp_path = meta.filepath.ok_or_else(|| {
            FetchError::Extraction("engine did not report the output file path".into())
        })?;

        let id = match meta.id {
            Some(serde_json::Value::String(id)) => id,
            Some(serde_json::Value::Null) | None => "unknownid".to_string(),
            Some(other) => other.to_string(),
        };

        Ok(FetchMetadata {
            id,
            title: meta.title.unwrap_or_else(|| "Unknown".to_string()),
            thumbnail_url: meta.thumbnail.filter(|t| !t.is_empty()),
            temp_path,
        })
    }
}
