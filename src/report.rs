//! Append-only HTML audit report
//!
//! The report has a fixed lifecycle: [`ReportWriter::open`] writes the header,
//! [`ReportWriter::append`] adds one table row per settled job, and
//! [`ReportWriter::close`] writes the footer. The document is only well-formed
//! once closed.
//!
//! Every physical write happens while holding one mutex, so rows appended by
//! concurrent jobs never interleave.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::ReportError;
use crate::types::{AcquisitionOutcome, JobResult, OutcomeStatus};
use crate::utils::{escape_html, relative_href};
use crate::verification::SourceVerification;

/// Timestamp format used throughout the report
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%SZ";

/// Placeholder for values that are not available
const NOT_AVAILABLE: &str = "N/A";

/// Title used when the engine never reported one
const UNKNOWN_TITLE: &str = "UNKNOWN_TITLE";

/// Format a UTC timestamp the way the report does
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

/// One report row
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportRecord {
    /// When the job settled
    pub timestamp: DateTime<Utc>,
    /// Thumbnail href relative to the report, if a thumbnail was saved
    pub thumbnail_ref: Option<String>,
    /// Artifact title
    pub title: String,
    /// Artifact href relative to the report, if an artifact exists
    pub artifact_ref: Option<String>,
    /// Artifact file name, if an artifact exists
    pub artifact_name: Option<String>,
    /// Source URL
    pub url: String,
    /// Status tag
    pub status: OutcomeStatus,
    /// Content hash, or the error text for failures
    pub detail: String,
    /// Thumbnail hash, if available
    pub thumbnail_hash: Option<String>,
}

impl ReportRecord {
    /// Build the row for a settled job; hrefs are made relative to `report_dir`
    pub fn from_result(result: &JobResult, report_dir: &Path) -> Self {
        let artifact = result.outcome.final_path();
        let (detail, thumbnail_hash) = match &result.outcome {
            AcquisitionOutcome::Verified {
                content_hash,
                thumbnail_hash,
                ..
            } => (
                content_hash.to_string(),
                thumbnail_hash.as_ref().map(ToString::to_string),
            ),
            AcquisitionOutcome::HashMismatch {
                hash_before,
                hash_after,
                thumbnail_hash,
                ..
            } => (
                format!("{} (before move: {})", hash_after, hash_before),
                thumbnail_hash.as_ref().map(ToString::to_string),
            ),
            AcquisitionOutcome::Failed { error } => (error.clone(), None),
        };

        Self {
            timestamp: result.completed_at,
            thumbnail_ref: result
                .thumbnail
                .as_deref()
                .map(|p| relative_href(p, report_dir)),
            title: result
                .title
                .clone()
                .unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            artifact_ref: artifact.map(|p| relative_href(p, report_dir)),
            artifact_name: artifact
                .and_then(Path::file_name)
                .map(|n| n.to_string_lossy().into_owned()),
            url: result.url.clone(),
            status: result.outcome.status(),
            detail,
            thumbnail_hash,
        }
    }

    /// Render the row as an HTML table row
    pub fn render(&self) -> String {
        let css_class = match self.status {
            OutcomeStatus::Verified => "verified",
            OutcomeStatus::HashMismatch | OutcomeStatus::Failed => "failed",
        };

        let thumbnail = match &self.thumbnail_ref {
            Some(href) => format!(r#"<img src="{}" width="160">"#, escape_html(href)),
            None => NOT_AVAILABLE.to_string(),
        };

        let title = match (&self.artifact_ref, &self.artifact_name) {
            (Some(href), Some(name)) => format!(
                r#"<a href="{}" target="_blank">{}</a><div class="small">({})</div>"#,
                escape_html(href),
                escape_html(&self.title),
                escape_html(name)
            ),
            _ => escape_html(&self.title),
        };

        let url = escape_html(&self.url);
        let detail_class = match self.status {
            OutcomeStatus::Failed => "error",
            _ => "hash",
        };

        format!(
            r#"
<tr>
<td>{timestamp}</td>
<td>{thumbnail}</td>
<td>{title}</td>
<td><a href="{url}" target="_blank">{url}</a></td>
<td class="{css_class}">{status}</td>
<td class="{detail_class}">{detail}</td>
<td class="hash">{thumbnail_hash}</td>
</tr>
"#,
            timestamp = format_timestamp(&self.timestamp),
            status = self.status.tag(),
            detail = escape_html(&self.detail),
            thumbnail_hash = escape_html(self.thumbnail_hash.as_deref().unwrap_or(NOT_AVAILABLE)),
        )
    }
}

/// Render the document header
fn render_header(case_id: &str, started_at: &DateTime<Utc>, source: &SourceVerification) -> String {
    let case_id = escape_html(case_id);
    let [(endpoint_1, ip_1), (endpoint_2, ip_2)] = source.pairs();
    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="UTF-8">
<title>Case Report - {case_id}</title>
<style>
body {{ font-family: Arial; background:#111; color:#eee; padding:20px; }}
table {{ width:100%; border-collapse:collapse; background:#1b1b1b; }}
th, td {{ border:1px solid #333; padding:8px; vertical-align:top; }}
th {{ background:#e53935; color:white; }}
a {{ color:#ffd166; }}
.verified {{ color:#66ff99; font-weight:bold; }}
.failed {{ color:#ff5c5c; font-weight:bold; }}
.hash {{ font-family:monospace; font-size:12px; word-break:break-all; }}
.error {{ font-size:12px; word-break:break-word; }}
.meta {{ margin-bottom:20px; padding:12px; background:#1b1b1b; border:1px solid #333; border-radius:8px; }}
.small {{ color:#bdbdbd; font-size:12px; }}
</style>
</head>
<body>
<h1>Bulk Media Acquisition Report</h1>

<div class="meta">
<strong>Case:</strong> {case_id}<br>
<strong>Start (UTC):</strong> {started}<br>
<strong>Public IP by {endpoint_1}:</strong> {ip_1}<br>
<strong>Public IP by {endpoint_2}:</strong> {ip_2}<br>
<strong>IP Verification:</strong> {status}
</div>

<table>
<tr>
<th>Timestamp (UTC)</th>
<th>Thumbnail</th>
<th>Video Title</th>
<th>Source URL</th>
<th>Status</th>
<th>Video SHA256</th>
<th>Thumbnail SHA256</th>
</tr>
"#,
        started = format_timestamp(started_at),
        endpoint_1 = escape_html(endpoint_1),
        ip_1 = escape_html(ip_1),
        endpoint_2 = escape_html(endpoint_2),
        ip_2 = escape_html(ip_2),
        status = source.status.tag(),
    )
}

fn render_footer(ended_at: &DateTime<Utc>) -> String {
    format!(
        r#"
</table>
<br><br>
<strong>End (UTC):</strong> {}
</body>
</html>
"#,
        format_timestamp(ended_at)
    )
}

struct ReportState {
    /// `None` once the report is closed
    file: Option<tokio::fs::File>,
    rows: usize,
}

/// Append-only audit report sink shared by all jobs of a run
pub struct ReportWriter {
    path: PathBuf,
    state: Mutex<ReportState>,
}

impl ReportWriter {
    /// Create (or truncate) the report and write its header
    pub async fn open(
        path: &Path,
        case_id: &str,
        source: &SourceVerification,
    ) -> Result<Self, ReportError> {
        let write_err = |source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut file = tokio::fs::File::create(path).await.map_err(write_err)?;
        let header = render_header(case_id, &Utc::now(), source);
        file.write_all(header.as_bytes()).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;

        tracing::debug!(report = %path.display(), case = %case_id, "report opened");

        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(ReportState {
                file: Some(file),
                rows: 0,
            }),
        })
    }

    /// Report file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory hrefs in the report are relative to
    pub fn base_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    /// Append one row
    ///
    /// Safe to call concurrently; the whole row is written and flushed while
    /// the report lock is held. Fails with [`ReportError::Closed`] after
    /// [`close`](Self::close).
    pub async fn append(&self, record: &ReportRecord) -> Result<(), ReportError> {
        let row = record.render();
        let mut state = self.state.lock().await;
        let file = state.file.as_mut().ok_or_else(|| ReportError::Closed {
            path: self.path.clone(),
        })?;

        let result = async {
            file.write_all(row.as_bytes()).await?;
            file.flush().await
        }
        .await;
        result.map_err(|source| ReportError::Write {
            path: self.path.clone(),
            source,
        })?;

        state.rows += 1;
        Ok(())
    }

    /// Write the footer and close the report
    ///
    /// Only the first call writes anything; later calls fail with
    /// [`ReportError::Closed`].
    pub async fn close(&self) -> Result<(), ReportError> {
        let mut state = self.state.lock().await;
        let mut file = state.file.take().ok_or_else(|| ReportError::Closed {
            path: self.path.clone(),
        })?;

        let footer = render_footer(&Utc::now());
        let result = async {
            file.write_all(footer.as_bytes()).await?;
            file.flush().await?;
            file.sync_all().await
        }
        .await;
        result.map_err(|source| ReportError::Write {
            path: self.path.clone(),
            source,
        })?;

        tracing::debug!(report = %self.path.display(), rows = state.rows, "report closed");
        Ok(())
    }

    /// Whether [`close`](Self::close) has been called
    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.file.is_none()
    }

    /// Number of rows appended so far
    pub async fn rows_written(&self) -> usize {
        self.state.lock().await.rows
    }
}
