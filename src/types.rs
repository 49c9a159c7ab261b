//! Core types for media-acquire

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;

/// Hex-encoded SHA-256 digest of a file's contents
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Wrap an already hex-encoded digest
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into().to_ascii_lowercase())
    }

    /// The lowercase hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Filesystem layout of one case
///
/// ```text
/// <destination_root>/<case_id>/
///     <videos_dir>/<case_id>_<title>.<ext>
///     <thumbnails_dir>/<resource id>_thumbnail.jpg
///     <working_dir>/job-NNNN/   (one per job, emptied by relocation)
///     <case_id>_report.html
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaseLayout {
    /// Case identifier
    pub case_id: String,
    /// Case root directory
    pub root: PathBuf,
    /// Final home of primary artifacts
    pub videos_dir: PathBuf,
    /// Thumbnail directory
    pub thumbnails_dir: PathBuf,
    /// Directory the fetch engine writes into
    pub working_dir: PathBuf,
    /// Audit report path
    pub report_path: PathBuf,
}

impl CaseLayout {
    /// Derive the layout from a configuration
    pub fn from_config(config: &Config) -> Self {
        let root = config.destination_root.join(&config.case_id);
        Self {
            case_id: config.case_id.clone(),
            videos_dir: root.join(&config.layout.videos_dir),
            thumbnails_dir: root.join(&config.layout.thumbnails_dir),
            working_dir: root.join(&config.layout.working_dir),
            report_path: root.join(format!("{}_report.html", config.case_id)),
            root,
        }
    }

    /// Create every directory of the layout
    pub async fn create(&self) -> std::io::Result<()> {
        for dir in [&self.videos_dir, &self.thumbnails_dir, &self.working_dir] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    /// Private working directory of the job with the given sequence number
    ///
    /// Jobs whose sources share a title must never write the same temp file.
    pub fn job_dir(&self, sequence: usize) -> PathBuf {
        self.working_dir.join(format!("job-{:04}", sequence))
    }

    /// Output template handed to the fetch engine for one job
    ///
    /// Uses the engine's `%(field)s` placeholder syntax; artifacts are prefixed
    /// with the case id so cases sharing a destination root never collide.
    pub fn output_template(&self, sequence: usize) -> PathBuf {
        self.job_dir(sequence)
            .join(format!("{}_%(title)s.%(ext)s", self.case_id))
    }

    /// Where a thumbnail for the given engine resource id is stored
    pub fn thumbnail_path(&self, resource_id: &str) -> PathBuf {
        self.thumbnails_dir
            .join(format!("{}_thumbnail.jpg", sanitize_component(resource_id)))
    }

    /// Final location of an artifact currently at `temp_path`
    pub fn final_path_for(&self, temp_path: &Path) -> PathBuf {
        match temp_path.file_name() {
            Some(name) => self.videos_dir.join(name),
            None => self.videos_dir.join(format!("{}_artifact", self.case_id)),
        }
    }
}

/// Replace characters that would escape a single path component
fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "unknownid".to_string(),
        _ => cleaned,
    }
}

/// One URL to acquire; immutable for the lifetime of a run
#[derive(Clone, Debug)]
pub struct AcquisitionRequest {
    /// Position of the URL in the submitted list, unique within a run
    pub sequence: usize,
    /// Source URL
    pub url: String,
    /// Shared case layout (case id and destination directories)
    pub layout: Arc<CaseLayout>,
}

impl AcquisitionRequest {
    /// Create a request for a URL within a case
    pub fn new(sequence: usize, url: impl Into<String>, layout: Arc<CaseLayout>) -> Self {
        Self {
            sequence,
            url: url.into(),
            layout,
        }
    }

    /// Case identifier this request belongs to
    pub fn case_id(&self) -> &str {
        &self.layout.case_id
    }

    /// Working directory owned by this request
    pub fn working_dir(&self) -> PathBuf {
        self.layout.job_dir(self.sequence)
    }

    /// Engine output template inside this request's working directory
    pub fn output_template(&self) -> PathBuf {
        self.layout.output_template(self.sequence)
    }
}

/// States of a single acquisition job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Submitted, waiting for a worker slot
    Pending,
    /// Fetch engine is retrieving the artifact
    Fetching,
    /// Artifact is being moved to its final directory
    Relocating,
    /// Post-move hash is being computed
    Verifying,
    /// Hashes matched
    Verified,
    /// Hashes differed across relocation
    Mismatched,
    /// Operational failure
    Failed,
}

impl JobState {
    /// Whether no further transitions follow this state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Verified | JobState::Mismatched | JobState::Failed
        )
    }
}

/// Report status tag of a terminal outcome
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Hash before and after relocation matched
    Verified,
    /// Artifact exists but changed across relocation
    HashMismatch,
    /// No trustworthy artifact was produced
    Failed,
}

impl OutcomeStatus {
    /// Tag written into the report's status column
    pub fn tag(&self) -> &'static str {
        match self {
            OutcomeStatus::Verified => "VERIFIED",
            OutcomeStatus::HashMismatch => "HASH_MISMATCH",
            OutcomeStatus::Failed => "FAILED",
        }
    }

    /// Failure category, if any
    pub fn category(&self) -> Option<&'static str> {
        match self {
            OutcomeStatus::Verified => None,
            OutcomeStatus::HashMismatch => Some("integrity_failure"),
            OutcomeStatus::Failed => Some("fetch_failure"),
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Terminal result of one acquisition job
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AcquisitionOutcome {
    /// The artifact was relocated and its hash is unchanged
    Verified {
        /// Final artifact location
        final_path: PathBuf,
        /// SHA-256 of the artifact
        content_hash: ContentHash,
        /// SHA-256 of the thumbnail, when it could be fetched and hashed
        thumbnail_hash: Option<ContentHash>,
    },
    /// The artifact changed across relocation
    HashMismatch {
        /// Final artifact location
        final_path: PathBuf,
        /// Hash of the working copy before the move
        hash_before: ContentHash,
        /// Hash of the final copy after the move
        hash_after: ContentHash,
        /// SHA-256 of the thumbnail, when it could be fetched and hashed
        thumbnail_hash: Option<ContentHash>,
    },
    /// Operational failure; no trustworthy artifact
    Failed {
        /// Human-readable error description
        error: String,
    },
}

impl AcquisitionOutcome {
    /// Build a failed outcome from any displayable error
    pub fn failed(error: impl std::fmt::Display) -> Self {
        AcquisitionOutcome::Failed {
            error: error.to_string(),
        }
    }

    /// Status tag of this outcome
    pub fn status(&self) -> OutcomeStatus {
        match self {
            AcquisitionOutcome::Verified { .. } => OutcomeStatus::Verified,
            AcquisitionOutcome::HashMismatch { .. } => OutcomeStatus::HashMismatch,
            AcquisitionOutcome::Failed { .. } => OutcomeStatus::Failed,
        }
    }

    /// Final artifact path, when one exists
    pub fn final_path(&self) -> Option<&Path> {
        match self {
            AcquisitionOutcome::Verified { final_path, .. }
            | AcquisitionOutcome::HashMismatch { final_path, .. } => Some(final_path),
            AcquisitionOutcome::Failed { .. } => None,
        }
    }

    /// Terminal state of the job that produced this outcome
    pub fn job_state(&self) -> JobState {
        match self {
            AcquisitionOutcome::Verified { .. } => JobState::Verified,
            AcquisitionOutcome::HashMismatch { .. } => JobState::Mismatched,
            AcquisitionOutcome::Failed { .. } => JobState::Failed,
        }
    }
}

/// Everything a finished job hands back to the scheduler
#[derive(Clone, Debug)]
pub struct JobResult {
    /// Source URL
    pub url: String,
    /// Title reported by the fetch engine
    pub title: Option<String>,
    /// Thumbnail file on disk, if it was fetched
    pub thumbnail: Option<PathBuf>,
    /// Terminal outcome
    pub outcome: AcquisitionOutcome,
    /// When the outcome was decided
    pub completed_at: DateTime<Utc>,
}

impl JobResult {
    /// A result for a job that never produced metadata
    pub fn failed(url: impl Into<String>, error: impl std::fmt::Display) -> Self {
        Self {
            url: url.into(),
            title: None,
            thumbnail: None,
            outcome: AcquisitionOutcome::failed(error),
            completed_at: Utc::now(),
        }
    }

    /// The terminal event announcing this result
    pub fn terminal_event(&self) -> Event {
        let url = self.url.clone();
        match &self.outcome {
            AcquisitionOutcome::Verified { content_hash, .. } => Event::Done {
                url,
                hash: content_hash.clone(),
            },
            AcquisitionOutcome::HashMismatch {
                hash_before,
                hash_after,
                ..
            } => Event::Mismatched {
                url,
                hash_before: hash_before.clone(),
                hash_after: hash_after.clone(),
            },
            AcquisitionOutcome::Failed { error } => Event::Failed {
                url,
                reason: error.clone(),
            },
        }
    }
}

/// Aggregate result of one run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Case identifier
    pub case_id: String,
    /// Number of submitted URLs
    pub total: usize,
    /// Jobs that ended verified
    pub verified: usize,
    /// Jobs that ended with a hash mismatch
    pub mismatched: usize,
    /// Jobs that failed
    pub failed: usize,
    /// Whether the run was cancelled before every job was dispatched
    pub cancelled: bool,
    /// Audit report location
    pub report_path: PathBuf,
}

impl RunSummary {
    /// Jobs that reached a terminal state
    pub fn settled(&self) -> usize {
        self.verified + self.mismatched + self.failed
    }
}

/// Event emitted during the acquisition lifecycle
///
/// Per URL the order is `Queued`, any number of `Downloading`, at most one
/// `Merging`, then exactly one of `Done`, `Mismatched` or `Failed`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// URL accepted and waiting for a worker
    Queued {
        /// Source URL
        url: String,
    },

    /// Fetch engine download progress
    Downloading {
        /// Source URL
        url: String,
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
    },

    /// Download finished; the engine is merging streams
    Merging {
        /// Source URL
        url: String,
        /// Progress percentage (always 99.0)
        percent: f32,
    },

    /// Artifact acquired and verified
    Done {
        /// Source URL
        url: String,
        /// Verified content hash
        hash: ContentHash,
    },

    /// Artifact acquired but its hash changed across relocation
    Mismatched {
        /// Source URL
        url: String,
        /// Hash before relocation
        hash_before: ContentHash,
        /// Hash after relocation
        hash_after: ContentHash,
    },

    /// Acquisition failed
    Failed {
        /// Source URL
        url: String,
        /// Error description
        reason: String,
    },

    /// A report row could not be written (the job's outcome stands)
    ReportWriteFailed {
        /// Source URL of the row
        url: String,
        /// Error message
        error: String,
    },

    /// Every job settled and the report is closed
    Finished {
        /// Audit report location
        report_path: PathBuf,
        /// Aggregate counters
        summary: RunSummary,
    },
}

impl Event {
    /// URL this event is keyed by (`None` for run-level events)
    pub fn url(&self) -> Option<&str> {
        match self {
            Event::Queued { url }
            | Event::Downloading { url, .. }
            | Event::Merging { url, .. }
            | Event::Done { url, .. }
            | Event::Mismatched { url, .. }
            | Event::Failed { url, .. } => Some(url),
            Event::ReportWriteFailed { .. } | Event::Finished { .. } => None,
        }
    }

    /// Whether this is the single terminal event of a URL
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Event::Done { .. } | Event::Mismatched { .. } | Event::Failed { .. }
        )
    }
}
