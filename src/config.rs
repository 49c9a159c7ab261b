//! Configuration types for media-acquire

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Smallest accepted worker count
pub const MIN_CONCURRENCY: usize = 1;

/// Largest accepted worker count
pub const MAX_CONCURRENCY: usize = 32;

/// External tool paths and output format preferences
///
/// Groups settings for the fetch engine binary and the merge tool.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub yt_dlp_path: Option<PathBuf>,

    /// Path to a bundled ffmpeg executable or its directory (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Container used when separate video and audio streams are merged (default: "mp4")
    #[serde(default = "default_merge_output_format")]
    pub merge_output_format: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: None,
            ffmpeg_path: None,
            search_path: true,
            merge_output_format: default_merge_output_format(),
        }
    }
}

/// Outbound network settings (source verification, thumbnails)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Whether to query the public IP endpoints before the run (default: true)
    #[serde(default = "default_true")]
    pub verify_source: bool,

    /// The two independent "what is my IP" endpoints
    #[serde(default = "default_ip_endpoints")]
    pub ip_endpoints: [String; 2],

    /// Timeout for each IP endpoint query (default: 5 seconds)
    #[serde(default = "default_ip_timeout", with = "duration_serde")]
    pub ip_timeout: Duration,

    /// Timeout for a thumbnail download (default: 15 seconds)
    #[serde(default = "default_thumbnail_timeout", with = "duration_serde")]
    pub thumbnail_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            verify_source: true,
            ip_endpoints: default_ip_endpoints(),
            ip_timeout: default_ip_timeout(),
            thumbnail_timeout: default_thumbnail_timeout(),
        }
    }
}

/// Directory names inside a case root
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Primary artifacts directory (default: "Videos")
    #[serde(default = "default_videos_dir")]
    pub videos_dir: String,

    /// Thumbnails directory (default: "Thumbnails")
    #[serde(default = "default_thumbnails_dir")]
    pub thumbnails_dir: String,

    /// Working directory the fetch engine writes into before relocation (default: ".incoming")
    #[serde(default = "default_working_dir")]
    pub working_dir: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            videos_dir: default_videos_dir(),
            thumbnails_dir: default_thumbnails_dir(),
            working_dir: default_working_dir(),
        }
    }
}

/// Main configuration for one acquisition run
///
/// Fields are organized into logical sub-configs:
/// - [`tools`](ToolsConfig) - external binary paths, merge container
/// - [`network`](NetworkConfig) - source verification and thumbnail timeouts
/// - [`layout`](LayoutConfig) - directory names inside the case root
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Case identifier; names the case directory, report, and artifact prefix
    pub case_id: String,

    /// Root under which the case directory is created
    pub destination_root: PathBuf,

    /// Maximum concurrent acquisition jobs (default: 4, clamped to 1..=32)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Outbound network settings
    #[serde(default)]
    pub network: NetworkConfig,

    /// Case directory layout
    #[serde(default)]
    pub layout: LayoutConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            case_id: String::new(),
            destination_root: PathBuf::new(),
            concurrency: default_concurrency(),
            tools: ToolsConfig::default(),
            network: NetworkConfig::default(),
            layout: LayoutConfig::default(),
        }
    }
}

impl Config {
    /// Create a configuration for a case with defaults for everything else
    pub fn new(case_id: impl Into<String>, destination_root: impl Into<PathBuf>) -> Self {
        Self {
            case_id: case_id.into(),
            destination_root: destination_root.into(),
            ..Default::default()
        }
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Worker count clamped to the accepted range
    pub fn effective_concurrency(&self) -> usize {
        clamp_concurrency(self.concurrency)
    }

    /// Reject configurations that must not reach the scheduler
    ///
    /// Checks the case id, the destination root, and every source URL.
    /// Nothing is created on disk before this passes.
    pub fn validate(&self, urls: &[String]) -> Result<()> {
        let case_id = self.case_id.trim();
        if case_id.is_empty() {
            return Err(Error::config("case_id", "case id is required"));
        }
        if case_id != self.case_id {
            return Err(Error::config(
                "case_id",
                "case id must not have leading or trailing whitespace",
            ));
        }
        if case_id == "."
            || case_id == ".."
            || case_id.contains(['/', '\\'])
            || case_id.chars().any(char::is_control)
        {
            return Err(Error::config(
                "case_id",
                format!("case id '{}' is not a valid directory name", case_id),
            ));
        }

        if self.destination_root.as_os_str().is_empty() {
            return Err(Error::config(
                "destination_root",
                "destination folder is required",
            ));
        }
        if self.destination_root.exists() && !self.destination_root.is_dir() {
            return Err(Error::config(
                "destination_root",
                format!(
                    "destination '{}' exists and is not a directory",
                    self.destination_root.display()
                ),
            ));
        }

        for (key, name) in [
            ("layout.videos_dir", &self.layout.videos_dir),
            ("layout.thumbnails_dir", &self.layout.thumbnails_dir),
            ("layout.working_dir", &self.layout.working_dir),
        ] {
            if name.is_empty()
                || name == "."
                || name == ".."
                || name.contains(['/', '\\'])
                || name.chars().any(char::is_control)
            {
                return Err(Error::config(key, format!("invalid directory name '{}'", name)));
            }
        }

        if urls.is_empty() {
            return Err(Error::config("urls", "no URLs entered"));
        }
        for raw in urls {
            validate_url(raw)?;
        }

        Ok(())
    }
}

/// Clamp a requested worker count into `MIN_CONCURRENCY..=MAX_CONCURRENCY`
pub fn clamp_concurrency(requested: usize) -> usize {
    requested.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
}

fn validate_url(raw: &str) -> Result<()> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| Error::config("urls", format!("invalid URL '{}': {}", raw, e)))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => {
            return Err(Error::config(
                "urls",
                format!("unsupported URL scheme '{}' in '{}'", other, raw),
            ));
        }
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::config("urls", format!("URL '{}' has no host", raw)));
    }
    Ok(())
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_merge_output_format() -> String {
    "mp4".to_string()
}

fn default_ip_endpoints() -> [String; 2] {
    [
        "https://api.ipify.org".to_string(),
        "https://checkip.amazonaws.com".to_string(),
    ]
}

fn default_ip_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_thumbnail_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_videos_dir() -> String {
    "Videos".to_string()
}

fn default_thumbnails_dir() -> String {
    "Thumbnails".to_string()
}

fn default_working_dir() -> String {
    ".incoming".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
