//! Fetch engine backed by the external `yt-dlp` binary

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use super::parser::{
    META_TEMPLATE, OutputCollector, OutputLine, PROGRESS_TEMPLATE, parse_line,
};
use super::traits::{
    EngineCapabilities, FetchEngine, FetchMetadata, FetchOptions, MergeTool, ProgressSink,
};
use crate::config::ToolsConfig;
use crate::error::FetchError;

/// Fetch engine that drives the external `yt-dlp` binary
///
/// Progress and the final metadata are read line by line from the child's
/// output. Thumbnails are downloaded over HTTP directly.
///
/// # Examples
///
/// ```no_run
/// use media_acquire::config::ToolsConfig;
/// use media_acquire::engine::{FetchEngine, YtDlpEngine};
/// use std::time::Duration;
///
/// let engine = YtDlpEngine::from_config(&ToolsConfig::default(), Duration::from_secs(15))
///     .expect("yt-dlp not found in PATH");
/// println!("merge tool available: {}", engine.merge_tool().is_available());
/// ```
pub struct YtDlpEngine {
    binary_path: PathBuf,
    merge_tool: MergeTool,
    http: reqwest::Client,
    thumbnail_timeout: Duration,
}

impl YtDlpEngine {
    /// Create an engine with an explicit binary path and merge tool
    pub fn new(binary_path: PathBuf, merge_tool: MergeTool, thumbnail_timeout: Duration) -> Self {
        Self {
            binary_path,
            merge_tool,
            http: reqwest::Client::new(),
            thumbnail_timeout,
        }
    }

    /// Locate `yt-dlp` from configuration, then `PATH`
    ///
    /// Returns `None` if no binary is found.
    pub fn from_config(tools: &ToolsConfig, thumbnail_timeout: Duration) -> Option<Self> {
        let binary = match &tools.yt_dlp_path {
            Some(path) if path.exists() => Some(path.clone()),
            Some(path) => {
                tracing::warn!(path = %path.display(), "configured yt-dlp path does not exist");
                None
            }
            None => None,
        }
        .or_else(|| {
            if tools.search_path {
                which::which("yt-dlp").ok()
            } else {
                None
            }
        })?;

        Some(Self::new(
            binary,
            MergeTool::discover(tools),
            thumbnail_timeout,
        ))
    }

    /// Path of the binary this engine runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    fn command(&self, url: &str, output_template: &Path, options: &FetchOptions) -> Command {
        let mut command = Command::new(&self.binary_path);
        command
            .arg("--no-playlist")
            .arg("--newline")
            .arg("--progress")
            .arg("--no-warnings")
            .arg("--progress-template")
            .arg(PROGRESS_TEMPLATE)
            .arg("--print")
            .arg(META_TEMPLATE)
            .arg("-f")
            .arg(options.format.selector());

        if let Some(container) = &options.merge_output_format {
            command.arg("--merge-output-format").arg(container);
        }
        if let Some(location) = &options.merge_tool_location {
            command.arg("--ffmpeg-location").arg(location);
        }

        command
            .arg("-o")
            .arg(output_template)
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

fn handle_line(
    line: &str,
    from_stderr: bool,
    collector: &mut OutputCollector,
    progress: &dyn ProgressSink,
) {
    match parse_line(line) {
        OutputLine::Progress { status, percent } => progress.on_progress(status, &percent),
        OutputLine::Metadata(meta) => collector.metadata(meta),
        OutputLine::Error(message) => collector.error(message),
        OutputLine::Other => {
            if from_stderr {
                collector.stderr(line);
            }
        }
    }
}

#[async_trait]
impl FetchEngine for YtDlpEngine {
    async fn fetch(
        &self,
        url: &str,
        output_template: &Path,
        options: &FetchOptions,
        progress: &dyn ProgressSink,
    ) -> Result<FetchMetadata, FetchError> {
        tracing::debug!(url = %url, format = options.format.selector(), "starting yt-dlp");

        let mut child = self
            .command(url, output_template, options)
            .spawn()
            .map_err(|e| FetchError::ToolMissing(format!("failed to execute yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::ToolMissing("failed to capture yt-dlp stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| FetchError::ToolMissing("failed to capture yt-dlp stderr".into()))?;

        let mut stdout = BufReader::new(stdout).lines();
        let mut stderr = BufReader::new(stderr).lines();
        let mut collector = OutputCollector::default();
        let (mut stdout_done, mut stderr_done) = (false, false);

        while !(stdout_done && stderr_done) {
            tokio::select! {
                line = stdout.next_line(), if !stdout_done => match line? {
                    Some(line) => handle_line(&line, false, &mut collector, progress),
                    None => stdout_done = true,
                },
                line = stderr.next_line(), if !stderr_done => match line? {
                    Some(line) => handle_line(&line, true, &mut collector, progress),
                    None => stderr_done = true,
                },
            }
        }

        let status = child.wait().await?;
        tracing::debug!(url = %url, status = %status, "yt-dlp exited");
        collector.finish(status.success())
    }

    async fn fetch_thumbnail(&self, thumbnail_url: &str, dest: &Path) -> Result<(), FetchError> {
        let thumbnail_err = |e: &dyn std::fmt::Display| FetchError::Thumbnail(e.to_string());

        let bytes = self
            .http
            .get(thumbnail_url)
            .timeout(self.thumbnail_timeout)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| thumbnail_err(&e))?
            .bytes()
            .await
            .map_err(|e| thumbnail_err(&e))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| thumbnail_err(&e))?;
        }
        tokio::fs::write(dest, &bytes)
            .await
            .map_err(|e| thumbnail_err(&e))?;
        Ok(())
    }

    fn merge_tool(&self) -> MergeTool {
        self.merge_tool.clone()
    }

    fn capabilities(&self) -> EngineCapabilities {
        EngineCapabilities {
            can_fetch_thumbnail: true,
        }
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::traits::{FetchStatus, FormatPolicy};
    use std::sync::Mutex;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(FetchStatus, String)>>,
    }

    impl ProgressSink for RecordingSink {
        fn on_progress(&self, status: FetchStatus, percent: &str) {
            self.calls.lock().unwrap().push((status, percent.to_string()));
        }
    }

    fn engine(binary: PathBuf) -> YtDlpEngine {
        YtDlpEngine::new(binary, MergeTool::Unavailable, Duration::from_secs(2))
    }

    #[test]
    fn from_config_without_binary_returns_none() {
        let tools = ToolsConfig {
            yt_dlp_path: Some(PathBuf::from("/nonexistent/yt-dlp-binary-xyz")),
            search_path: false,
            ..ToolsConfig::default()
        };
        assert!(YtDlpEngine::from_config(&tools, Duration::from_secs(1)).is_none());
    }

    #[test]
    fn from_config_uses_explicit_binary() {
        let dir = TempDir::new().unwrap();
        let binary = dir.path().join("yt-dlp");
        std::fs::write(&binary, b"").unwrap();
        let tools = ToolsConfig {
            yt_dlp_path: Some(binary.clone()),
            search_path: false,
            ..ToolsConfig::default()
        };
        let engine = YtDlpEngine::from_config(&tools, Duration::from_secs(1)).unwrap();
        assert_eq!(engine.binary_path(), binary);
        assert_eq!(engine.merge_tool(), MergeTool::Unavailable);
        assert_eq!(engine.name(), "yt-dlp");
    }

    #[tokio::test]
    async fn missing_binary_is_tool_missing() {
        let engine = engine(PathBuf::from("/nonexistent/yt-dlp-binary-xyz"));
        let options = FetchOptions::for_merge_tool(&MergeTool::Unavailable, "mp4");
        let err = engine
            .fetch(
                "https://example.com/v",
                Path::new("/tmp/%(title)s.%(ext)s"),
                &options,
                &RecordingSink::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::ToolMissing(_)));
    }

    // Both scripted runs share one test so no two fake binaries are written
    // and executed concurrently.
    #[cfg(unix)]
    #[tokio::test]
    async fn drives_scripted_binary() {
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            std::fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        let dir = TempDir::new().unwrap();
        let options = FetchOptions {
            format: FormatPolicy::BestMerged,
            merge_output_format: Some("mp4".into()),
            merge_tool_location: Some(PathBuf::from("/opt/ffmpeg")),
        };

        let ok = script(
            dir.path(),
            "ok.sh",
            r#"printf '%s\n' "$@" > "$(dirname "$0")/args.txt"
echo "[youtube] abc: Downloading webpage"
echo "ACQ_PROGRESS|downloading|  12.5%"
echo "ACQ_PROGRESS|downloading| 80.0%" >&2
echo "ACQ_PROGRESS|finished|100%"
echo 'ACQ_META {"id": "abc", "title": "Clip", "thumbnail": "https://i.example.com/abc.jpg", "filepath": "/w/C1_Clip.mp4"}'
"#,
        );
        let sink = RecordingSink::default();
        let meta = engine(ok)
            .fetch(
                "https://example.com/v",
                &dir.path().join("C1_%(title)s.%(ext)s"),
                &options,
                &sink,
            )
            .await
            .unwrap();

        assert_eq!(meta.id, "abc");
        assert_eq!(meta.title, "Clip");
        assert_eq!(meta.temp_path, PathBuf::from("/w/C1_Clip.mp4"));
        let calls = sink.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 3);
        assert!(calls.contains(&(FetchStatus::Finished, "100%".to_string())));

        let args = std::fs::read_to_string(dir.path().join("args.txt")).unwrap();
        let args: Vec<&str> = args.lines().collect();
        assert!(args.contains(&"--no-playlist"));
        let f = args.iter().position(|a| *a == "-f").unwrap();
        assert_eq!(args[f + 1], "bestvideo+bestaudio/best");
        let loc = args.iter().position(|a| *a == "--ffmpeg-location").unwrap();
        assert_eq!(args[loc + 1], "/opt/ffmpeg");
        assert_eq!(args.last(), Some(&"https://example.com/v"));

        let failing = script(
            dir.path(),
            "fail.sh",
            r#"echo "ERROR: [youtube] abc: Requested format is not available" >&2
exit 1
"#,
        );
        let err = engine(failing)
            .fetch(
                "https://example.com/v",
                &dir.path().join("%(title)s.%(ext)s"),
                &options,
                &RecordingSink::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::NoStream(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn thumbnail_is_written_to_destination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/abc.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg-bytes".to_vec()))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("Thumbnails").join("abc_thumbnail.jpg");
        engine(PathBuf::from("yt-dlp"))
            .fetch_thumbnail(&format!("{}/abc.jpg", server.uri()), &dest)
            .await
            .unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"jpeg-bytes");
    }

    #[tokio::test]
    async fn thumbnail_http_error_is_auxiliary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("t.jpg");
        let err = engine(PathBuf::from("yt-dlp"))
            .fetch_thumbnail(&format!("{}/missing.jpg", server.uri()), &dest)
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::Thumbnail(_)));
        assert!(!dest.exists());
    }
}
