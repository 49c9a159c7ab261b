//! Fetch engine collaborator
//!
//! The pipeline never downloads media itself. It hands each URL to a
//! [`FetchEngine`], which resolves and retrieves the artifact and reports
//! progress through a [`ProgressSink`].
//!
//! ## Implementations
//!
//! - [`YtDlpEngine`]: drives the external `yt-dlp` binary
//! - [`UnavailableEngine`]: stand-in when no binary is found; every fetch fails
//!
//! ## Format selection
//!
//! Whether separate video and audio streams can be merged depends on an
//! external merge tool. [`FetchEngine::merge_tool`] is consulted once per run
//! and turned into [`FetchOptions`] via [`FetchOptions::for_merge_tool`].
//!
//! ```no_run
//! use media_acquire::config::ToolsConfig;
//! use media_acquire::engine::{FetchEngine, FetchOptions, UnavailableEngine, YtDlpEngine};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let tools = ToolsConfig::default();
//! let engine: Arc<dyn FetchEngine> = match YtDlpEngine::from_config(&tools, Duration::from_secs(15)) {
//!     Some(engine) => Arc::new(engine),
//!     None => Arc::new(UnavailableEngine),
//! };
//! let options = FetchOptions::for_merge_tool(&engine.merge_tool(), &tools.merge_output_format);
//! println!("{} selects '{}'", engine.name(), options.format.selector());
//! ```

mod parser;
mod traits;
mod unavailable;
mod ytdlp;

pub use traits::{
    EngineCapabilities, FetchEngine, FetchMetadata, FetchOptions, FetchStatus, FormatPolicy,
    MergeTool, NullProgress, ProgressSink, render_template,
};
pub use unavailable::UnavailableEngine;
pub use ytdlp::YtDlpEngine;
