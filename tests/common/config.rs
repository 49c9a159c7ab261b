//! Test configuration helpers

use media_acquire::Config;
use std::path::Path;

/// A configuration that never touches the network outside stub engines
pub fn offline_config(root: &Path, case_id: &str, concurrency: usize) -> Config {
    let mut config = Config::new(case_id, root);
    config.concurrency = concurrency;
    config.network.verify_source = false;
    config.tools.search_path = false;
    config
}

/// `count` distinct source URLs
pub fn urls(count: usize) -> Vec<String> {
    (1..=count)
        .map(|n| format!("https://media.example.com/watch/clip{n:03}"))
        .collect()
}
