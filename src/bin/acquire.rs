//! acquire: bulk media acquisition from the command line
//!
//! ```bash
//! acquire --case CASE007 --dest ./out --threads 4 https://www.youtube.com/watch?v=dQw4w9WgXcQ
//! acquire --case CASE008 --dest ./out --input urls.txt --json
//! ```
//!
//! Exit codes: `0` when every URL verified, `1` when at least one did not,
//! `2` when the run could not start (invalid configuration, unwritable
//! destination).

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use media_acquire::settings::SETTINGS_FILE;
use media_acquire::{Acquirer, Config, Event, Settings, cancel_on_signal};

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(name = "acquire", version, about = "Bulk media acquisition with hash verification")]
struct Args {
    /// Case identifier (names the case directory and report)
    #[arg(long = "case", env = "ACQUIRE_CASE")]
    case_id: Option<String>,

    /// Destination root under which the case directory is created
    #[arg(long, env = "ACQUIRE_DEST")]
    dest: Option<PathBuf>,

    /// Number of concurrent downloads (1-32)
    #[arg(long)]
    threads: Option<usize>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Preferences file remembering the last case, threads and destination
    #[arg(long, default_value = SETTINGS_FILE)]
    settings: PathBuf,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,

    /// Skip public IP verification
    #[arg(long)]
    no_ip_check: bool,

    /// File with one URL per line
    #[arg(long)]
    input: Option<PathBuf>,

    /// URLs to acquire
    urls: Vec<String>,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Merge configuration sources: flags over config file over saved preferences
fn build_config(args: &Args, settings: &Settings) -> media_acquire::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::new(settings.case_id.clone(), settings.destination.clone()),
    };
    if args.config.is_none() {
        config.concurrency = settings.threads;
    }

    if let Some(case_id) = &args.case_id {
        config.case_id = case_id.trim().to_string();
    }
    if let Some(dest) = &args.dest {
        config.destination_root = dest.clone();
    }
    if let Some(threads) = args.threads {
        config.concurrency = threads;
    }
    if args.no_ip_check {
        config.network.verify_source = false;
    }
    Ok(config)
}

/// Collect URLs from arguments and the input file; blank lines are ignored
fn collect_urls(args: &Args) -> media_acquire::Result<Vec<String>> {
    let mut urls: Vec<String> = args
        .urls
        .iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();

    if let Some(path) = &args.input {
        let content = std::fs::read_to_string(path)?;
        urls.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from),
        );
    }
    Ok(urls)
}

fn print_event(event: &Event) {
    match event {
        Event::Queued { url } => println!("[QUEUED]    {url}"),
        Event::Downloading { .. } => {}
        Event::Merging { url, .. } => println!("[MERGING]   {url}"),
        Event::Done { url, hash } => println!("[DONE]      {url} sha256={hash}"),
        Event::Mismatched {
            url,
            hash_before,
            hash_after,
        } => println!("[MISMATCH]  {url} before={hash_before} after={hash_after}"),
        Event::Failed { url, reason } => println!("[FAILED]    {url}: {reason}"),
        Event::ReportWriteFailed { url, error } => {
            eprintln!("report row for {url} was not written: {error}")
        }
        Event::Finished {
            report_path,
            summary,
        } => {
            println!(
                "verified {}, mismatched {}, failed {} of {}",
                summary.verified, summary.mismatched, summary.failed, summary.total
            );
            println!("run complete, report at {}", report_path.display());
        }
    }
}

fn save_settings(path: &Path, config: &Config) {
    let settings = Settings {
        case_id: config.case_id.clone(),
        threads: config.effective_concurrency(),
        destination: config.destination_root.clone(),
    };
    if let Err(e) = settings.save(path) {
        tracing::warn!(path = %path.display(), error = %e, "could not save settings");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.json);

    let settings = Settings::load_or_default(&args.settings);
    let config = match build_config(&args, &settings) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };
    let urls = match collect_urls(&args) {
        Ok(urls) => urls,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    let acquirer = Acquirer::new(config);
    let mut run = match acquirer.start(urls).await {
        Ok(run) => run,
        Err(e) => {
            tracing::error!(category = e.category(), error = %e, "run could not start");
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };
    save_settings(&args.settings, acquirer.config());

    tokio::spawn(cancel_on_signal(run.cancellation_token()));

    let mut clean = true;
    while let Some(event) = run.events().recv().await {
        print_event(&event);
        if let Event::Finished { summary, .. } = &event {
            clean = summary.verified == summary.total;
        }
    }

    match run.wait().await {
        Ok(_) if clean => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(2)
        }
    }
}
