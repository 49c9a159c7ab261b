//! Bounded worker pool for acquisition jobs
//!
//! Jobs are dispatched in submission order, one per semaphore permit, and
//! settled in completion order. Settling a job means appending its report
//! row, emitting its terminal event, and counting it. After the last job has
//! settled the report is closed and `Finished` is emitted, both exactly once.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use super::job::{AcquisitionJob, JobContext};
use super::session::RunSession;
use crate::engine::{FetchEngine, FetchOptions};
use crate::error::Error;
use crate::relocate::Relocator;
use crate::report::{ReportRecord, ReportWriter};
use crate::types::{AcquisitionRequest, CaseLayout, Event, JobResult, RunSummary};

pub(crate) struct Scheduler {
    pub layout: Arc<CaseLayout>,
    pub engine: Arc<dyn FetchEngine>,
    pub relocator: Arc<dyn Relocator>,
    pub report: Arc<ReportWriter>,
    pub events: UnboundedSender<Event>,
    pub cancel: CancellationToken,
    pub concurrency: usize,
    pub merge_output_format: String,
}

impl Scheduler {
    /// Run every URL to a terminal outcome, then finalize the run
    pub(crate) async fn run(self, urls: Vec<String>) -> RunSummary {
        let mut session = RunSession::new(
            self.layout.case_id.clone(),
            urls.len(),
            self.layout.report_path.clone(),
        );

        let merge_tool = self.engine.merge_tool();
        let options = Arc::new(FetchOptions::for_merge_tool(
            &merge_tool,
            &self.merge_output_format,
        ));
        tracing::info!(
            case = %self.layout.case_id,
            jobs = urls.len(),
            concurrency = self.concurrency,
            engine = self.engine.name(),
            format = options.format.selector(),
            "run started"
        );

        let ctx = JobContext {
            engine: Arc::clone(&self.engine),
            relocator: Arc::clone(&self.relocator),
            options,
            events: self.events.clone(),
            cancel: self.cancel.clone(),
        };

        for url in &urls {
            self.emit(Event::Queued { url: url.clone() });
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut jobs: JoinSet<(String, Result<JobResult, JoinError>)> = JoinSet::new();
        let mut pending = urls.into_iter().enumerate();
        let mut next = pending.next();

        while next.is_some() || !jobs.is_empty() {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled(), if next.is_some() => {
                    session.mark_cancelled();
                    let undispatched: Vec<(usize, String)> = next.take().into_iter().chain(pending.by_ref()).collect();
                    tracing::info!(undispatched = undispatched.len(), "run cancelled, skipping remaining URLs");
                    for (_, url) in undispatched {
                        self.settle(JobResult::failed(url, Error::Cancelled), &mut session).await;
                    }
                }

                Some(joined) = jobs.join_next(), if !jobs.is_empty() => {
                    let result = match joined {
                        Ok((_, Ok(result))) => result,
                        Ok((url, Err(e))) => contain_panic(url, e),
                        Err(e) => contain_panic(String::new(), e),
                    };
                    self.settle(result, &mut session).await;
                }

                permit = Arc::clone(&semaphore).acquire_owned(), if next.is_some() => {
                    let Ok(permit) = permit else {
                        // The semaphore is never closed; treat it like cancellation
                        self.cancel.cancel();
                        continue;
                    };
                    let Some((sequence, url)) = next.take() else { continue };
                    next = pending.next();

                    let job = AcquisitionJob::new(
                        AcquisitionRequest::new(sequence, url.clone(), Arc::clone(&self.layout)),
                        ctx.clone(),
                    );
                    // The inner task isolates a panicking job from the pool
                    jobs.spawn(async move {
                        let _permit = permit;
                        (url, tokio::spawn(job.run()).await)
                    });
                }
            }
        }

        self.finalize(session).await
    }

    async fn settle(&self, result: JobResult, session: &mut RunSession) {
        let record = ReportRecord::from_result(&result, self.report.base_dir());
        if let Err(e) = self.report.append(&record).await {
            tracing::error!(url = %result.url, error = %e, "failed to write report row");
            self.emit(Event::ReportWriteFailed {
                url: result.url.clone(),
                error: e.to_string(),
            });
        }

        let status = result.outcome.status();
        session.record(status);
        tracing::info!(
            url = %result.url,
            status = %status,
            settled = session.settled(),
            outstanding = session.outstanding(),
            percent = session.percent(),
            "job settled"
        );
        self.emit(result.terminal_event());
    }

    async fn finalize(self, session: RunSession) -> RunSummary {
        if let Err(e) = self.report.close().await {
            tracing::error!(report = %self.report.path().display(), error = %e, "failed to close report");
        }

        // Only succeeds when relocation left the working directory empty
        if tokio::fs::remove_dir(&self.layout.working_dir).await.is_ok() {
            tracing::debug!(dir = %self.layout.working_dir.display(), "removed working directory");
        }

        let summary = session.summary();
        tracing::info!(
            case = %summary.case_id,
            verified = summary.verified,
            mismatched = summary.mismatched,
            failed = summary.failed,
            cancelled = summary.cancelled,
            report = %summary.report_path.display(),
            "run finished"
        );
        self.emit(Event::Finished {
            report_path: summary.report_path.clone(),
            summary: summary.clone(),
        });
        summary
    }

    fn emit(&self, event: Event) {
        // A dropped receiver only means nobody is watching
        let _ = self.events.send(event);
    }
}

fn contain_panic(url: String, error: JoinError) -> JobResult {
    tracing::error!(url = %url, error = %error, "acquisition job panicked");
    JobResult::failed(url, format!("job aborted unexpectedly: {}", error))
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::engine::{
        EngineCapabilities, FetchMetadata, MergeTool, ProgressSink, UnavailableEngine,
    };
    use crate::error::FetchError;
    use crate::relocate::FsRelocator;
    use crate::verification::SourceVerification;
    use async_trait::async_trait;
    use std::path::Path;
    use tempfile::TempDir;
    use tokio::sync::mpsc;

    /// Shuts the report as soon as it is asked for `trigger`, so every later
    /// append fails
    struct ReportClosingEngine {
        report: Arc<ReportWriter>,
        trigger: String,
    }

    #[async_trait]
    impl FetchEngine for ReportClosingEngine {
        async fn fetch(
            &self,
            url: &str,
            _output_template: &Path,
            _options: &FetchOptions,
            _progress: &dyn ProgressSink,
        ) -> Result<FetchMetadata, FetchError> {
            if url == self.trigger {
                self.report.close().await.unwrap();
            }
            Err(FetchError::Extraction(format!("no media at {url}")))
        }

        async fn fetch_thumbnail(&self, _thumbnail_url: &str, _dest: &Path) -> Result<(), FetchError> {
            Err(FetchError::Thumbnail("not supported".into()))
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
            "report-closing"
        }
    }

    async fn scheduler(
        dir: &TempDir,
        engine: impl FnOnce(Arc<ReportWriter>) -> Arc<dyn FetchEngine>,
        concurrency: usize,
    ) -> (Scheduler, mpsc::UnboundedReceiver<Event>) {
        let config = Config::new("CASE1", dir.path());
        let layout = Arc::new(CaseLayout::from_config(&config));
        layout.create().await.unwrap();
        let source = SourceVerification::skipped(config.network.ip_endpoints.clone());
        let report = Arc::new(
            ReportWriter::open(&layout.report_path, &layout.case_id, &source)
                .await
                .unwrap(),
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let scheduler = Scheduler {
            layout,
            engine: engine(Arc::clone(&report)),
            relocator: Arc::new(FsRelocator),
            report,
            events: tx,
            cancel: CancellationToken::new(),
            concurrency,
            merge_output_format: "mp4".into(),
        };
        (scheduler, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Event>) -> Vec<Event> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn report_write_failure_is_surfaced_and_siblings_settle() {
        let dir = TempDir::new().unwrap();
        let urls: Vec<String> = ["a", "b", "c"]
            .iter()
            .map(|id| format!("https://example.com/{id}"))
            .collect();
        let trigger = urls[1].clone();
        let (scheduler, mut rx) = scheduler(
            &dir,
            |report| {
                Arc::new(ReportClosingEngine { report, trigger }) as Arc<dyn FetchEngine>
            },
            1,
        )
        .await;
        let report_path = scheduler.report.path().to_path_buf();

        let summary = scheduler.run(urls.clone()).await;
        let events = drain(&mut rx);

        // Every URL still settles exactly once
        assert_eq!(summary.failed, 3);
        for url in &urls {
            let terminal = events
                .iter()
                .filter(|e| e.is_terminal() && e.url() == Some(url.as_str()))
                .count();
            assert_eq!(terminal, 1, "terminal events for {url}");
        }

        // Rows after the report went away are reported out of band
        let write_failures: Vec<&str> = events
            .iter()
            .filter_map(|e| match e {
                Event::ReportWriteFailed { url, error } => {
                    assert!(error.contains("already closed"), "{error}");
                    Some(url.as_str())
                }
                _ => None,
            })
            .collect();
        assert_eq!(write_failures, vec![urls[1].as_str(), urls[2].as_str()]);

        let finished = events
            .iter()
            .filter(|e| matches!(e, Event::Finished { .. }))
            .count();
        assert_eq!(finished, 1);
        assert!(matches!(events.last(), Some(Event::Finished { .. })));

        // The row written before the failure survives, the footer once
        let html = std::fs::read_to_string(report_path).unwrap();
        assert_eq!(html.matches("<tr>").count() - 1, 1);
        assert!(html.contains(r#"href="https://example.com/a""#));
        assert_eq!(html.matches("</html>").count(), 1);
    }

    #[tokio::test]
    async fn finalize_happens_once_when_every_job_fails() {
        let dir = TempDir::new().unwrap();
        let (scheduler, mut rx) =
            scheduler(&dir, |_| Arc::new(UnavailableEngine) as Arc<dyn FetchEngine>, 4).await;
        let report = Arc::clone(&scheduler.report);
        let working_dir = scheduler.layout.working_dir.clone();

        let urls: Vec<String> = (0..6).map(|n| format!("https://example.com/{n}")).collect();
        let summary = scheduler.run(urls).await;

        assert_eq!(summary.total, 6);
        assert_eq!(summary.failed, 6);
        assert!(report.is_closed().await);
        assert_eq!(report.rows_written().await, 6);
        assert!(!working_dir.exists());

        let events = drain(&mut rx);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 6);
        assert!(!events.iter().any(|e| matches!(e, Event::ReportWriteFailed { .. })));
    }
}
