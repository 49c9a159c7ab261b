//! Event and report assertions shared by the integration tests

use media_acquire::{Event, RunHandle};
use std::path::Path;
use std::time::Duration;
use tokio_stream::StreamExt;

/// Upper bound for any single test run
pub const RUN_TIMEOUT: Duration = Duration::from_secs(30);

/// Drain every event of a run until the channel closes
pub async fn collect_events(run: RunHandle) -> Vec<Event> {
    tokio::time::timeout(RUN_TIMEOUT, run.into_stream().collect::<Vec<_>>())
        .await
        .expect("run did not finish in time")
}

/// Events keyed by `url`, in emission order
pub fn events_for<'a>(events: &'a [Event], url: &str) -> Vec<&'a Event> {
    events.iter().filter(|e| e.url() == Some(url)).collect()
}

/// Check the per-URL lifecycle: `Queued`, `Downloading*`, at most one
/// `Merging`, exactly one terminal event, in that order
pub fn assert_lifecycle(events: &[Event], url: &str) {
    let own = events_for(events, url);
    assert!(
        matches!(own.first(), Some(Event::Queued { .. })),
        "first event for {url} is not Queued: {own:?}"
    );
    assert!(
        own.last().is_some_and(|e| e.is_terminal()),
        "last event for {url} is not terminal: {own:?}"
    );
    assert_eq!(
        own.iter().filter(|e| e.is_terminal()).count(),
        1,
        "expected exactly one terminal event for {url}: {own:?}"
    );
    assert_eq!(
        own.iter().filter(|e| matches!(e, Event::Queued { .. })).count(),
        1,
        "expected exactly one Queued for {url}"
    );

    let merging_at = own.iter().position(|e| matches!(e, Event::Merging { .. }));
    if let Some(at) = merging_at {
        assert!(
            own[at + 1..]
                .iter()
                .all(|e| e.is_terminal()),
            "only the terminal event may follow Merging for {url}: {own:?}"
        );
    }
    assert!(
        own.iter()
            .filter(|e| matches!(e, Event::Merging { .. }))
            .count()
            <= 1
    );
    for event in &own {
        if let Event::Downloading { percent, .. } = event {
            assert!((0.0..=100.0).contains(percent), "percent out of range: {percent}");
        }
    }
}

/// Exactly one `Finished`, and it is the final event
pub fn assert_finished_once(events: &[Event]) {
    let finished = events
        .iter()
        .filter(|e| matches!(e, Event::Finished { .. }))
        .count();
    assert_eq!(finished, 1, "expected exactly one Finished event");
    assert!(matches!(events.last(), Some(Event::Finished { .. })));
}

/// Report table rows (the text between `<tr>` and `</tr>`, header excluded)
pub fn report_rows(html: &str) -> Vec<String> {
    let body = html
        .split("<th>Thumbnail SHA256</th>\n</tr>\n")
        .nth(1)
        .expect("report header missing");
    body.split("<tr>")
        .skip(1)
        .map(|row| {
            row.split("</tr>")
                .next()
                .expect("unterminated row")
                .to_string()
        })
        .collect()
}

/// Read a closed report and check its overall structure
pub fn read_closed_report(path: &Path, expected_rows: usize) -> String {
    let html = std::fs::read_to_string(path).expect("report missing");
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert_eq!(html.matches("</table>").count(), 1, "footer written more than once");
    assert!(html.trim_end().ends_with("</html>"), "report was not closed");

    let rows = report_rows(&html);
    assert_eq!(rows.len(), expected_rows);
    for row in &rows {
        assert_eq!(row.matches("<td").count(), 7, "malformed row: {row}");
        assert_eq!(row.matches("</td>").count(), 7, "malformed row: {row}");
    }
    html
}

/// The report row mentioning `url`
pub fn row_for(html: &str, url: &str) -> String {
    let rows: Vec<String> = report_rows(html)
        .into_iter()
        .filter(|row| row.contains(&format!(r#"href="{url}""#)))
        .collect();
    assert_eq!(rows.len(), 1, "expected one row for {url}");
    rows.into_iter().next().expect("row exists")
}
