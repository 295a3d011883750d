// moodlesync-core/src/application/sync.rs

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::application::retry_shell::{RetryShell, ShellOutcome};
use crate::domain::layout::{history_row, render_grid, stamp_text};
use crate::domain::reconcile::{Reconciler, UnifiedTable};
use crate::domain::retry::SourceState;
use crate::error::SyncError;
use crate::infrastructure::config::SyncConfig;
use crate::infrastructure::error::InfrastructureError;
use crate::ports::sheet::SheetWriter;
use crate::ports::source::{RecordParser, SourceFetcher};

/// What happened to one configured source during a run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub label: String,
    pub id: String,
    pub state: SourceState,
    pub records: usize,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Reconciled table plus the per-source report, before anything is written.
#[derive(Debug)]
pub struct Collected {
    pub table: UnifiedTable,
    pub sources: Vec<SourceOutcome>,
    pub names_filled: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_at: String,
    pub rows: usize,
    pub columns: usize,
    pub names_filled: usize,
    pub sources: Vec<SourceOutcome>,
}

impl SyncReport {
    pub fn degraded(&self) -> impl Iterator<Item = &SourceOutcome> {
        self.sources
            .iter()
            .filter(|s| s.state == SourceState::Degraded)
    }
}

/// Login, fetch and parse every source, reconcile. Nothing is written.
///
/// The source plan is resolved before the first network call, so a bad configuration never
/// reaches Moodle.
#[instrument(skip_all)]
pub async fn collect_table<F, P>(
    fetcher: &F,
    parser: &P,
    config: &SyncConfig,
) -> Result<Collected, SyncError>
where
    F: SourceFetcher + ?Sized,
    P: RecordParser + ?Sized,
{
    let plan = config.resolve_plan()?;
    let shell = RetryShell::new(config.retry);

    shell
        .run("login", |_| fetcher.authenticate())
        .await
        .into_result()?;

    let mut reconciler = Reconciler::new(&plan);
    let mut outcomes = Vec::with_capacity(plan.len());

    for spec in plan.sources() {
        let outcome = shell
            .run(&spec.label, |_| async move {
                let payload = fetcher.fetch_source(spec).await?;
                parser.parse(spec, &payload)
            })
            .await;

        let report = match outcome {
            ShellOutcome::Success { value, attempts } => {
                let stats = reconciler.absorb(spec.position, value)?;
                info!(
                    source = %spec.label,
                    records = stats.records,
                    new_rows = stats.new_rows,
                    "✅ Source merged"
                );
                SourceOutcome {
                    label: spec.label.clone(),
                    id: spec.id.clone(),
                    state: SourceState::Success,
                    records: stats.records - stats.skipped,
                    attempts,
                    last_error: None,
                }
            }
            ShellOutcome::Degraded {
                attempts,
                last_error,
            } => {
                warn!(
                    source = %spec.label,
                    attempts,
                    error = %last_error,
                    "❌ Source degraded, its columns stay blank"
                );
                SourceOutcome {
                    label: spec.label.clone(),
                    id: spec.id.clone(),
                    state: SourceState::Degraded,
                    records: 0,
                    attempts,
                    last_error: Some(last_error.to_string()),
                }
            }
            ShellOutcome::Aborted { error, .. } => return Err(error),
        };
        outcomes.push(report);
    }

    if outcomes.iter().all(|o| o.state == SourceState::Degraded) {
        return Err(SyncError::AllSourcesFailed(outcomes.len()));
    }

    let mut names_filled = 0;
    if config.roster_enrichment && !reconciler.is_empty() {
        match shell.run("roster", |_| fetcher.fetch_roster()).await {
            ShellOutcome::Success { value, .. } => {
                names_filled = reconciler.fill_names(&value);
                info!(participants = value.len(), names_filled, "Roster applied");
            }
            ShellOutcome::Degraded { last_error: error, .. }
            | ShellOutcome::Aborted { error, .. } => {
                warn!(error = %error, "Roster unavailable, names left as exported");
            }
        }
    }

    Ok(Collected {
        table: reconciler.finish(),
        sources: outcomes,
        names_filled,
    })
}

async fn write_step<Fut>(
    shell: &RetryShell,
    what: &str,
    op: impl FnMut(u32) -> Fut,
) -> Result<(), SyncError>
where
    Fut: Future<Output = Result<(), SyncError>>,
{
    match shell.run(what, op).await {
        ShellOutcome::Success { .. } => Ok(()),
        ShellOutcome::Degraded {
            attempts,
            last_error,
        } => Err(InfrastructureError::Write(format!(
            "{}: exhausted after {} attempt(s): {}",
            what, attempts, last_error
        ))
        .into()),
        ShellOutcome::Aborted { error, .. } => Err(error),
    }
}

/// Full run: collect, rebuild the worksheet, stamp it, append to the history tab.
///
/// `run_at` is the already formatted run timestamp.
pub async fn run_sync<F, P, W>(
    fetcher: &F,
    parser: &P,
    writer: &W,
    config: &SyncConfig,
    run_at: &str,
) -> Result<SyncReport, SyncError>
where
    F: SourceFetcher + ?Sized,
    P: RecordParser + ?Sized,
    W: SheetWriter + ?Sized,
{
    let collected = collect_table(fetcher, parser, config).await?;
    let grid = render_grid(&collected.table);
    let shell = RetryShell::new(config.retry);

    write_step(&shell, "write table", |_| writer.write_table(&grid)).await?;
    let stamp = stamp_text(run_at);
    write_step(&shell, "timestamp", |_| writer.stamp_timestamp(&stamp)).await?;
    let row = history_row(run_at);
    write_step(&shell, "history", |_| writer.append_history(&row)).await?;

    info!(rows = collected.table.len(), "📊 Spreadsheet updated");

    Ok(SyncReport {
        run_at: run_at.to_string(),
        rows: collected.table.len(),
        columns: grid.first().map(Vec::len).unwrap_or_default(),
        names_filled: collected.names_filled,
        sources: collected.sources,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::error::DomainError;
    use crate::domain::layout::Grid;
    use crate::domain::plan::SourceSpec;
    use crate::domain::record::{RosterEntry, SourceKind, SourceRecord, SourceValue};
    use crate::domain::retry::RetryPolicy;
    use crate::infrastructure::config::{MoodleConfig, SourceSettings};
    use crate::ports::source::RawPayload;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Payload bodies are "email|name|answer" lines; "FAIL" as id always fails transiently.
    #[derive(Default)]
    struct FakeFetcher {
        bodies: HashMap<String, String>,
        roster: Vec<RosterEntry>,
        calls: AtomicUsize,
        roster_calls: AtomicUsize,
        reject_login: bool,
    }

    impl FakeFetcher {
        fn with(sources: &[(&str, &str)]) -> Self {
            Self {
                bodies: sources
                    .iter()
                    .map(|(id, body)| (id.to_string(), body.to_string()))
                    .collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl SourceFetcher for FakeFetcher {
        async fn authenticate(&self) -> Result<(), SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.reject_login {
                return Err(InfrastructureError::Authentication("bad password".into()).into());
            }
            Ok(())
        }

        async fn fetch_source(&self, source: &SourceSpec) -> Result<RawPayload, SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.bodies.get(&source.id) {
                Some(body) => Ok(RawPayload {
                    kind: source.kind,
                    body: body.clone(),
                }),
                None => Err(InfrastructureError::TransientFetch("timeout".into()).into()),
            }
        }

        async fn fetch_roster(&self) -> Result<Vec<RosterEntry>, SyncError> {
            self.roster_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.roster.clone())
        }
    }

    struct LineParser;

    impl RecordParser for LineParser {
        fn parse(
            &self,
            _source: &SourceSpec,
            payload: &RawPayload,
        ) -> Result<Vec<SourceRecord>, SyncError> {
            Ok(payload
                .body
                .lines()
                .filter(|l| !l.is_empty())
                .map(|line| {
                    let parts: Vec<&str> = line.split('|').collect();
                    SourceRecord::new(parts[0], parts[1], SourceValue::survey([parts[2]]))
                })
                .collect())
        }
    }

    #[derive(Default)]
    struct RecordingWriter {
        calls: Mutex<Vec<String>>,
        grid: Mutex<Grid>,
        failing_writes: AtomicUsize,
    }

    #[async_trait]
    impl SheetWriter for RecordingWriter {
        async fn write_table(&self, grid: &Grid) -> Result<(), SyncError> {
            self.calls.lock().unwrap().push("write_table".into());
            if self.failing_writes.load(Ordering::SeqCst) > 0 {
                self.failing_writes.fetch_sub(1, Ordering::SeqCst);
                return Err(InfrastructureError::Write("HTTP 503".into()).into());
            }
            *self.grid.lock().unwrap() = grid.clone();
            Ok(())
        }

        async fn stamp_timestamp(&self, value: &str) -> Result<(), SyncError> {
            self.calls.lock().unwrap().push(format!("stamp:{}", value));
            Ok(())
        }

        async fn append_history(&self, row: &[String]) -> Result<(), SyncError> {
            self.calls.lock().unwrap().push(format!("history:{}", row.join("|")));
            Ok(())
        }
    }

    fn config(ids: &[&str], labels: &[&str]) -> SyncConfig {
        SyncConfig {
            moodle: MoodleConfig::new("https://campus.example.org", "tutor", "secret", 42),
            sources: SourceSettings {
                kind: SourceKind::Survey,
                ids: ids.iter().map(|s| s.to_string()).collect(),
                labels: labels.iter().map(|s| s.to_string()).collect(),
            },
            retry: RetryPolicy::immediate(3),
            roster_enrichment: false,
        }
    }

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn test_two_sources_end_to_end() {
        let fetcher = FakeFetcher::with(&[
            ("10", "a@x.com|Ana|yes\n"),
            ("11", "a@x.com|Ana|no\nb@x.com|Ben|yes\n"),
        ]);
        let writer = RecordingWriter::default();
        let report = run_sync(
            &fetcher,
            &LineParser,
            &writer,
            &config(&["10", "11"], &["Q1", "Q2"]),
            "2024-05-06 10:15:00",
        )
        .await
        .unwrap();

        assert_eq!(report.rows, 2);
        assert_eq!(report.columns, 4);
        assert_eq!(report.degraded().count(), 0);
        assert_eq!(
            *writer.grid.lock().unwrap(),
            vec![
                row(&["Nombre Completo", "Email", "Q1", "Q2"]),
                row(&["Ana", "a@x.com", "yes", "no"]),
                row(&["Ben", "b@x.com", "", "yes"]),
            ]
        );
        assert_eq!(
            *writer.calls.lock().unwrap(),
            vec![
                "write_table".to_string(),
                "stamp:Actualizado el: 2024-05-06 10:15:00".to_string(),
                "history:Ejecución registrada el:|2024-05-06 10:15:00".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_mismatched_lists_fail_before_any_call() {
        let fetcher = FakeFetcher::with(&[("10", "a@x.com|Ana|yes\n")]);
        let writer = RecordingWriter::default();
        let err = run_sync(
            &fetcher,
            &LineParser,
            &writer,
            &config(&["10", "11"], &["Q1"]),
            "now",
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Domain(DomainError::SourceMismatch { ids: 2, labels: 1 })
        ));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
        assert!(writer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_degraded_source_leaves_blank_columns() {
        // "11" has no body: every attempt times out.
        let fetcher = FakeFetcher::with(&[("10", "a@x.com|Ana|yes\n")]);
        let writer = RecordingWriter::default();
        let report = run_sync(
            &fetcher,
            &LineParser,
            &writer,
            &config(&["10", "11"], &["Q1", "Q2"]),
            "now",
        )
        .await
        .unwrap();

        let degraded: Vec<&SourceOutcome> = report.degraded().collect();
        assert_eq!(degraded.len(), 1);
        assert_eq!(degraded[0].label, "Q2");
        assert_eq!(degraded[0].attempts, 3);
        // login + 1 + 3 attempts
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 5);
        assert_eq!(
            writer.grid.lock().unwrap()[1],
            row(&["Ana", "a@x.com", "yes", ""])
        );
    }

    #[tokio::test]
    async fn test_all_sources_degraded_writes_nothing() {
        let fetcher = FakeFetcher::default();
        let writer = RecordingWriter::default();
        let err = run_sync(
            &fetcher,
            &LineParser,
            &writer,
            &config(&["10", "11"], &["Q1", "Q2"]),
            "now",
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SyncError::AllSourcesFailed(2)));
        assert!(writer.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_login_aborts_without_retry() {
        let fetcher = FakeFetcher {
            reject_login: true,
            ..FakeFetcher::with(&[("10", "a@x.com|Ana|yes\n")])
        };
        let err = collect_table(&fetcher, &LineParser, &config(&["10"], &["Q1"]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Infrastructure(InfrastructureError::Authentication(_))
        ));
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_write_exhaustion_is_fatal() {
        let fetcher = FakeFetcher::with(&[("10", "a@x.com|Ana|yes\n")]);
        let writer = RecordingWriter {
            failing_writes: AtomicUsize::new(3),
            ..Default::default()
        };
        let err = run_sync(
            &fetcher,
            &LineParser,
            &writer,
            &config(&["10"], &["Q1"]),
            "now",
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Infrastructure(InfrastructureError::Write(ref m)) if m.contains("exhausted")
        ));
        // Neither the stamp nor the history row were written.
        assert_eq!(writer.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_write_recovers_after_transient_failure() {
        let fetcher = FakeFetcher::with(&[("10", "a@x.com|Ana|yes\n")]);
        let writer = RecordingWriter {
            failing_writes: AtomicUsize::new(2),
            ..Default::default()
        };
        run_sync(
            &fetcher,
            &LineParser,
            &writer,
            &config(&["10"], &["Q1"]),
            "now",
        )
        .await
        .unwrap();

        assert_eq!(writer.calls.lock().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_roster_fills_blank_names() {
        let mut fetcher = FakeFetcher::with(&[("10", "a@x.com||yes\nb@x.com|Ben|no\n")]);
        fetcher.roster = vec![
            RosterEntry {
                email: "A@X.com".into(),
                full_name: "Ana Pérez".into(),
            },
            RosterEntry {
                email: "b@x.com".into(),
                full_name: "Benjamín Ruiz".into(),
            },
            RosterEntry {
                email: "z@x.com".into(),
                full_name: "Zoe".into(),
            },
        ];
        let mut cfg = config(&["10"], &["Q1"]);
        cfg.roster_enrichment = true;

        let collected = collect_table(&fetcher, &LineParser, &cfg).await.unwrap();

        assert_eq!(collected.names_filled, 1);
        assert_eq!(collected.table.len(), 2);
        assert_eq!(collected.table.row("a@x.com").unwrap().full_name, "Ana Pérez");
        assert_eq!(collected.table.row("b@x.com").unwrap().full_name, "Ben");
        assert_eq!(fetcher.roster_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_roster_skipped_when_disabled() {
        let fetcher = FakeFetcher::with(&[("10", "a@x.com||yes\n")]);
        let collected = collect_table(&fetcher, &LineParser, &config(&["10"], &["Q1"]))
            .await
            .unwrap();

        assert_eq!(collected.names_filled, 0);
        assert_eq!(fetcher.roster_calls.load(Ordering::SeqCst), 0);
    }
}
