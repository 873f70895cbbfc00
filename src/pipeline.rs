//! Fetch-classify-aggregate driver.
//!
//! The driver pulls journals from the [`Paginator`] until the budget of
//! qualifying journals is spent or the walk ends, classifying each one and
//! folding qualifying journals into the [`Tables`]. A failed page request
//! ends the run early with whatever was counted so far.

use crate::analysis::{accumulate, classify, Tables};
use crate::fetch::{Paginator, StopReason, Transport};
use crate::models::RunSummary;
use indicatif::ProgressBar;
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Initializing,
    Fetching,
    Finished,
    Aborted,
}

/// The run was cancelled before it finished; nothing it counted is kept.
#[derive(Debug, Error)]
#[error("run interrupted after {processed} journal(s) were counted")]
pub struct Interrupted {
    pub processed: usize,
}

/// Everything a finished run hands to the report writers.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub tables: Tables,
    /// Journals pulled from the paginator, qualifying or not.
    pub fetched: usize,
    /// Qualifying journals counted.
    pub processed: usize,
    /// Journals pulled but skipped for lack of license data.
    pub skipped: usize,
    pub pages: u32,
    pub stop_reason: StopReason,
}

impl PipelineOutput {
    pub fn summary(&self, limit: usize, note: impl Into<String>) -> RunSummary {
        RunSummary::new(self.fetched, self.processed, limit, note)
    }

    /// True when the run ended on a failed request rather than normally.
    pub fn is_partial(&self) -> bool {
        matches!(self.stop_reason, StopReason::TransportFailed { .. })
    }
}

pub struct Pipeline {
    limit: usize,
    state: PipelineState,
    progress: Option<ProgressBar>,
}

impl Pipeline {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            state: PipelineState::Initializing,
            progress: None,
        }
    }

    /// Report the running count on a spinner.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    #[cfg(test)]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    fn transition(&mut self, next: PipelineState) {
        debug!("Pipeline {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run until the budget is spent, the walk ends, or `shutdown` resolves.
    pub async fn run<T, S>(
        &mut self,
        paginator: &mut Paginator<'_, T>,
        shutdown: S,
    ) -> Result<PipelineOutput, Interrupted>
    where
        T: Transport + ?Sized,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let mut tables = Tables::new();
        let mut processed = 0usize;
        let mut skipped = 0usize;

        self.transition(PipelineState::Fetching);
        info!("Fetching DOAJ journals (limit {})...", self.limit);

        loop {
            if processed >= self.limit {
                paginator.stop_with_budget_reached();
                break;
            }

            let next = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    self.transition(PipelineState::Aborted);
                    if let Some(ref pb) = self.progress {
                        pb.abandon_with_message("Interrupted");
                    }
                    return Err(Interrupted { processed });
                }
                record = paginator.next_record() => record,
            };

            let Some(record) = next else {
                break;
            };

            match classify(&record) {
                Some(category) => {
                    accumulate(category, &record, &mut tables);
                    processed += 1;
                    if let Some(ref pb) = self.progress {
                        pb.set_message(format!("{} licensed journals counted", processed));
                    }
                }
                None => {
                    skipped += 1;
                    debug!("Skipping journal without license information");
                }
            }
        }

        self.transition(PipelineState::Finished);
        if let Some(ref pb) = self.progress {
            pb.finish_and_clear();
        }

        let stop_reason = paginator
            .stop_reason()
            .cloned()
            .unwrap_or(StopReason::Exhausted);

        if let StopReason::TransportFailed { page, .. } = &stop_reason {
            warn!(
                "Stopped early at page {}; keeping {} journal(s) counted so far",
                page, processed
            );
        }
        info!(
            "Finished: {} journals fetched, {} counted, {} skipped ({})",
            paginator.records_yielded(),
            processed,
            skipped,
            stop_reason
        );

        Ok(PipelineOutput {
            tables,
            fetched: paginator.records_yielded(),
            processed,
            skipped,
            pages: paginator.pages_fetched(),
            stop_reason,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::paginator::tests::{no_delay, ScriptedTransport};
    use crate::fetch::transport::TransportError;
    use crate::models::{LicenseCategory, UNKNOWN_YEAR};
    use serde_json::{json, Value};

    fn licensed(kind: &str) -> Value {
        json!({
            "bibjson": {
                "license": [{ "type": kind }],
                "subject": [{ "code": "Q", "term": "Science" }],
                "language": ["EN"],
                "oa_start": 2015
            }
        })
    }

    async fn run_to_completion(
        pipeline: &mut Pipeline,
        paginator: &mut Paginator<'_, ScriptedTransport>,
    ) -> PipelineOutput {
        pipeline
            .run(paginator, std::future::pending::<()>())
            .await
            .unwrap()
    }

    fn unlicensed() -> Value {
        json!({ "bibjson": { "language": ["EN"], "oa_start": 2015 } })
    }

    async fn run_pages(pages: Vec<Vec<Value>>, limit: usize) -> (PipelineOutput, usize) {
        let transport = ScriptedTransport::pages(pages);
        let mut paginator = Paginator::new(&transport, "u", no_delay());
        let mut pipeline = Pipeline::new(limit);
        let output = run_to_completion(&mut pipeline, &mut paginator).await;
        assert_eq!(pipeline.state(), PipelineState::Finished);
        (output, transport.request_count())
    }

    #[tokio::test]
    async fn test_three_page_scenario() {
        let pages = vec![
            vec![licensed("CC BY"), licensed("CC BY")],
            vec![licensed("CC0"), unlicensed()],
            vec![licensed("CC BY")],
        ];

        let (output, _) = run_pages(pages, 5).await;

        let license: Vec<_> = output
            .tables
            .license
            .iter()
            .map(|(c, n)| (c.label(), *n))
            .collect();
        assert_eq!(license, vec![("CC BY", 3), ("CC0", 1)]);
        assert_eq!(output.processed, 4);
        assert_eq!(output.skipped, 1);
        assert_eq!(output.fetched, 5);
        assert_eq!(output.stop_reason, StopReason::Exhausted);
    }

    #[tokio::test]
    async fn test_failure_on_second_page_keeps_first_page() {
        let transport = ScriptedTransport::new(vec![
            Ok(json!({ "results": [licensed("CC BY"), licensed("CC BY-NC")] })),
            Err(TransportError::Timeout {
                url: "u".to_string(),
                seconds: 30,
            }),
            Ok(json!({ "results": [licensed("CC0")] })),
        ]);
        let mut paginator = Paginator::new(&transport, "u", no_delay());
        let mut pipeline = Pipeline::new(1000);

        let output = run_to_completion(&mut pipeline, &mut paginator).await;

        assert_eq!(pipeline.state(), PipelineState::Finished);
        assert!(output.is_partial());
        assert_eq!(output.processed, 2);
        assert_eq!(output.tables.license_count(LicenseCategory::By), 1);
        assert_eq!(output.tables.license_count(LicenseCategory::ByNc), 1);
        assert_eq!(output.tables.license_count(LicenseCategory::Cc0), 0);

        let summary = output.summary(1000, "partial");
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.limit, 1000);
    }

    #[tokio::test]
    async fn test_processed_never_exceeds_budget() {
        for limit in 0..8 {
            let pages = vec![
                vec![licensed("CC BY"), unlicensed(), licensed("CC BY-SA")],
                vec![licensed("CC0"), licensed("CC BY")],
                vec![unlicensed(), licensed("CC BY-ND")],
            ];
            let (output, _) = run_pages(pages, limit).await;
            assert!(output.processed <= limit, "limit {}", limit);
            assert_eq!(output.processed, limit.min(5));
        }
    }

    #[tokio::test]
    async fn test_zero_budget_fetches_nothing() {
        let (output, requests) = run_pages(vec![vec![licensed("CC BY")]], 0).await;
        assert_eq!(requests, 0);
        assert_eq!(output.processed, 0);
        assert_eq!(output.stop_reason, StopReason::BudgetReached);
    }

    #[tokio::test]
    async fn test_budget_truncates_mid_page_without_next_request() {
        let pages = vec![
            vec![licensed("CC BY"), licensed("CC BY"), licensed("CC BY")],
            vec![licensed("CC0")],
        ];
        let (output, requests) = run_pages(pages, 2).await;

        assert_eq!(output.processed, 2);
        assert_eq!(output.fetched, 2);
        assert_eq!(requests, 1);
        assert_eq!(output.stop_reason, StopReason::BudgetReached);
    }

    #[tokio::test]
    async fn test_unlicensed_records_touch_no_table() {
        let (output, _) = run_pages(vec![vec![unlicensed(), unlicensed()]], 10).await;

        assert_eq!(output.processed, 0);
        assert!(output.tables.license.is_empty());
        assert!(output.tables.language.is_empty());
        assert!(output.tables.year.is_empty());
        assert!(output.tables.subject.is_empty());
    }

    #[tokio::test]
    async fn test_unrecognized_license_counts_once_under_catch_all() {
        let record = json!({
            "bibjson": {
                "license": [{ "type": "Publisher's own license" }],
                "subject": [{ "code": "L", "term": "Education" }],
                "language": ["ES"]
            }
        });
        let (output, _) = run_pages(vec![vec![record]], 10).await;
        let tables = &output.tables;
        let catch_all = LicenseCategory::UnknownLegalTool;

        assert_eq!(tables.license_count(catch_all), 1);
        assert_eq!(tables.subject.total(catch_all), 1);
        assert_eq!(tables.language.get(catch_all, "ES"), 1);
        assert_eq!(tables.year.get(catch_all, UNKNOWN_YEAR), 1);
    }

    #[tokio::test]
    async fn test_table_totals_agree() {
        let pages = vec![
            vec![licensed("CC BY"), unlicensed(), licensed("CC BY")],
            vec![
                json!({ "bibjson": { "license": [{ "type": "CC BY" }] } }),
                licensed("CC BY-NC-ND"),
            ],
        ];
        let (output, _) = run_pages(pages, 100).await;
        let tables = &output.tables;

        for (category, count) in &tables.license {
            assert_eq!(tables.year.total(*category), *count);
            let covered = tables.subject_coverage.get(category).copied().unwrap_or(0);
            assert!(covered <= *count);
        }
        assert_eq!(tables.total_licensed() as usize, output.processed);
        assert_eq!(tables.subject_coverage[&LicenseCategory::By], 2);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_run() {
        let transport = ScriptedTransport::pages(vec![vec![licensed("CC BY")]]);
        let mut paginator = Paginator::new(&transport, "u", no_delay());
        let mut pipeline = Pipeline::new(10);

        let result = pipeline.run(&mut paginator, std::future::ready(())).await;

        assert!(result.is_err());
        assert_eq!(pipeline.state(), PipelineState::Aborted);
    }

    #[test]
    fn test_new_pipeline_is_initializing() {
        assert_eq!(Pipeline::new(5).state(), PipelineState::Initializing);
    }
}
