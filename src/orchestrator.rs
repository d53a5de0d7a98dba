//! Bounded-concurrency execution of one retry loop per repository.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{timeout_at, Duration, Instant};

use crate::retry::{run_with_retry, OutcomeRecord, RetrySettings};
use crate::runner::ExternalOp;

/// How one item's failure affects its siblings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FailurePolicy {
    /// Failures are isolated; every item runs to a terminal outcome.
    Isolate,

    /// After the first failure no further item starts its operation.
    /// Repository creation and deletion use this: continuing a batch
    /// against a misconfigured org or token only multiplies the damage.
    FailFast,
}

/// Runs one retry loop per work item under a concurrency gate and
/// aggregates the terminal outcome of every item.
pub struct Orchestrator {
    /// Maximum operations executing at once.
    concurrency: usize,

    /// Retry budget shared by all items.
    settings: RetrySettings,

    /// Optional bound on the whole join phase.
    join_deadline: Option<Duration>,

    /// Sibling-failure policy.
    policy: FailurePolicy,
}

impl Orchestrator {
    /// Create an orchestrator admitting `concurrency` operations at once.
    pub fn new(concurrency: usize, settings: RetrySettings) -> Self {
        Self {
            concurrency: concurrency.max(1),
            settings,
            join_deadline: None,
            policy: FailurePolicy::Isolate,
        }
    }

    /// Stop admitting new items after the first failure.
    pub fn fail_fast(mut self) -> Self {
        self.policy = FailurePolicy::FailFast;
        self
    }

    /// Bound the whole run; items still unfinished at the deadline are
    /// cancelled and recorded as timed out, never silently dropped.
    pub fn with_join_deadline(mut self, deadline: Duration) -> Self {
        self.join_deadline = Some(deadline);
        self
    }

    /// Run every `(name, operation)` pair to a terminal outcome.
    ///
    /// Spawning is not gated; each task acquires a permit before running
    /// its operation and holds it across all retries for that item.
    /// Exactly one record per item is returned, in input order.
    pub async fn run(&self, work: Vec<(String, Box<dyn ExternalOp>)>) -> Vec<OutcomeRecord> {
        let gate = Arc::new(Semaphore::new(self.concurrency));
        let aborted = Arc::new(AtomicBool::new(false));
        let fail_fast = self.policy == FailurePolicy::FailFast;
        let total = work.len();
        let mut names = Vec::with_capacity(total);
        let mut set: JoinSet<(usize, OutcomeRecord)> = JoinSet::new();
        for (idx, (name, op)) in work.into_iter().enumerate() {
            names.push(name.clone());
            let gate = gate.clone();
            let aborted = aborted.clone();
            let settings = self.settings;
            set.spawn(async move {
                let _permit = match gate.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return (idx, OutcomeRecord::skipped(name, "concurrency gate closed"));
                    }
                };
                if fail_fast && aborted.load(Ordering::SeqCst) {
                    return (
                        idx,
                        OutcomeRecord::skipped(name, "skipped after an earlier failure"),
                    );
                }
                let record = run_with_retry(&name, op.as_ref(), &settings).await;
                if fail_fast && !record.succeeded {
                    aborted.store(true, Ordering::SeqCst);
                }
                (idx, record)
            });
        }

        let mut slots: Vec<Option<OutcomeRecord>> = (0..total).map(|_| None).collect();
        match self.join_deadline {
            Some(deadline) => {
                let deadline = Instant::now() + deadline;
                loop {
                    match timeout_at(deadline, set.join_next()).await {
                        Ok(Some(Ok((idx, record)))) => slots[idx] = Some(record),
                        Ok(Some(Err(e))) => log::error!("worker task failed: {e}"),
                        Ok(None) => break,
                        Err(_) => {
                            log::error!("overall deadline reached, cancelling unfinished items");
                            set.abort_all();
                            while let Some(res) = set.join_next().await {
                                if let Ok((idx, record)) = res {
                                    slots[idx] = Some(record);
                                }
                            }
                            break;
                        }
                    }
                }
            }
            None => {
                while let Some(res) = set.join_next().await {
                    match res {
                        Ok((idx, record)) => slots[idx] = Some(record),
                        Err(e) => log::error!("worker task failed: {e}"),
                    }
                }
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.unwrap_or_else(|| {
                    OutcomeRecord::skipped(
                        names[idx].clone(),
                        "cancelled at the overall deadline",
                    )
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::backoff::BackoffPolicy;
    use crate::errors::DroverError;
    use std::pin::Pin;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    /// Fake operation tracking how many instances run concurrently.
    struct GaugedOp {
        /// Currently running instances.
        current: Arc<AtomicUsize>,
        /// Highest concurrency observed.
        peak: Arc<AtomicUsize>,
        /// Total attempts started, across all instances.
        started: Arc<AtomicUsize>,
        /// How long one attempt runs.
        delay: Duration,
        /// Whether attempts succeed.
        ok: bool,
    }

    impl ExternalOp for GaugedOp {
        fn attempt(
            &self,
        ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DroverError>> + Send + '_>>
        {
            Box::pin(async move {
                self.started.fetch_add(1, Ordering::SeqCst);
                let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                sleep(self.delay).await;
                self.current.fetch_sub(1, Ordering::SeqCst);
                if self.ok {
                    Ok(())
                } else {
                    Err(DroverError::from("gauged failure"))
                }
            })
        }
    }

    /// Shared gauges plus a factory for ops wired to them.
    struct Gauges {
        /// Currently running instances.
        current: Arc<AtomicUsize>,
        /// Highest concurrency observed.
        peak: Arc<AtomicUsize>,
        /// Total attempts started.
        started: Arc<AtomicUsize>,
    }

    impl Gauges {
        fn new() -> Self {
            Self {
                current: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
                started: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn op(&self, delay: Duration, ok: bool) -> Box<dyn ExternalOp> {
            Box::new(GaugedOp {
                current: self.current.clone(),
                peak: self.peak.clone(),
                started: self.started.clone(),
                delay,
                ok,
            })
        }
    }

    /// Settings with sub-second timings for tests.
    fn fast_settings(max_attempts: u32, task_timeout: Duration) -> RetrySettings {
        RetrySettings {
            max_attempts,
            task_timeout,
            backoff: BackoffPolicy::new(Duration::from_millis(1), 0.3),
        }
    }

    #[tokio::test]
    async fn one_record_per_item() {
        for n in [0usize, 1, 7] {
            let gauges = Gauges::new();
            let work: Vec<_> = (0..n)
                .map(|i| {
                    (
                        format!("repo-{i}"),
                        gauges.op(Duration::from_millis(1), true),
                    )
                })
                .collect();
            let orch = Orchestrator::new(4, fast_settings(4, Duration::from_secs(1)));
            let records = orch.run(work).await;
            assert_eq!(records.len(), n);
            for (i, record) in records.iter().enumerate() {
                assert_eq!(record.item, format!("repo-{i}"));
                assert!(record.succeeded);
            }
        }
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_gate() {
        let gauges = Gauges::new();
        let work: Vec<_> = (0..6)
            .map(|i| {
                (
                    format!("repo-{i}"),
                    gauges.op(Duration::from_millis(30), true),
                )
            })
            .collect();
        let orch = Orchestrator::new(2, fast_settings(4, Duration::from_secs(1)));
        let records = orch.run(work).await;
        assert_eq!(records.len(), 6);
        assert!(gauges.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn timed_out_operations_release_their_permit() {
        // 3 items, 2 permits, operations that always exceed the deadline;
        // the third item must still get its attempt.
        let gauges = Gauges::new();
        let work: Vec<_> = (0..3)
            .map(|i| (format!("repo-{i}"), gauges.op(Duration::from_secs(5), true)))
            .collect();
        let orch = Orchestrator::new(2, fast_settings(1, Duration::from_millis(20)));
        let records = orch.run(work).await;
        assert_eq!(records.len(), 3);
        assert_eq!(gauges.started.load(Ordering::SeqCst), 3);
        for record in &records {
            assert!(!record.succeeded);
            let reason = record.last_error.as_deref().unwrap_or_default();
            assert!(reason.contains("timed out"), "got: {reason}");
        }
    }

    #[tokio::test]
    async fn fail_fast_skips_unstarted_items() {
        let gauges = Gauges::new();
        let work: Vec<_> = (0..3)
            .map(|i| {
                (
                    format!("repo-{i}"),
                    gauges.op(Duration::from_millis(5), false),
                )
            })
            .collect();
        let orch = Orchestrator::new(1, fast_settings(1, Duration::from_secs(1))).fail_fast();
        let records = orch.run(work).await;
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| !r.succeeded));
        let skipped = records
            .iter()
            .filter(|r| {
                r.attempts == 0
                    && r.last_error
                        .as_deref()
                        .unwrap_or_default()
                        .contains("skipped")
            })
            .count();
        assert_eq!(skipped, 2);
        assert_eq!(gauges.started.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn join_deadline_cancels_and_records() {
        let gauges = Gauges::new();
        let work: Vec<_> = (0..2)
            .map(|i| (format!("repo-{i}"), gauges.op(Duration::from_secs(5), true)))
            .collect();
        let orch = Orchestrator::new(2, fast_settings(4, Duration::from_secs(10)))
            .with_join_deadline(Duration::from_millis(40));
        let records = orch.run(work).await;
        assert_eq!(records.len(), 2);
        for record in &records {
            assert!(!record.succeeded);
            assert!(record
                .last_error
                .as_deref()
                .unwrap_or_default()
                .contains("deadline"));
        }
    }
}
