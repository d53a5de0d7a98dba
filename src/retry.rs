//! Bounded retry around a single repository's external operation.
use std::path::PathBuf;

use tokio::time::{sleep, Duration};

use crate::backoff::BackoffPolicy;
use crate::runner::{run_attempt, AttemptResult, ExternalOp};

/// Attempt budget and deadlines shared by every retry loop in a run.
#[derive(Debug, Clone, Copy)]
pub struct RetrySettings {
    /// Total attempts per item (1 initial + retries).
    pub max_attempts: u32,

    /// Hard deadline for each attempt.
    pub task_timeout: Duration,

    /// Delay policy between attempts.
    pub backoff: BackoffPolicy,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            task_timeout: Duration::from_secs(300),
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Terminal per-item state after the retry loop finishes.
#[derive(Debug)]
pub struct OutcomeRecord {
    /// Repository identifier.
    pub item: String,

    /// Whether any attempt succeeded.
    pub succeeded: bool,

    /// Attempts actually made.
    pub attempts: u32,

    /// Reason of the last failed attempt.
    pub last_error: Option<String>,

    /// Log file with the last attempt's captured output, if any.
    pub log_path: Option<PathBuf>,
}

impl OutcomeRecord {
    /// Record for an item that never ran its operation.
    pub(crate) fn skipped(item: String, reason: &str) -> Self {
        Self {
            item,
            succeeded: false,
            attempts: 0,
            last_error: Some(reason.to_string()),
            log_path: None,
        }
    }
}

/// Run `op` for `item` until it succeeds or the attempt budget is spent.
///
/// The backoff policy is consulted before each retry, never before the
/// first attempt. Permanent failures (4xx responses and the like) stop the
/// loop early; retrying them cannot help.
pub async fn run_with_retry(
    item: &str,
    op: &dyn ExternalOp,
    settings: &RetrySettings,
) -> OutcomeRecord {
    let mut last_error = None;
    let mut attempt = 0;
    while attempt < settings.max_attempts {
        attempt += 1;
        match run_attempt(op, settings.task_timeout).await {
            AttemptResult::Success => {
                return OutcomeRecord {
                    item: item.to_string(),
                    succeeded: true,
                    attempts: attempt,
                    last_error: None,
                    log_path: op.log_path().map(PathBuf::from),
                };
            }
            AttemptResult::TimedOut => {
                log::error!(
                    "{item}: timeout after {}s (attempt {attempt})",
                    settings.task_timeout.as_secs()
                );
                last_error = Some(format!(
                    "timed out after {}s",
                    settings.task_timeout.as_secs()
                ));
            }
            AttemptResult::Failure(e) => {
                log::error!("{item}: {e} (attempt {attempt})");
                let permanent = !e.is_transient();
                last_error = Some(e.to_string());
                if permanent {
                    break;
                }
            }
        }
        if attempt < settings.max_attempts {
            let duration = settings.backoff.jittered(attempt);
            log::info!(
                "{item}: backing off {:.1}s, try {attempt}...",
                duration.as_secs_f64()
            );
            sleep(duration).await;
        }
    }
    OutcomeRecord {
        item: item.to_string(),
        succeeded: false,
        attempts: attempt,
        last_error,
        log_path: op.log_path().map(PathBuf::from),
    }
}
