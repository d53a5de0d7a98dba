//! Single-attempt execution under a hard deadline.
use std::path::Path;
use std::pin::Pin;

use tokio::time::{timeout, Duration};

use crate::errors::DroverError;

/// One idempotent-on-retry unit of external work (a git subprocess or a
/// hosting-provider HTTP call) for a single repository.
pub trait ExternalOp: Send + Sync {
    /// Run one attempt. Local state (an already-present mirror directory)
    /// must be re-read on every call, never cached from a prior attempt.
    fn attempt(
        &self,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DroverError>> + Send + '_>>;

    /// Log file holding the attempt's captured output, if any.
    fn log_path(&self) -> Option<&Path> {
        None
    }
}

/// Outcome of one attempt.
#[derive(Debug)]
pub enum AttemptResult {
    /// The operation completed without error.
    Success,

    /// The operation failed before the deadline.
    Failure(DroverError),

    /// The operation was cancelled at the deadline.
    TimedOut,
}

/// Run one attempt of `op`, cancelling it at the deadline.
///
/// Cancellation drops the operation's future: subprocesses are spawned with
/// kill-on-drop and in-flight HTTP requests are aborted, so nothing keeps
/// running in the background after a timeout.
pub async fn run_attempt(op: &dyn ExternalOp, deadline: Duration) -> AttemptResult {
    match timeout(deadline, op.attempt()).await {
        Ok(Ok(())) => AttemptResult::Success,
        Ok(Err(e)) => AttemptResult::Failure(e),
        Err(_) => AttemptResult::TimedOut,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tokio::time::sleep;

    /// Fake operation completing after a fixed delay.
    pub(crate) struct FakeOp {
        /// How long the operation runs.
        pub delay: Duration,
        /// Whether it reports success.
        pub ok: bool,
    }

    impl ExternalOp for FakeOp {
        fn attempt(
            &self,
        ) -> Pin<Box<dyn std::future::Future<Output = Result<(), DroverError>> + Send + '_>>
        {
            Box::pin(async move {
                sleep(self.delay).await;
                if self.ok {
                    Ok(())
                } else {
                    Err(DroverError::from("fake failure").transient())
                }
            })
        }
    }

    #[tokio::test]
    async fn success_within_deadline() {
        let op = FakeOp {
            delay: Duration::from_millis(5),
            ok: true,
        };
        assert!(matches!(
            run_attempt(&op, Duration::from_secs(1)).await,
            AttemptResult::Success
        ));
    }

    #[tokio::test]
    async fn failure_within_deadline() {
        let op = FakeOp {
            delay: Duration::from_millis(5),
            ok: false,
        };
        match run_attempt(&op, Duration::from_secs(1)).await {
            AttemptResult::Failure(e) => assert!(e.to_string().contains("fake failure")),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn deadline_expiry() {
        let op = FakeOp {
            delay: Duration::from_secs(10),
            ok: true,
        };
        assert!(matches!(
            run_attempt(&op, Duration::from_millis(20)).await,
            AttemptResult::TimedOut
        ));
    }
}
