use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tracing::warn;

use crate::config::GuardSection;

use super::error::{AutomationError, AutomationResult};
use super::session::SessionManager;

#[derive(Debug, Clone)]
pub struct GuardPolicy {
    pub timeout: Duration,
    pub max_retries: usize,
    pub backoff_base: Duration,
}

impl GuardPolicy {
    pub fn from_section(section: &GuardSection) -> Self {
        Self {
            timeout: Duration::from_millis(section.timeout_ms),
            max_retries: section.max_retries.max(1),
            backoff_base: Duration::from_millis(section.backoff_base_ms),
        }
    }
}

/// The uniform entry point for every externally invoked operation: deadline
/// race, bounded retry with linear backoff, and mandatory session teardown
/// on any timeout-classified failure.
///
/// Losing the race drops the operation future, which releases the session
/// lock before teardown runs; cancellation is cooperative and teardown stays
/// idempotent either way.
#[derive(Debug)]
pub struct ExecutionGuard {
    sessions: Arc<Mutex<SessionManager>>,
    policy: GuardPolicy,
}

impl ExecutionGuard {
    pub fn new(sessions: Arc<Mutex<SessionManager>>, policy: GuardPolicy) -> Self {
        Self { sessions, policy }
    }

    pub async fn execute<T, F, Fut>(&self, operation: &str, mut op: F) -> AutomationResult<T>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = AutomationResult<T>>,
    {
        let attempts = self.policy.max_retries;
        let mut last_error: Option<AutomationError> = None;
        for attempt in 1..=attempts {
            let outcome = match timeout(self.policy.timeout, op(attempt)).await {
                Ok(result) => result,
                Err(_) => Err(AutomationError::Timeout {
                    operation: operation.to_string(),
                    budget: self.policy.timeout,
                }),
            };
            match outcome {
                Ok(value) => return Ok(value),
                Err(err) => {
                    warn!(operation, attempt, error = %err, "guarded operation failed");
                    if err.is_timeout() {
                        self.teardown(operation).await;
                    }
                    if attempt < attempts {
                        {
                            let mut sessions = self.sessions.lock().await;
                            sessions.metrics_mut().record_retry();
                        }
                        sleep(self.policy.backoff_base * attempt as u32).await;
                    }
                    last_error = Some(err);
                }
            }
        }
        let source = last_error.unwrap_or_else(|| AutomationError::Configuration(
            "guard completed without recording an error".into(),
        ));
        Err(AutomationError::ExhaustedRetries {
            operation: operation.to_string(),
            attempts,
            source: Box::new(source),
        })
    }

    /// The browser process may be wedged after a deadline miss; drop the
    /// session and the cached accessibility snapshot rather than reuse it.
    async fn teardown(&self, operation: &str) {
        warn!(operation, "timeout detected, tearing down browser session");
        let mut sessions = self.sessions.lock().await;
        sessions.metrics_mut().record_timeout();
        sessions.metrics_mut().record_teardown();
        sessions.clear_snapshot_cache();
        sessions.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecoyConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn guard(timeout_ms: u64, max_retries: usize) -> ExecutionGuard {
        let sessions = Arc::new(Mutex::new(SessionManager::new(Arc::new(
            DecoyConfig::default(),
        ))));
        ExecutionGuard::new(
            sessions,
            GuardPolicy {
                timeout: Duration::from_millis(timeout_ms),
                max_retries,
                backoff_base: Duration::from_millis(1),
            },
        )
    }

    #[tokio::test]
    async fn always_failing_operation_runs_exactly_max_retries_times() {
        let guard = guard(1_000, 3);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_op = Arc::clone(&calls);
        let result: AutomationResult<()> = guard
            .execute("doomed", move |_| {
                let calls = Arc::clone(&calls_in_op);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(AutomationError::ElementNotFound("#missing".into()))
                }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match result {
            Err(AutomationError::ExhaustedRetries {
                attempts, source, ..
            }) => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, AutomationError::ElementNotFound(_)));
            }
            other => panic!("expected ExhaustedRetries, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let guard = guard(1_000, 3);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_op = Arc::clone(&calls);
        let result = guard
            .execute("flaky", move |_| {
                let calls = Arc::clone(&calls_in_op);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                        Err(AutomationError::Configuration("transient".into()))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(result, "done");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn timeout_tears_down_the_session_state() {
        let sessions = Arc::new(Mutex::new(SessionManager::new(Arc::new(
            DecoyConfig::default(),
        ))));
        {
            let mut mgr = sessions.lock().await;
            mgr.cache_snapshot(serde_json::json!({"nodes": []}));
        }
        let guard = ExecutionGuard::new(
            Arc::clone(&sessions),
            GuardPolicy {
                timeout: Duration::from_millis(10),
                max_retries: 1,
                backoff_base: Duration::from_millis(1),
            },
        );
        let result: AutomationResult<()> = guard
            .execute("stuck", |_| async {
                sleep(Duration::from_secs(5)).await;
                Ok(())
            })
            .await;
        assert!(result.is_err());
        assert!(result.as_ref().err().map(|e| e.is_timeout()).unwrap_or(false));

        let mgr = sessions.lock().await;
        assert!(!mgr.has_session());
        assert!(mgr.snapshot_cache().is_none());
        let metrics = mgr.metrics();
        assert_eq!(metrics.timeouts, 1);
        assert_eq!(metrics.teardowns, 1);
    }

    #[tokio::test]
    async fn retries_are_counted_in_metrics() {
        let sessions = Arc::new(Mutex::new(SessionManager::new(Arc::new(
            DecoyConfig::default(),
        ))));
        let guard = ExecutionGuard::new(
            Arc::clone(&sessions),
            GuardPolicy {
                timeout: Duration::from_millis(500),
                max_retries: 3,
                backoff_base: Duration::from_millis(1),
            },
        );
        let result: AutomationResult<()> = guard
            .execute("doomed", |_| async {
                Err(AutomationError::Configuration("nope".into()))
            })
            .await;
        assert!(result.is_err());
        let mgr = sessions.lock().await;
        assert_eq!(mgr.metrics().retries, 2);
    }
}
