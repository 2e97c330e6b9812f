use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::config::ModelConfig;
use crate::error::Result;

/// Bounded retry with linear backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    pub fn from_config(cfg: &ModelConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            backoff: Duration::from_millis(cfg.retry_backoff_ms),
        }
    }

    pub async fn retry<F, Fut, T>(&self, label: &str, mut f: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match f(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_retries => {
                    tracing::warn!(%label, attempt, error = %err, "retrying after failure");
                    attempt += 1;
                    sleep(self.backoff * attempt).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_until_success() {
        let policy = RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);
        let res = policy
            .retry("test", |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 1 {
                        Err(AgentError::LanguageModel("fail".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(res.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let policy = RetryPolicy {
            max_retries: 1,
            backoff: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);
        let res: Result<()> = policy
            .retry("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AgentError::LanguageModel("down".into())) }
            })
            .await;
        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn none_runs_once() {
        let calls = AtomicU32::new(0);
        let _: Result<()> = RetryPolicy::none()
            .retry("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AgentError::LanguageModel("down".into())) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
