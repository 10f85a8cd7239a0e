use std::future::Future;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::CapabilityError;

/// Per-attempt timeout plus bounded exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            timeout: Duration::from_secs(config.call_timeout_secs.max(1)),
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// Run `op` under the policy. Only transient failures (including timeouts)
/// are retried; the last error is returned once attempts run out.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    capability: &'static str,
    mut op: F,
) -> Result<T, CapabilityError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CapabilityError>>,
{
    let mut attempt = 1u32;
    let mut delay = policy.base_delay;

    loop {
        let result = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(CapabilityError::Timeout {
                capability,
                secs: policy.timeout.as_secs(),
            }),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts => {
                tracing::warn!(
                    "{capability} attempt {attempt}/{} failed: {e}; retrying in {delay:?}",
                    policy.max_attempts
                );
                tokio::time::sleep(delay).await;
                delay = delay.saturating_mul(2);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
