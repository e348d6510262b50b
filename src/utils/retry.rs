use anyhow::{Error, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::{future::Future, time::Duration};
use tokio::time::sleep;
use tracing::{error, warn};

use crate::utils::strip_html;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 8,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            exponential: 2.0,
        }
    }
}

impl RetryConfig {
    /// Exponential backoff with full jitter, capped at `max_delay_ms`.
    /// https://aws.amazon.com/blogs/architecture/exponential-backoff-and-jitter/
    fn next_delay(&self, delay_ms: u64) -> u64 {
        let grown = delay_ms as f64 * self.exponential;
        let jittered = (fastrand::f64() * grown) as u64;
        jittered.clamp(self.base_delay_ms.min(self.max_delay_ms), self.max_delay_ms)
    }
}

/// Run `operation` until it succeeds or `max_attempts` is reached.
///
/// `context` names the operation in logs.
pub async fn retry<F, Fut, T>(operation: F, config: &RetryConfig, context: &str) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 1;
    let mut delay = config.base_delay_ms;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let message = strip_html(&e.to_string());
                if attempt >= config.max_attempts {
                    error!(
                        "Operation '{}' failed after {} attempts. Final error: {}",
                        context, attempt, message
                    );
                    return Err(anyhow!(message).context(format!(
                        "'{}' failed after {} attempts",
                        context, attempt
                    )));
                }

                warn!(
                    "Attempt {}/{} for '{}' failed: {}. Retrying in {}ms...",
                    attempt, config.max_attempts, context, message, delay
                );

                sleep(Duration::from_millis(delay)).await;
                delay = config.next_delay(delay);
                attempt += 1;
            }
        }
    }
}
