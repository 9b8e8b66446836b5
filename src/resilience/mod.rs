//! Polling of endpoints that answer "202 Accepted" while a job is still processing.
//!
//! Model derivative manifests, metadata and property trees are generated lazily; until
//! they are ready the service answers 202. [`ProcessingPoller`] re-issues the request
//! after a fixed delay until something other than 202 arrives or the attempt budget is
//! spent.

use crate::errors::{ForgeResult, ProcessingError};
use crate::transport::HttpResponse;
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Poll configuration for "202 Accepted" responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between two requests.
    pub delay: Duration,
    /// Maximum number of requests, including the first. `None` polls forever.
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            delay: crate::config::DEFAULT_PROCESSING_RETRY_DELAY,
            max_attempts: Some(crate::config::DEFAULT_MAX_PROCESSING_ATTEMPTS),
        }
    }
}

/// Re-issues a request while it answers "202 Accepted".
pub struct ProcessingPoller {
    config: PollConfig,
}

impl ProcessingPoller {
    /// Creates a new poller.
    pub fn new(config: PollConfig) -> Self {
        Self { config }
    }

    /// Runs `operation` until it yields a non-202 response.
    ///
    /// Errors from `operation` are returned immediately. Sleeping uses the tokio timer,
    /// so dropping the returned future stops the loop.
    pub async fn execute<F, Fut>(&self, url: &str, mut operation: F) -> ForgeResult<HttpResponse>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ForgeResult<HttpResponse>>,
    {
        let mut attempts: u32 = 0;

        loop {
            let response = operation().await?;
            attempts += 1;

            if response.status != StatusCode::ACCEPTED {
                return Ok(response);
            }

            if let Some(max) = self.config.max_attempts {
                if attempts >= max {
                    warn!(url = %url, attempts, "Giving up on processing job");
                    return Err(ProcessingError::NotReady {
                        url: url.to_string(),
                        attempts,
                    }
                    .into());
                }
            }

            debug!(url = %url, attempts, delay_ms = self.config.delay.as_millis() as u64, "Job still processing");
            tokio::time::sleep(self.config.delay).await;
        }
    }
}
