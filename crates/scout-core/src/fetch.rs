//! Retrying page fetcher.
//!
//! Wraps an [`HttpTransport`] with exponential backoff on failures and a
//! randomized politeness pause after every success. Transient failures never
//! escape: callers get `Some(body)` or `None` ("no data").

use std::time::Duration;

use crate::backoff::{BackoffPolicy, DEFAULT_BACKOFF_CAP};
use crate::config::FetchSettings;
use crate::report::{CrawlEvent, CrawlReporter};
use crate::traits::HttpTransport;

/// Jitter, cap and politeness bounds shared by every fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchPolicy {
    pub backoff_jitter: Duration,
    pub backoff_cap: Duration,
    pub politeness_min: Duration,
    pub politeness_max: Duration,
}

impl Default for FetchPolicy {
    /// Up to 2s of backoff jitter, 60s cap, 1-3s politeness pause.
    fn default() -> Self {
        Self {
            backoff_jitter: Duration::from_secs(2),
            backoff_cap: DEFAULT_BACKOFF_CAP,
            politeness_min: Duration::from_secs(1),
            politeness_max: Duration::from_secs(3),
        }
    }
}

impl FetchPolicy {
    pub fn from_settings(settings: &FetchSettings) -> Self {
        Self {
            backoff_jitter: Duration::from_millis(settings.backoff_jitter_ms),
            backoff_cap: Duration::from_secs(settings.backoff_cap_secs),
            politeness_min: Duration::from_millis(settings.politeness_min_ms),
            politeness_max: Duration::from_millis(settings.politeness_max_ms),
        }
    }

    fn backoff(&self, initial: Duration) -> BackoffPolicy {
        BackoffPolicy::new(initial)
            .with_jitter(self.backoff_jitter)
            .with_cap(self.backoff_cap)
    }

    /// Uniform in `[politeness_min, politeness_max]`.
    fn politeness_delay(&self) -> Duration {
        let min = self.politeness_min.as_millis() as u64;
        let max = self.politeness_max.as_millis() as u64;
        if max <= min {
            return self.politeness_min;
        }
        Duration::from_millis(rand::random_range(min..=max))
    }
}

/// GET with retry, backoff, rate-limit handling and politeness pacing.
#[derive(Clone)]
pub struct RetryingFetcher<T, R> {
    transport: T,
    policy: FetchPolicy,
    reporter: R,
}

impl<T: HttpTransport, R: CrawlReporter> RetryingFetcher<T, R> {
    pub fn new(transport: T, policy: FetchPolicy, reporter: R) -> Self {
        Self {
            transport,
            policy,
            reporter,
        }
    }

    /// Fetch `url`, retrying up to `max_attempts` times.
    ///
    /// After a failed attempt the current backoff is slept, then the backoff
    /// grows to `min(backoff * 2 + jitter, cap)`. There is no sleep after the
    /// final attempt. A 2xx answer is followed by one politeness pause.
    pub async fn fetch(
        &self,
        url: &str,
        user_agent: Option<&str>,
        max_attempts: u32,
        initial_backoff: Duration,
    ) -> Option<String> {
        let backoff = self.policy.backoff(initial_backoff);
        let mut delay = backoff.first();

        for attempt in 1..=max_attempts {
            let result = self
                .transport
                .get(url, user_agent)
                .await
                .and_then(|response| response.into_success(url));

            match result {
                Ok(body) => {
                    let pause = self.policy.politeness_delay();
                    self.reporter
                        .report(CrawlEvent::PolitenessDelay { url, delay: pause });
                    tokio::time::sleep(pause).await;
                    return Some(body);
                }
                Err(error) => {
                    self.reporter.report(CrawlEvent::RequestFailed {
                        url,
                        attempt,
                        max_attempts,
                        error: &error,
                    });
                    if attempt == max_attempts {
                        break;
                    }
                    self.reporter.report(CrawlEvent::BackingOff {
                        url,
                        delay,
                        rate_limited: error.is_rate_limit(),
                    });
                    tokio::time::sleep(delay).await;
                    delay = backoff.next_delay(delay);
                }
            }
        }

        self.reporter.report(CrawlEvent::FetchExhausted {
            url,
            attempts: max_attempts,
        });
        None
    }
}
