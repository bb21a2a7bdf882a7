//! Network identity rotation through a local VPN control service.
//!
//! `observe -> trigger reset -> settle -> poll until running -> observe ->
//! compare`. Success means a non-empty identity that differs from the one
//! observed before the reset. Every failure is reported and mapped to
//! `false`; nothing here panics or propagates.

use std::time::Duration;

use tokio::time::Instant;

use crate::backoff::BackoffPolicy;
use crate::config::IdentityConfig;
use crate::error::AppError;
use crate::report::{CrawlEvent, CrawlReporter};
use crate::traits::HttpTransport;

/// Status reported by the control service once the tunnel is up.
pub const RUNNING_STATUS: &str = "running";

enum Rotation {
    Changed { old: String, new: String },
    Unchanged { identity: String },
}

/// Drives the control service and confirms the public identity changed.
#[derive(Clone)]
pub struct IdentityRotator<T, R> {
    transport: T,
    config: IdentityConfig,
    reporter: R,
}

impl<T: HttpTransport, R: CrawlReporter> IdentityRotator<T, R> {
    pub fn new(transport: T, config: IdentityConfig, reporter: R) -> Self {
        Self {
            transport,
            config,
            reporter,
        }
    }

    /// Rotate the egress identity. Returns `true` only when a fresh,
    /// different identity was confirmed.
    pub async fn reset_identity(&self) -> bool {
        let started = Instant::now();
        let outcome = self.rotate().await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(Rotation::Changed { old, new }) => {
                self.reporter.report(CrawlEvent::IdentityRotated {
                    old: &old,
                    new: &new,
                    elapsed,
                });
                true
            }
            Ok(Rotation::Unchanged { identity }) => {
                self.reporter.report(CrawlEvent::IdentityUnchanged {
                    identity: &identity,
                    elapsed,
                });
                false
            }
            Err(error) => {
                self.reporter.report(CrawlEvent::IdentityResetFailed {
                    error: &error,
                    elapsed,
                });
                false
            }
        }
    }

    async fn rotate(&self) -> Result<Rotation, AppError> {
        let old = self.observe_identity().await?;
        self.trigger_reset().await;
        tokio::time::sleep(Duration::from_secs(self.config.settle_secs)).await;
        self.wait_until_ready().await?;
        let new = self.observe_identity().await?;

        if !new.is_empty() && new != old {
            Ok(Rotation::Changed { old, new })
        } else {
            Ok(Rotation::Unchanged { identity: new })
        }
    }

    /// Current public identity, trying each lookup endpoint in order.
    ///
    /// Makes up to `lookup_attempts` passes over the endpoints, backing off
    /// (doubling, capped at 60s) after every failed check except the last.
    pub async fn observe_identity(&self) -> Result<String, AppError> {
        let endpoints = self.config.lookup_endpoints();
        if endpoints.is_empty() {
            return Err(AppError::IdentityError(
                "no identity lookup endpoints configured".into(),
            ));
        }

        let backoff = BackoffPolicy::new(Duration::from_secs(self.config.lookup_backoff_secs));
        let mut delay = backoff.first();
        let total_checks = endpoints.len() * self.config.lookup_attempts.max(1) as usize;

        for (check, endpoint) in endpoints.iter().cycle().take(total_checks).enumerate() {
            match self.lookup(endpoint).await {
                Ok(identity) => {
                    self.reporter.report(CrawlEvent::IdentityObserved {
                        endpoint,
                        identity: &identity,
                    });
                    return Ok(identity);
                }
                Err(error) => {
                    self.reporter
                        .report(CrawlEvent::IdentityLookupFailed { endpoint, error: &error });
                    if check + 1 < total_checks {
                        tokio::time::sleep(delay).await;
                        delay = backoff.next_delay(delay);
                    }
                }
            }
        }

        Err(AppError::IdentityError(format!(
            "could not observe public identity after {total_checks} checks"
        )))
    }

    async fn lookup(&self, endpoint: &str) -> Result<String, AppError> {
        let body = self
            .transport
            .get(endpoint, None)
            .await?
            .into_success(endpoint)?;
        parse_identity(&body)
    }

    /// Ask the control service to stop the tunnel. Only logged, never validated.
    async fn trigger_reset(&self) {
        let url = self.config.status_url();
        let body = serde_json::json!({ "status": "stopped" });
        match self.transport.put(&url, &body).await {
            Ok(response) => {
                let outcome = serde_json::from_str::<serde_json::Value>(&response.body)
                    .ok()
                    .and_then(|v| v.get("outcome").and_then(|o| o.as_str()).map(str::to_string))
                    .unwrap_or_else(|| format!("HTTP {}", response.status));
                self.reporter
                    .report(CrawlEvent::ResetTriggered { outcome: &outcome });
            }
            Err(error) => {
                self.reporter.report(CrawlEvent::ControlRequestFailed {
                    url: &url,
                    error: &error,
                });
            }
        }
    }

    /// Poll the status endpoint until it reports running or the timeout elapses.
    pub async fn wait_until_ready(&self) -> Result<(), AppError> {
        let timeout = Duration::from_secs(self.config.poll_timeout_secs);
        let deadline = Instant::now() + timeout;
        let backoff = BackoffPolicy::new(Duration::from_secs(self.config.poll_interval_secs));
        let mut delay = backoff.first();

        loop {
            let status = match self.status().await {
                Ok(status) if status == RUNNING_STATUS => return Ok(()),
                Ok(status) => status,
                Err(error) => {
                    self.reporter.report(CrawlEvent::ControlRequestFailed {
                        url: &self.config.status_url(),
                        error: &error,
                    });
                    "unreachable".to_string()
                }
            };

            let now = Instant::now();
            if now >= deadline {
                return Err(AppError::IdentityError(format!(
                    "control service not running after {}s (last status: {status})",
                    timeout.as_secs()
                )));
            }
            let wait = delay.min(deadline - now);
            self.reporter.report(CrawlEvent::AwaitingControlService {
                status: &status,
                next_check: wait,
            });
            tokio::time::sleep(wait).await;
            delay = backoff.next_delay(delay);
        }
    }

    async fn status(&self) -> Result<String, AppError> {
        let url = self.config.status_url();
        let body = self.transport.get(&url, None).await?.into_success(&url)?;
        let value: serde_json::Value = serde_json::from_str(&body)?;
        value
            .get("status")
            .and_then(|s| s.as_str())
            .map(str::to_string)
            .ok_or_else(|| AppError::IdentityError("status response has no 'status' field".into()))
    }
}

/// Extract the identity from a `{"public_ip": ..}` or `{"ip": ..}` body.
pub fn parse_identity(body: &str) -> Result<String, AppError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    ["public_ip", "ip"]
        .iter()
        .find_map(|field| value.get(*field).and_then(|v| v.as_str()))
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::IdentityError("lookup response has no ip field".into()))
}
