//! Crawl progress reporting.
//!
//! Components never log directly; they emit [`CrawlEvent`]s through an
//! injected [`CrawlReporter`]. The CLI installs [`TracingCrawlReporter`],
//! tests install a recorder.

use std::time::Duration;

use uuid::Uuid;

use crate::error::AppError;

/// Events emitted while crawling.
#[derive(Debug)]
pub enum CrawlEvent<'a> {
    // Fetcher
    RequestFailed {
        url: &'a str,
        attempt: u32,
        max_attempts: u32,
        error: &'a AppError,
    },
    BackingOff {
        url: &'a str,
        delay: Duration,
        rate_limited: bool,
    },
    PolitenessDelay {
        url: &'a str,
        delay: Duration,
    },
    FetchExhausted {
        url: &'a str,
        attempts: u32,
    },

    // Search pages
    PageScraped {
        url: &'a str,
        cards: usize,
    },
    RoundFinished {
        round: u32,
        user_agent: &'a str,
        succeeded: u32,
        attempted: u32,
    },
    CardsCollected {
        succeeded: u32,
        attempted: u32,
        cards: usize,
    },
    StageCompleted {
        stage: &'a str,
        remaining: usize,
    },

    // Enrichment
    NewJob {
        title: &'a str,
        company: &'a str,
        url: &'a str,
    },
    StaleJob {
        url: &'a str,
        posted_date: &'a str,
    },
    UnparseableDate {
        url: &'a str,
        posted_date: &'a str,
    },
    UnsupportedLanguage {
        url: &'a str,
        language: &'a str,
    },
    DescriptionsMissing {
        missing: usize,
        enriched: usize,
    },

    // Identity rotation
    IdentityObserved {
        endpoint: &'a str,
        identity: &'a str,
    },
    IdentityLookupFailed {
        endpoint: &'a str,
        error: &'a AppError,
    },
    ResetTriggered {
        outcome: &'a str,
    },
    ControlRequestFailed {
        url: &'a str,
        error: &'a AppError,
    },
    AwaitingControlService {
        status: &'a str,
        next_check: Duration,
    },
    IdentityRotated {
        old: &'a str,
        new: &'a str,
        elapsed: Duration,
    },
    IdentityUnchanged {
        identity: &'a str,
        elapsed: Duration,
    },
    IdentityResetFailed {
        error: &'a AppError,
        elapsed: Duration,
    },

    // Persistence
    Persisted {
        table: &'a str,
        offered: usize,
        inserted: usize,
    },
    CrawlFinished {
        run_id: Uuid,
        accepted: usize,
        filtered: usize,
        elapsed: Duration,
    },
}

impl CrawlEvent<'_> {
    /// Stable snake_case name, handy for assertions and metrics keys.
    pub fn kind(&self) -> &'static str {
        match self {
            CrawlEvent::RequestFailed { .. } => "request_failed",
            CrawlEvent::BackingOff { .. } => "backing_off",
            CrawlEvent::PolitenessDelay { .. } => "politeness_delay",
            CrawlEvent::FetchExhausted { .. } => "fetch_exhausted",
            CrawlEvent::PageScraped { .. } => "page_scraped",
            CrawlEvent::RoundFinished { .. } => "round_finished",
            CrawlEvent::CardsCollected { .. } => "cards_collected",
            CrawlEvent::StageCompleted { .. } => "stage_completed",
            CrawlEvent::NewJob { .. } => "new_job",
            CrawlEvent::StaleJob { .. } => "stale_job",
            CrawlEvent::UnparseableDate { .. } => "unparseable_date",
            CrawlEvent::UnsupportedLanguage { .. } => "unsupported_language",
            CrawlEvent::DescriptionsMissing { .. } => "descriptions_missing",
            CrawlEvent::IdentityObserved { .. } => "identity_observed",
            CrawlEvent::IdentityLookupFailed { .. } => "identity_lookup_failed",
            CrawlEvent::ResetTriggered { .. } => "reset_triggered",
            CrawlEvent::ControlRequestFailed { .. } => "control_request_failed",
            CrawlEvent::AwaitingControlService { .. } => "awaiting_control_service",
            CrawlEvent::IdentityRotated { .. } => "identity_rotated",
            CrawlEvent::IdentityUnchanged { .. } => "identity_unchanged",
            CrawlEvent::IdentityResetFailed { .. } => "identity_reset_failed",
            CrawlEvent::Persisted { .. } => "persisted",
            CrawlEvent::CrawlFinished { .. } => "crawl_finished",
        }
    }
}

/// Receives crawl events. The default implementation discards them.
pub trait CrawlReporter: Send + Sync + Clone {
    fn report(&self, event: CrawlEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCrawlReporter;

impl CrawlReporter for TracingCrawlReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        tracing::trace!(event = event.kind(), "crawl event");
        match event {
            CrawlEvent::RequestFailed {
                url,
                attempt,
                max_attempts,
                error,
            } => {
                tracing::warn!(%url, attempt, max_attempts, %error, "Request failed");
            }
            CrawlEvent::BackingOff {
                url,
                delay,
                rate_limited,
            } => {
                tracing::info!(
                    %url,
                    delay_secs = delay.as_secs_f64(),
                    rate_limited,
                    "Retrying after backoff"
                );
            }
            CrawlEvent::PolitenessDelay { url, delay } => {
                tracing::debug!(%url, delay_ms = delay.as_millis() as u64, "Politeness delay");
            }
            CrawlEvent::FetchExhausted { url, attempts } => {
                tracing::error!(%url, attempts, "Failed to retrieve page, giving up");
            }
            CrawlEvent::PageScraped { url, cards } => {
                tracing::info!(%url, cards, "Finished scraping search page");
            }
            CrawlEvent::RoundFinished {
                round,
                user_agent,
                succeeded,
                attempted,
            } => {
                tracing::info!(
                    round,
                    %user_agent,
                    "{succeeded}/{attempted} - {}% successful request rate",
                    percent(succeeded, attempted)
                );
            }
            CrawlEvent::CardsCollected {
                succeeded,
                attempted,
                cards,
            } => {
                tracing::info!(
                    cards,
                    "{succeeded}/{attempted} - {}% successful request rate overall",
                    percent(succeeded, attempted)
                );
            }
            CrawlEvent::StageCompleted { stage, remaining } => {
                tracing::info!(%stage, remaining, "Filter stage complete");
            }
            CrawlEvent::NewJob {
                title,
                company,
                url,
            } => {
                tracing::info!(%title, %company, %url, "Found new job");
            }
            CrawlEvent::StaleJob { url, posted_date } => {
                tracing::debug!(%url, %posted_date, "Skipping posting outside recency window");
            }
            CrawlEvent::UnparseableDate { url, posted_date } => {
                tracing::warn!(%url, %posted_date, "Posting date is not YYYY-MM-DD, keeping posting");
            }
            CrawlEvent::UnsupportedLanguage { url, language } => {
                tracing::info!(%url, %language, "Job description language not supported");
            }
            CrawlEvent::DescriptionsMissing { missing, enriched } => {
                tracing::info!("Jobs without descriptions: {missing}/{enriched}");
            }
            CrawlEvent::IdentityObserved { endpoint, identity } => {
                tracing::info!(%endpoint, %identity, "Observed public identity");
            }
            CrawlEvent::IdentityLookupFailed { endpoint, error } => {
                tracing::warn!(%endpoint, %error, "Identity lookup failed");
            }
            CrawlEvent::ResetTriggered { outcome } => {
                tracing::info!(%outcome, "Control service acknowledged reset");
            }
            CrawlEvent::ControlRequestFailed { url, error } => {
                tracing::warn!(%url, %error, "Control service request failed");
            }
            CrawlEvent::AwaitingControlService { status, next_check } => {
                tracing::info!(
                    %status,
                    next_check_secs = next_check.as_secs(),
                    "Waiting for control service to report running"
                );
            }
            CrawlEvent::IdentityRotated { old, new, elapsed } => {
                tracing::info!(
                    %old,
                    %new,
                    elapsed_secs = elapsed.as_secs_f64(),
                    "Identity rotated"
                );
            }
            CrawlEvent::IdentityUnchanged { identity, elapsed } => {
                tracing::error!(
                    %identity,
                    elapsed_secs = elapsed.as_secs_f64(),
                    "Identity unchanged after reset"
                );
            }
            CrawlEvent::IdentityResetFailed { error, elapsed } => {
                tracing::error!(
                    %error,
                    elapsed_secs = elapsed.as_secs_f64(),
                    "Identity reset failed"
                );
            }
            CrawlEvent::Persisted {
                table,
                offered,
                inserted,
            } => {
                tracing::info!(%table, offered, inserted, "Persisted postings");
            }
            CrawlEvent::CrawlFinished {
                run_id,
                accepted,
                filtered,
                elapsed,
            } => {
                tracing::info!(
                    %run_id,
                    accepted,
                    filtered,
                    elapsed_secs = elapsed.as_secs_f64(),
                    "Crawl finished"
                );
            }
        }
    }
}

fn percent(succeeded: u32, attempted: u32) -> u32 {
    if attempted == 0 {
        0
    } else {
        succeeded * 100 / attempted
    }
}
