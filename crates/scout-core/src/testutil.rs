//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{JobPosting, MISSING_DESCRIPTION, SalaryRange};
use crate::reconcile::{JobIndex, records_to_append};
use crate::report::{CrawlEvent, CrawlReporter};
use crate::traits::{Extractor, HttpResponse, HttpTransport, JobStore, LanguageDetector};

// ---------------------------------------------------------------------------
// MockTransport
// ---------------------------------------------------------------------------

/// One request seen by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub url: String,
    pub user_agent: Option<String>,
    pub body: Option<serde_json::Value>,
}

type Script = Arc<Mutex<HashMap<(&'static str, String), VecDeque<Result<HttpResponse, AppError>>>>>;

/// Mock transport with scripted responses per `(method, url)`.
///
/// Each call pops the next scripted response; the last one is repeated
/// once the queue is down to a single entry. Unscripted URLs fail with a
/// network error.
#[derive(Clone, Default)]
pub struct MockTransport {
    script: Script,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, url: &str, response: HttpResponse) -> Self {
        self.with_responses(url, vec![Ok(response)])
    }

    pub fn with_responses(self, url: &str, responses: Vec<Result<HttpResponse, AppError>>) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(("GET", url.to_string()), responses.into());
        self
    }

    pub fn with_put_response(self, url: &str, response: HttpResponse) -> Self {
        self.script
            .lock()
            .unwrap()
            .insert(("PUT", url.to_string()), VecDeque::from([Ok(response)]));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self, url: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url == url)
            .count()
    }

    fn respond(&self, method: &'static str, url: &str) -> Result<HttpResponse, AppError> {
        let mut script = self.script.lock().unwrap();
        let Some(queue) = script.get_mut(&(method, url.to_string())) else {
            return Err(AppError::NetworkError(format!("no scripted response for {method} {url}")));
        };
        if queue.len() > 1 {
            return queue.pop_front().unwrap();
        }
        match queue.front() {
            Some(Ok(response)) => Ok(response.clone()),
            Some(Err(error)) => Err(replay_error(error)),
            None => Err(AppError::NetworkError("script exhausted".into())),
        }
    }
}

fn replay_error(error: &AppError) -> AppError {
    match error {
        AppError::NetworkError(msg) => AppError::NetworkError(msg.clone()),
        AppError::Timeout(secs) => AppError::Timeout(*secs),
        AppError::RateLimited { url } => AppError::RateLimited { url: url.clone() },
        AppError::HttpError(msg) => AppError::HttpError(msg.clone()),
        other => AppError::HttpError(other.to_string()),
    }
}

impl HttpTransport for MockTransport {
    async fn get(&self, url: &str, user_agent: Option<&str>) -> Result<HttpResponse, AppError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: "GET",
            url: url.to_string(),
            user_agent: user_agent.map(str::to_string),
            body: None,
        });
        self.respond("GET", url)
    }

    async fn put(&self, url: &str, body: &serde_json::Value) -> Result<HttpResponse, AppError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method: "PUT",
            url: url.to_string(),
            user_agent: None,
            body: Some(body.clone()),
        });
        self.respond("PUT", url)
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor keyed by the exact payload string.
#[derive(Clone, Default)]
pub struct MockExtractor {
    cards: Arc<Mutex<HashMap<String, Vec<JobPosting>>>>,
    details: Arc<Mutex<HashMap<String, (String, SalaryRange)>>>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cards(self, payload: &str, cards: Vec<JobPosting>) -> Self {
        self.cards.lock().unwrap().insert(payload.to_string(), cards);
        self
    }

    pub fn with_detail(self, payload: &str, description: &str, salary: SalaryRange) -> Self {
        self.details
            .lock()
            .unwrap()
            .insert(payload.to_string(), (description.to_string(), salary));
        self
    }
}

impl Extractor for MockExtractor {
    fn parse_search_results(&self, payload: &str) -> Vec<JobPosting> {
        self.cards
            .lock()
            .unwrap()
            .get(payload)
            .cloned()
            .unwrap_or_default()
    }

    fn parse_description(&self, payload: &str) -> String {
        self.details
            .lock()
            .unwrap()
            .get(payload)
            .map(|(description, _)| description.clone())
            .unwrap_or_else(|| MISSING_DESCRIPTION.to_string())
    }

    fn parse_salary(&self, payload: &str) -> SalaryRange {
        self.details
            .lock()
            .unwrap()
            .get(payload)
            .map(|(_, salary)| *salary)
            .unwrap_or(SalaryRange::UNKNOWN)
    }
}

// ---------------------------------------------------------------------------
// FixedLanguageDetector
// ---------------------------------------------------------------------------

/// Detector returning a fixed language, optionally failing on empty input.
#[derive(Clone)]
pub struct FixedLanguageDetector {
    language: Option<String>,
    fail_on_empty: bool,
}

impl FixedLanguageDetector {
    /// Always detects `language`.
    pub fn new(language: &str) -> Self {
        Self {
            language: Some(language.to_string()),
            fail_on_empty: false,
        }
    }

    /// Detects `language` for non-empty text, fails on empty text.
    pub fn for_non_empty(language: &str) -> Self {
        Self {
            language: Some(language.to_string()),
            fail_on_empty: true,
        }
    }

    /// Always fails.
    pub fn failing() -> Self {
        Self {
            language: None,
            fail_on_empty: true,
        }
    }
}

impl LanguageDetector for FixedLanguageDetector {
    fn detect(&self, text: &str) -> Result<String, AppError> {
        if self.fail_on_empty && text.trim().is_empty() {
            return Err(AppError::LanguageDetection("empty text".into()));
        }
        self.language
            .clone()
            .ok_or_else(|| AppError::LanguageDetection("unknown".into()))
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory job store with the same append semantics as the SQLite store.
#[derive(Clone, Default)]
pub struct MockStore {
    tables: Arc<Mutex<HashMap<String, Vec<JobPosting>>>>,
    loaded_at: Arc<Mutex<HashMap<String, DateTime<Utc>>>>,
    failing: bool,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn with_table(self, name: &str, jobs: Vec<JobPosting>) -> Self {
        self.tables.lock().unwrap().insert(name.to_string(), jobs);
        self
    }

    /// Contents of `name`, empty if the table does not exist.
    pub fn table(&self, name: &str) -> Vec<JobPosting> {
        self.tables
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Timestamp of the last persist into `name`.
    pub fn loaded_at(&self, name: &str) -> Option<DateTime<Utc>> {
        self.loaded_at.lock().unwrap().get(name).copied()
    }

    fn check(&self) -> Result<(), AppError> {
        if self.failing {
            Err(AppError::DatabaseError("store unavailable".into()))
        } else {
            Ok(())
        }
    }
}

impl JobStore for MockStore {
    async fn load_known(&self, table: &str) -> Result<Vec<JobPosting>, AppError> {
        self.check()?;
        Ok(self.table(table))
    }

    async fn persist(
        &self,
        records: &[JobPosting],
        table: &str,
        loaded_at: DateTime<Utc>,
    ) -> Result<usize, AppError> {
        self.check()?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        let existing = JobIndex::from_jobs(rows.iter());
        let new: Vec<JobPosting> = records_to_append(&existing, records)
            .into_iter()
            .cloned()
            .collect();
        let inserted = new.len();
        rows.extend(new);
        self.loaded_at
            .lock()
            .unwrap()
            .insert(table.to_string(), loaded_at);
        Ok(inserted)
    }
}

// ---------------------------------------------------------------------------
// RecordingReporter
// ---------------------------------------------------------------------------

/// Reporter that records event kinds (and backoff delays) for assertions.
#[derive(Clone, Default)]
pub struct RecordingReporter {
    events: Arc<Mutex<Vec<&'static str>>>,
    backoffs: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, kind: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|k| **k == kind)
            .count()
    }

    pub fn backoff_delays(&self) -> Vec<Duration> {
        self.backoffs.lock().unwrap().clone()
    }
}

impl CrawlReporter for RecordingReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        if let CrawlEvent::BackingOff { delay, .. } = &event {
            self.backoffs.lock().unwrap().push(*delay);
        }
        self.events.lock().unwrap().push(event.kind());
    }
}
