use std::future::Future;

use chrono::{DateTime, Utc};

use crate::error::AppError;
use crate::models::{JobPosting, SalaryRange};

/// Raw HTTP response as seen by the core: status code and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body of a 2xx response; 429 and other statuses become errors.
    pub fn into_success(self, url: &str) -> Result<String, AppError> {
        match self.status {
            _ if self.is_success() => Ok(self.body),
            429 => Err(AppError::RateLimited {
                url: url.to_string(),
            }),
            status => Err(AppError::HttpStatus {
                status,
                url: url.to_string(),
            }),
        }
    }
}

/// Single-shot HTTP transport. Retries live in [`crate::fetch::RetryingFetcher`].
///
/// Implementations return `Ok` for any status the server answered with and
/// reserve `Err` for transport failures (timeouts, refused connections).
pub trait HttpTransport: Send + Sync + Clone {
    /// GET `url`, optionally with a `User-Agent` header.
    fn get(
        &self,
        url: &str,
        user_agent: Option<&str>,
    ) -> impl Future<Output = Result<HttpResponse, AppError>> + Send;

    /// PUT a JSON body. Used for control-plane calls.
    fn put(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> impl Future<Output = Result<HttpResponse, AppError>> + Send;
}

/// Turns fetched pages into postings, descriptions and salary bounds.
///
/// Absent markup is never an error: an empty list, the
/// [`MISSING_DESCRIPTION`](crate::models::MISSING_DESCRIPTION) sentinel or
/// [`SalaryRange::UNKNOWN`] are returned instead.
pub trait Extractor: Send + Sync + Clone {
    fn parse_search_results(&self, payload: &str) -> Vec<JobPosting>;

    fn parse_description(&self, payload: &str) -> String;

    fn parse_salary(&self, payload: &str) -> SalaryRange;
}

/// `text -> ISO 639-1 code`. Fails on empty or ambiguous input.
pub trait LanguageDetector: Send + Sync + Clone {
    fn detect(&self, text: &str) -> Result<String, AppError>;
}

/// Persistent store of previously seen postings, addressed by table name.
pub trait JobStore: Send + Sync + Clone {
    /// All postings in `table`. A missing table is an empty set.
    fn load_known(
        &self,
        table: &str,
    ) -> impl Future<Output = Result<Vec<JobPosting>, AppError>> + Send;

    /// Append `records` to `table`, creating it if needed. Records whose
    /// `(title, company, posted_date)` already exist in the table are
    /// skipped. Returns the number of rows inserted.
    fn persist(
        &self,
        records: &[JobPosting],
        table: &str,
        loaded_at: DateTime<Utc>,
    ) -> impl Future<Output = Result<usize, AppError>> + Send;
}
