pub mod backoff;
pub mod config;
pub mod crawl;
pub mod error;
pub mod fetch;
pub mod filters;
pub mod headers;
pub mod identity;
pub mod models;
pub mod reconcile;
pub mod report;
pub mod traits;

#[cfg(test)]
pub mod testutil;

pub use config::CrawlConfig;
pub use crawl::{CrawlOutcome, CrawlService};
pub use error::AppError;
pub use identity::IdentityRotator;
pub use models::{JobPosting, MISSING_DESCRIPTION, SalaryRange};
pub use report::{CrawlEvent, CrawlReporter, TracingCrawlReporter};
pub use traits::{Extractor, HttpResponse, HttpTransport, JobStore, LanguageDetector};
