use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeDelta, Utc};
use rand::seq::SliceRandom;
use tokio::time::Instant;
use url::Url;
use uuid::Uuid;

use crate::config::{CrawlConfig, SearchQuery};
use crate::error::AppError;
use crate::fetch::{FetchPolicy, RetryingFetcher};
use crate::filters::{
    FilterRules, dedup, detect_or_default, filter_relevance, split_by_description,
    split_by_salary,
};
use crate::headers::HeaderRotation;
use crate::models::JobPosting;
use crate::reconcile::Reconciler;
use crate::report::{CrawlEvent, CrawlReporter};
use crate::traits::{Extractor, HttpTransport, JobStore, LanguageDetector};

/// Guest search endpoint returning job-card fragments.
pub const SEARCH_URL: &str =
    "https://www.linkedin.com/jobs-guest/jobs/api/seeMoreJobPostings/search";

/// Cards per search page; `start` advances by this much.
pub const RESULTS_PER_PAGE: u32 = 25;

/// Search page URL for `query` at zero-based `page`.
pub fn search_url(query: &SearchQuery, timespan: &str, page: u32) -> Result<String, AppError> {
    let start = (RESULTS_PER_PAGE * page).to_string();
    let url = Url::parse_with_params(
        SEARCH_URL,
        &[
            ("keywords", query.keywords.as_str()),
            ("location", query.location.as_str()),
            ("f_TPR", timespan),
            ("f_WT", query.work_type.as_str()),
            ("geoId", ""),
            ("start", start.as_str()),
        ],
    )
    .map_err(|e| AppError::ConfigError(format!("Invalid search URL: {e}")))?;
    Ok(url.into())
}

/// Result of one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub run_id: Uuid,
    /// Timestamp written to every row persisted by this run.
    pub loaded_at: DateTime<Utc>,
    /// Cards scraped before any filtering.
    pub cards: usize,
    /// Postings unknown to the store after card-level filtering.
    pub new_jobs: usize,
    pub accepted: Vec<JobPosting>,
    pub filtered: Vec<JobPosting>,
    pub elapsed: Duration,
}

/// Orchestrates one crawl: search pages -> cards -> dedup/relevance ->
/// reconcile -> detail pages -> description/salary filters -> persist.
///
/// Generic over every external collaborator so tests can run it without
/// network or database.
pub struct CrawlService<T, E, D, S, R>
where
    T: HttpTransport,
    E: Extractor,
    D: LanguageDetector,
    S: JobStore,
    R: CrawlReporter,
{
    fetcher: RetryingFetcher<T, R>,
    extractor: E,
    detector: D,
    reconciler: Reconciler<S>,
    config: CrawlConfig,
    rules: FilterRules,
    reporter: R,
}

impl<T, E, D, S, R> CrawlService<T, E, D, S, R>
where
    T: HttpTransport,
    E: Extractor,
    D: LanguageDetector,
    S: JobStore,
    R: CrawlReporter,
{
    pub fn new(
        transport: T,
        extractor: E,
        detector: D,
        store: S,
        config: CrawlConfig,
        reporter: R,
    ) -> Result<Self, AppError> {
        let rules = FilterRules::from_config(&config)?;
        let policy = FetchPolicy::from_settings(&config.fetch);
        Ok(Self {
            fetcher: RetryingFetcher::new(transport, policy, reporter.clone()),
            extractor,
            detector,
            reconciler: Reconciler::new(store),
            config,
            rules,
            reporter,
        })
    }

    /// Run a full crawl stamped with the current time.
    pub async fn run(&self) -> Result<CrawlOutcome, AppError> {
        self.run_at(Utc::now()).await
    }

    /// Run a full crawl as if it were `now`. Only store failures are errors.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<CrawlOutcome, AppError> {
        let started = Instant::now();
        let run_id = Uuid::new_v4();
        let mut headers = HeaderRotation::new(self.config.headers.clone());

        let cards = self.collect_cards(&mut headers).await?;
        let card_count = cards.len();

        let jobs = dedup(cards);
        self.stage("dedup", jobs.len());
        let jobs = filter_relevance(jobs, &self.rules, &self.detector);
        self.stage("title_company_language", jobs.len());

        let new_jobs = self
            .reconciler
            .find_new_jobs(
                jobs,
                &self.config.jobs_tablename,
                &self.config.filtered_jobs_tablename,
            )
            .await?;
        self.stage("new_against_store", new_jobs.len());
        let new_count = new_jobs.len();

        let (accepted, filtered) = if new_jobs.is_empty() {
            (Vec::new(), Vec::new())
        } else {
            let enriched = self.enrich(new_jobs, &mut headers, now).await;
            let (accepted, filtered) = self.partition(enriched);

            self.persist(&accepted, &self.config.jobs_tablename, now)
                .await?;
            self.persist(&filtered, &self.config.filtered_jobs_tablename, now)
                .await?;
            (accepted, filtered)
        };

        let elapsed = started.elapsed();
        self.reporter.report(CrawlEvent::CrawlFinished {
            run_id,
            accepted: accepted.len(),
            filtered: filtered.len(),
            elapsed,
        });

        Ok(CrawlOutcome {
            run_id,
            loaded_at: now,
            cards: card_count,
            new_jobs: new_count,
            accepted,
            filtered,
            elapsed,
        })
    }

    /// Scrape every search page of every query, `rounds` times over.
    ///
    /// Each round draws one user agent; pages within a query are visited in
    /// random order.
    async fn collect_cards(
        &self,
        headers: &mut HeaderRotation<String>,
    ) -> Result<Vec<JobPosting>, AppError> {
        let fetch = &self.config.fetch;
        let backoff = Duration::from_secs(fetch.search_backoff_secs);
        let mut cards = Vec::new();
        let (mut succeeded_total, mut attempted_total) = (0u32, 0u32);

        for round in 0..self.config.rounds {
            let user_agent = headers.next().unwrap_or_default();
            let (mut succeeded, mut attempted) = (0u32, 0u32);

            for query in &self.config.search_queries {
                let mut pages: Vec<u32> = (0..self.config.pages_to_scrape).collect();
                pages.shuffle(&mut rand::rng());

                for page in pages {
                    let url = search_url(query, &self.config.timespan, page)?;
                    attempted += 1;
                    let Some(body) = self
                        .fetcher
                        .fetch(&url, Some(&user_agent), fetch.search_attempts, backoff)
                        .await
                    else {
                        continue;
                    };
                    succeeded += 1;
                    let page_cards = self.extractor.parse_search_results(&body);
                    self.reporter.report(CrawlEvent::PageScraped {
                        url: &url,
                        cards: page_cards.len(),
                    });
                    cards.extend(page_cards);
                }
            }

            self.reporter.report(CrawlEvent::RoundFinished {
                round,
                user_agent: &user_agent,
                succeeded,
                attempted,
            });
            succeeded_total += succeeded;
            attempted_total += attempted;
        }

        self.reporter.report(CrawlEvent::CardsCollected {
            succeeded: succeeded_total,
            attempted: attempted_total,
            cards: cards.len(),
        });
        Ok(cards)
    }

    /// Fetch detail pages for recent postings and fill in description and
    /// salary. Postings whose detail page cannot be fetched are dropped.
    async fn enrich(
        &self,
        jobs: Vec<JobPosting>,
        headers: &mut HeaderRotation<String>,
        now: DateTime<Utc>,
    ) -> Vec<JobPosting> {
        let fetch = &self.config.fetch;
        let backoff = Duration::from_secs(fetch.detail_backoff_secs);
        // Out-of-range windows mean no cutoff.
        let cutoff = TimeDelta::try_days(self.config.days_to_scrape)
            .and_then(|window| now.naive_utc().checked_sub_signed(window));
        let mut enriched = Vec::with_capacity(jobs.len());
        let mut missing = 0usize;

        for mut job in jobs {
            match job.posted_on() {
                Some(date) if cutoff.is_some_and(|c| date.and_time(NaiveTime::MIN) < c) => {
                    self.reporter.report(CrawlEvent::StaleJob {
                        url: &job.url,
                        posted_date: &job.posted_date,
                    });
                    continue;
                }
                Some(_) => {}
                None => self.reporter.report(CrawlEvent::UnparseableDate {
                    url: &job.url,
                    posted_date: &job.posted_date,
                }),
            }

            self.reporter.report(CrawlEvent::NewJob {
                title: &job.title,
                company: &job.company,
                url: &job.url,
            });

            let user_agent = headers.next();
            let Some(body) = self
                .fetcher
                .fetch(&job.url, user_agent.as_deref(), fetch.detail_attempts, backoff)
                .await
            else {
                continue;
            };

            job.description = self.extractor.parse_description(&body);
            job.set_salary(self.extractor.parse_salary(&body));
            if !job.has_description() {
                missing += 1;
            }

            if !self.rules.languages.is_empty() {
                let language = detect_or_default(&self.detector, &job.description);
                if !self.rules.languages.contains(&language) {
                    self.reporter.report(CrawlEvent::UnsupportedLanguage {
                        url: &job.url,
                        language: &language,
                    });
                }
            }
            enriched.push(job);
        }

        self.reporter.report(CrawlEvent::DescriptionsMissing {
            missing,
            enriched: enriched.len(),
        });
        enriched
    }

    /// Split enriched postings into those passing the description and salary
    /// stages and everything else. Salary bounds found in a description stay
    /// on the posting whichever side it lands on.
    fn partition(&self, enriched: Vec<JobPosting>) -> (Vec<JobPosting>, Vec<JobPosting>) {
        let (described, mut filtered) = split_by_description(enriched, &self.rules);
        self.stage("description", described.len());
        let (accepted, underpaid) = split_by_salary(described, self.rules.salary_floor);
        self.stage("salary", accepted.len());

        filtered.extend(underpaid);
        (accepted, filtered)
    }

    async fn persist(
        &self,
        records: &[JobPosting],
        table: &str,
        loaded_at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let inserted = self.reconciler.persist(records, table, loaded_at).await?;
        self.reporter.report(CrawlEvent::Persisted {
            table,
            offered: records.len(),
            inserted,
        });
        Ok(())
    }

    fn stage(&self, stage: &str, remaining: usize) {
        self.reporter
            .report(CrawlEvent::StageCompleted { stage, remaining });
    }
}
