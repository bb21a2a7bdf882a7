//! Incremental ingest against previously persisted postings.
//!
//! Two identity checks are used on purpose:
//! - [`find_new_jobs`] treats a candidate as known if its URL **or** its
//!   `(title, company, posted_date)` triple is in either known set.
//! - [`records_to_append`] (used by stores when appending) only compares
//!   triples.

use std::collections::HashSet;

use crate::error::AppError;
use crate::models::JobPosting;
use crate::traits::JobStore;

type Triple = (String, String, String);

fn owned_triple(job: &JobPosting) -> Triple {
    let (title, company, posted_date) = job.triple();
    (title.to_owned(), company.to_owned(), posted_date.to_owned())
}

/// Membership index over URLs and descriptive triples.
#[derive(Debug, Clone, Default)]
pub struct JobIndex {
    urls: HashSet<String>,
    triples: HashSet<Triple>,
}

impl JobIndex {
    pub fn from_jobs<'a>(jobs: impl IntoIterator<Item = &'a JobPosting>) -> Self {
        let mut index = Self::default();
        for job in jobs {
            index.insert(job);
        }
        index
    }

    pub fn insert(&mut self, job: &JobPosting) {
        self.urls.insert(job.url.clone());
        self.triples.insert(owned_triple(job));
    }

    /// URL-or-triple identity.
    pub fn contains(&self, job: &JobPosting) -> bool {
        self.urls.contains(&job.url) || self.contains_triple(job)
    }

    pub fn contains_triple(&self, job: &JobPosting) -> bool {
        self.triples.contains(&owned_triple(job))
    }
}

/// Previously persisted postings, loaded once at run start.
#[derive(Debug, Clone, Default)]
pub struct KnownJobSets {
    pub accepted: JobIndex,
    pub filtered: JobIndex,
}

impl KnownJobSets {
    pub fn new(accepted: &[JobPosting], filtered: &[JobPosting]) -> Self {
        Self {
            accepted: JobIndex::from_jobs(accepted),
            filtered: JobIndex::from_jobs(filtered),
        }
    }

    pub fn is_known(&self, job: &JobPosting) -> bool {
        self.accepted.contains(job) || self.filtered.contains(job)
    }
}

/// Candidates known in neither set.
pub fn find_new_jobs(candidates: Vec<JobPosting>, known: &KnownJobSets) -> Vec<JobPosting> {
    candidates
        .into_iter()
        .filter(|job| !known.is_known(job))
        .collect()
}

/// Records of `batch` whose triple is absent from `existing`.
///
/// A triple repeated inside the batch is appended once.
pub fn records_to_append<'a>(existing: &JobIndex, batch: &'a [JobPosting]) -> Vec<&'a JobPosting> {
    let mut seen = HashSet::new();
    batch
        .iter()
        .filter(|job| !existing.contains_triple(job))
        .filter(|job| seen.insert(owned_triple(job)))
        .collect()
}

/// The reconciliation contract on top of a [`JobStore`].
#[derive(Clone)]
pub struct Reconciler<S> {
    store: S,
}

impl<S: JobStore> Reconciler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Load both known sets. Missing tables are empty sets.
    pub async fn load_known(
        &self,
        accepted_table: &str,
        filtered_table: &str,
    ) -> Result<KnownJobSets, AppError> {
        let accepted = self.store.load_known(accepted_table).await?;
        let filtered = self.store.load_known(filtered_table).await?;
        Ok(KnownJobSets::new(&accepted, &filtered))
    }

    pub async fn find_new_jobs(
        &self,
        candidates: Vec<JobPosting>,
        accepted_table: &str,
        filtered_table: &str,
    ) -> Result<Vec<JobPosting>, AppError> {
        let known = self.load_known(accepted_table, filtered_table).await?;
        Ok(find_new_jobs(candidates, &known))
    }

    pub async fn persist(
        &self,
        records: &[JobPosting],
        table: &str,
        loaded_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<usize, AppError> {
        self.store.persist(records, table, loaded_at).await
    }
}
