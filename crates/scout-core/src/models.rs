use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Description text returned when a detail page has no description block.
pub const MISSING_DESCRIPTION: &str = "Could not find Job Description";

/// Date format used by posting cards (`YYYY-MM-DD`).
pub const POSTED_DATE_FORMAT: &str = "%Y-%m-%d";

/// A crawled listing candidate.
///
/// Created from a search-result card, enriched with description and salary
/// from the detail page, then persisted once. The four workflow flags are
/// reserved for downstream triage and always start at 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub title: String,
    pub company: String,
    pub location: String,
    /// Source format `YYYY-MM-DD`; empty when the card had no date.
    pub posted_date: String,
    /// Canonical detail URL, unique within a crawl.
    pub url: String,
    pub description: String,
    /// 0 = unknown
    pub min_salary: u64,
    /// 0 = unknown
    pub max_salary: u64,
    pub applied: u8,
    pub hidden: u8,
    pub interview: u8,
    pub rejected: u8,
}

impl JobPosting {
    /// Build a fresh posting from the fields available on a search card.
    pub fn from_card(
        title: impl Into<String>,
        company: impl Into<String>,
        location: impl Into<String>,
        posted_date: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            company: company.into(),
            location: location.into(),
            posted_date: posted_date.into(),
            url: url.into(),
            ..Self::default()
        }
    }

    /// The descriptive identity used when appending to an existing table.
    pub fn triple(&self) -> (&str, &str, &str) {
        (&self.title, &self.company, &self.posted_date)
    }

    pub fn posted_on(&self) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(self.posted_date.trim(), POSTED_DATE_FORMAT).ok()
    }

    pub fn salary(&self) -> SalaryRange {
        SalaryRange {
            min: self.min_salary,
            max: self.max_salary,
        }
    }

    pub fn set_salary(&mut self, range: SalaryRange) {
        self.min_salary = range.min;
        self.max_salary = range.max;
    }

    pub fn has_description(&self) -> bool {
        !self.description.is_empty() && self.description != MISSING_DESCRIPTION
    }
}

/// Salary bounds in whole currency units. `0` means unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: u64,
    pub max: u64,
}

impl SalaryRange {
    pub const UNKNOWN: SalaryRange = SalaryRange { min: 0, max: 0 };

    pub fn new(min: u64, max: u64) -> Self {
        Self { min, max }
    }

    /// Both bounds present.
    pub fn is_complete(&self) -> bool {
        self.min != 0 && self.max != 0
    }
}
