//! Job list filter stages.
//!
//! Every stage is a free function over `Vec<JobPosting>`. The crawl applies
//! them in order: [`dedup`], [`filter_relevance`], [`split_by_description`],
//! [`split_by_salary`]. The last two return `(kept, rejected)` so rejected
//! postings can still be stored. A stage whose word list is empty passes its
//! input through untouched.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

use crate::config::CrawlConfig;
use crate::error::AppError;
use crate::models::{JobPosting, SalaryRange};
use crate::traits::LanguageDetector;

/// Language assumed when detection fails.
pub const DEFAULT_LANGUAGE: &str = "en";

/// `$min - $max` or `$min to $max`, values optionally comma-grouped or `k`-suffixed.
static SALARY_RANGE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(
        r"\$\s*((?:\d{1,3}(?:,\d{3})+|\d+)(?:k)?)\s*(?:-|to)\s*\$\s*((?:\d{1,3}(?:,\d{3})+|\d+)(?:k)?)",
    )
    .case_insensitive(true)
    .build()
    .expect("salary range pattern is valid")
});

/// Word lists (lowercased) and compiled patterns used by the filter stages.
#[derive(Debug, Clone, Default)]
pub struct FilterRules {
    pub title_include: Vec<String>,
    pub title_exclude: Vec<String>,
    pub company_exclude: Vec<String>,
    pub languages: Vec<String>,
    pub desc_include: Vec<String>,
    pub desc_exclude: Vec<String>,
    pub desc_include_regex: Vec<Regex>,
    pub desc_exclude_regex: Vec<Regex>,
    pub salary_floor: u64,
}

impl FilterRules {
    pub fn from_config(config: &CrawlConfig) -> Result<Self, AppError> {
        Ok(Self {
            title_include: lowercase(&config.title_include),
            title_exclude: lowercase(&config.title_exclude),
            company_exclude: lowercase(&config.company_exclude),
            languages: config.languages.clone(),
            desc_include: lowercase(&config.desc_words_include),
            desc_exclude: lowercase(&config.desc_words_exclude),
            desc_include_regex: compile_all(&config.desc_words_include_regex)?,
            desc_exclude_regex: compile_all(&config.desc_words_exclude_regex)?,
            salary_floor: config.max_salary,
        })
    }
}

fn lowercase(words: &[String]) -> Vec<String> {
    words.iter().map(|w| w.to_lowercase()).collect()
}

fn compile_all(patterns: &[String]) -> Result<Vec<Regex>, AppError> {
    patterns
        .iter()
        .map(|p| {
            RegexBuilder::new(p)
                .case_insensitive(true)
                .build()
                .map_err(|e| AppError::ConfigError(format!("Invalid regex '{p}': {e}")))
        })
        .collect()
}

fn contains_any(haystack: &str, lowered_words: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    lowered_words.iter().any(|w| haystack.contains(w.as_str()))
}

/// Sort by `(title, company)` and keep the first posting of each equal run.
pub fn dedup(mut jobs: Vec<JobPosting>) -> Vec<JobPosting> {
    jobs.sort_by(|a, b| (&a.title, &a.company).cmp(&(&b.title, &b.company)));
    jobs.dedup_by(|later, first| later.title == first.title && later.company == first.company);
    jobs
}

/// Title exclude/include, language allow-list, company exclude.
pub fn filter_relevance<D: LanguageDetector>(
    jobs: Vec<JobPosting>,
    rules: &FilterRules,
    detector: &D,
) -> Vec<JobPosting> {
    jobs.into_iter()
        .filter(|job| !contains_any(&job.title, &rules.title_exclude))
        .filter(|job| rules.title_include.is_empty() || contains_any(&job.title, &rules.title_include))
        .filter(|job| {
            rules.languages.is_empty()
                || rules
                    .languages
                    .contains(&detect_or_default(detector, &job.description))
        })
        .filter(|job| !contains_any(&job.company, &rules.company_exclude))
        .collect()
}

/// Description include/exclude words, then include/exclude patterns.
pub fn split_by_description(
    jobs: Vec<JobPosting>,
    rules: &FilterRules,
) -> (Vec<JobPosting>, Vec<JobPosting>) {
    jobs.into_iter().partition(|job| matches_description(job, rules))
}

/// Description include/exclude words and patterns for one posting.
fn matches_description(job: &JobPosting, rules: &FilterRules) -> bool {
    let text = &job.description;
    (rules.desc_include.is_empty() || contains_any(text, &rules.desc_include))
        && !contains_any(text, &rules.desc_exclude)
        && (rules.desc_include_regex.is_empty()
            || rules.desc_include_regex.iter().any(|re| re.is_match(text)))
        && !rules.desc_exclude_regex.iter().any(|re| re.is_match(text))
}

/// Split postings on [`keep_by_salary`]. Bounds parsed from descriptions are
/// written back on both sides of the split.
pub fn split_by_salary(jobs: Vec<JobPosting>, floor: u64) -> (Vec<JobPosting>, Vec<JobPosting>) {
    let mut kept = Vec::with_capacity(jobs.len());
    let mut rejected = Vec::new();
    for mut job in jobs {
        if keep_by_salary(&mut job, floor) {
            kept.push(job);
        } else {
            rejected.push(job);
        }
    }
    (kept, rejected)
}

/// Salary decision for one posting.
///
/// Known bounds are compared directly. Otherwise the description is searched
/// for a salary range; a match is written back onto the posting. Postings
/// with no salary information are kept.
pub fn keep_by_salary(job: &mut JobPosting, floor: u64) -> bool {
    if job.salary().is_complete() {
        return job.max_salary >= floor;
    }
    match parse_salary_range(&job.description) {
        Some(range) => {
            job.set_salary(range);
            range.max >= floor
        }
        None => true,
    }
}

/// First `$min - $max` range in free text.
pub fn parse_salary_range(text: &str) -> Option<SalaryRange> {
    let caps = SALARY_RANGE.captures(text)?;
    let min = clean_salary(caps.get(1)?.as_str())?;
    let max = clean_salary(caps.get(2)?.as_str())?;
    Some(SalaryRange::new(min, max))
}

/// `"100k" -> 100000`, `"100,000" -> 100000`, `"72.5k" -> 72500`.
pub fn clean_salary(token: &str) -> Option<u64> {
    let cleaned = token.trim().to_lowercase().replace(',', "");
    match cleaned.strip_suffix('k') {
        Some(thousands) => {
            let value: f64 = thousands.trim().parse().ok()?;
            (value >= 0.0).then(|| (value * 1000.0) as u64)
        }
        None => cleaned.parse().ok(),
    }
}

/// Detected language, or [`DEFAULT_LANGUAGE`] when detection fails.
pub fn detect_or_default<D: LanguageDetector>(detector: &D, text: &str) -> String {
    detector
        .detect(text)
        .unwrap_or_else(|_| DEFAULT_LANGUAGE.to_string())
}
