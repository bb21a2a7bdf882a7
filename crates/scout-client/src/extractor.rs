use std::sync::LazyLock;

use regex::Regex;
use scout_core::error::AppError;
use scout_core::models::{JobPosting, MISSING_DESCRIPTION, SalaryRange};
use scout_core::traits::Extractor;

use crate::markup::{Document, Element, Visit};

/// Base of the canonical posting URL; the posting id and a slash follow.
pub const JOB_VIEW_URL: &str = "https://www.linkedin.com/jobs/view/";

/// `$100,000.00/yr`-style amounts inside the compensation block.
pub static SALARY_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$([\d,]+(?:\.\d{2})?)\s*(?:/yr)?").expect("salary text pattern is valid")
});

const CARD: (&str, &str) = ("div", "base-search-card__info");
const COMPANY: (&str, &str) = ("a", "hidden-nested-link");
const LOCATION: (&str, &str) = ("span", "job-search-card__location");
const LIST_DATE: (&str, &str) = ("time", "job-search-card__listdate");
const LIST_DATE_NEW: (&str, &str) = ("time", "job-search-card__listdate--new");
const DESCRIPTION: (&str, &str) = ("div", "description__text description__text--rich");
const SALARY: (&str, &str) = ("div", "salary compensation__salary");

/// UI affordance text stripped from descriptions.
const AFFORDANCES: [&str; 2] = ["Show more", "Show less"];

/// Extractor for job-board search fragments and detail pages.
#[derive(Debug, Clone)]
pub struct ScraperExtractor {
    salary_pattern: Regex,
}

impl Default for ScraperExtractor {
    fn default() -> Self {
        Self {
            salary_pattern: SALARY_TEXT.clone(),
        }
    }
}

impl ScraperExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different amount pattern for the compensation block. The first
    /// capture group must hold the amount.
    pub fn with_salary_pattern(pattern: &str) -> Result<Self, AppError> {
        let salary_pattern = Regex::new(pattern)
            .map_err(|e| AppError::ConfigError(format!("Invalid salary pattern: {e}")))?;
        Ok(Self { salary_pattern })
    }
}

impl Extractor for ScraperExtractor {
    fn parse_search_results(&self, payload: &str) -> Vec<JobPosting> {
        let doc = Document::parse(payload);
        let cards = doc.find_all(CARD.0, CARD.1);
        if cards.is_empty() {
            tracing::info!("Empty page, no jobs found");
        }
        cards.into_iter().filter_map(parse_card).collect()
    }

    fn parse_description(&self, payload: &str) -> String {
        let doc = Document::parse(payload);
        match doc.find(DESCRIPTION.0, DESCRIPTION.1) {
            Some(div) => render_description(div),
            None => {
                tracing::warn!("Failed to find job description");
                MISSING_DESCRIPTION.to_string()
            }
        }
    }

    fn parse_salary(&self, payload: &str) -> SalaryRange {
        parse_salary_with(payload, &self.salary_pattern)
    }
}

/// One job card. Cards without an entity id have no canonical URL and are
/// skipped; other missing fields degrade to empty strings.
fn parse_card(card: Element<'_>) -> Option<JobPosting> {
    let Some(posting_id) = card
        .parent()
        .and_then(|p| p.attr("data-entity-urn"))
        .and_then(|urn| urn.rsplit(':').next())
        .map(str::trim)
        .filter(|id| !id.is_empty())
    else {
        tracing::debug!("Skipping job card without entity id");
        return None;
    };

    let title = card.find("h3", "").map(|h| h.text()).unwrap_or_default();
    let company = card
        .find(COMPANY.0, COMPANY.1)
        .map(|a| a.text().replace('\n', " "))
        .unwrap_or_default();
    let location = card
        .find(LOCATION.0, LOCATION.1)
        .map(|s| s.text())
        .unwrap_or_default();
    let posted_date = card
        .find(LIST_DATE.0, LIST_DATE.1)
        .or_else(|| card.find(LIST_DATE_NEW.0, LIST_DATE_NEW.1))
        .and_then(|t| t.attr("datetime"))
        .unwrap_or_default();

    Some(JobPosting::from_card(
        title,
        company,
        location,
        posted_date,
        format!("{JOB_VIEW_URL}{posting_id}/"),
    ))
}

/// Plain-text description: links and spans dropped, list items as `- ` lines,
/// blank lines and show more/less affordances removed.
fn render_description(div: Element<'_>) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut bullet = false;

    div.walk(&["a", "span"], &mut |visit| match visit {
        Visit::Open("li") => bullet = true,
        Visit::Open(_) => {}
        Visit::Text(text) => {
            let mut line = text.trim().to_string();
            for affordance in AFFORDANCES {
                line = line.replace(affordance, "");
            }
            let line = line.trim();
            if line.is_empty() {
                return;
            }
            if std::mem::take(&mut bullet) {
                lines.push(format!("- {line}"));
            } else {
                lines.push(line.to_string());
            }
        }
    });

    lines.join("\n")
}

/// Salary bounds from the compensation block: `(min, max)`, `(min, 0)` when
/// only one amount is present, unknown when the block or amounts are absent.
fn parse_salary_with(payload: &str, pattern: &Regex) -> SalaryRange {
    let doc = Document::parse(payload);
    let Some(block) = doc.find(SALARY.0, SALARY.1) else {
        return SalaryRange::UNKNOWN;
    };
    let text = block.text();
    let amounts: Vec<u64> = pattern
        .captures_iter(&text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| parse_amount(m.as_str()))
        .collect();

    match amounts.as_slice() {
        [] => SalaryRange::UNKNOWN,
        [min] => SalaryRange::new(*min, 0),
        [min, max, ..] => SalaryRange::new(*min, *max),
    }
}

/// `"100,000.00" -> 100000`; cents are dropped.
fn parse_amount(raw: &str) -> Option<u64> {
    let whole = raw.replace(',', "");
    let whole = whole.split('.').next()?;
    whole.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD_HTML: &str = r#"
        <div data-entity-urn="urn:li:jobPosting:1234567890">
            <div class='base-search-card__info'>
                <h3>Software Engineer</h3>
                <a class='hidden-nested-link'>Tech Company</a>
                <span class='job-search-card__location'>Denver, CO</span>
                <time class='job-search-card__listdate' datetime='2023-08-25'></time>
            </div>
        </div>
    "#;

    const DESCRIPTION_HTML: &str = r#"
        <div class='description__text description__text--rich'>
            <ul>
                <li>Job Requirement 1</li>
                <li>Job Requirement 2</li>
            </ul>
            <p>This is a description of the job.</p>
            <a href="/jobs">Show more</a>
            <span>Some unwanted text</span>
        </div>
    "#;

    #[test]
    fn parses_single_card() {
        let jobs = ScraperExtractor::new().parse_search_results(CARD_HTML);

        assert_eq!(jobs.len(), 1);
        let job = &jobs[0];
        assert_eq!(job.title, "Software Engineer");
        assert_eq!(job.company, "Tech Company");
        assert_eq!(job.location, "Denver, CO");
        assert_eq!(job.posted_date, "2023-08-25");
        assert_eq!(job.url, "https://www.linkedin.com/jobs/view/1234567890/");
        assert_eq!(job.description, "");
        assert_eq!((job.min_salary, job.max_salary), (0, 0));
        assert_eq!(
            (job.applied, job.hidden, job.interview, job.rejected),
            (0, 0, 0, 0)
        );
    }

    #[test]
    fn missing_fields_degrade_to_empty() {
        let html = r#"
            <div data-entity-urn="urn:li:jobPosting:9876543210">
                <div class='base-search-card__info'>
                    <h3>Data Scientist</h3>
                    <time class='job-search-card__listdate--new' datetime='2023-08-26'></time>
                </div>
            </div>
        "#;
        let jobs = ScraperExtractor::new().parse_search_results(html);

        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].company, "");
        assert_eq!(jobs[0].location, "");
        assert_eq!(jobs[0].posted_date, "2023-08-26");
        assert_eq!(jobs[0].url, "https://www.linkedin.com/jobs/view/9876543210/");
    }

    #[test]
    fn multiline_company_is_joined() {
        let html = r#"
            <div data-entity-urn="urn:li:jobPosting:1">
                <div class='base-search-card__info'>
                    <h3>Engineer</h3>
                    <a class='hidden-nested-link'>Acme
Robotics</a>
                </div>
            </div>
        "#;
        let jobs = ScraperExtractor::new().parse_search_results(html);
        assert_eq!(jobs[0].company, "Acme Robotics");
        assert_eq!(jobs[0].posted_date, "");
    }

    #[test]
    fn card_without_entity_id_is_skipped() {
        let html = r#"
            <div>
                <div class='base-search-card__info'><h3>Ghost</h3></div>
            </div>
        "#;
        assert!(ScraperExtractor::new().parse_search_results(html).is_empty());
    }

    #[test]
    fn empty_page_yields_no_jobs() {
        assert!(ScraperExtractor::new()
            .parse_search_results("<html></html>")
            .is_empty());
        assert!(ScraperExtractor::new().parse_search_results("").is_empty());
    }

    #[test]
    fn renders_description() {
        let description = ScraperExtractor::new().parse_description(DESCRIPTION_HTML);
        assert_eq!(
            description,
            "- Job Requirement 1\n- Job Requirement 2\nThis is a description of the job."
        );
    }

    #[test]
    fn strips_show_more_outside_links() {
        let html = "<div class='description__text description__text--rich'>\
                    <p>Build things</p><button>Show less</button></div>";
        assert_eq!(
            ScraperExtractor::new().parse_description(html),
            "Build things"
        );
    }

    #[test]
    fn missing_description_returns_sentinel() {
        assert_eq!(
            ScraperExtractor::new().parse_description("<html></html>"),
            MISSING_DESCRIPTION
        );
    }

    #[test]
    fn parses_salary_range() {
        let html = "<div class='salary compensation__salary'>\n$100,000.00/yr - $150,000.00/yr\n</div>";
        assert_eq!(
            ScraperExtractor::new().parse_salary(html),
            SalaryRange::new(100_000, 150_000)
        );
    }

    #[test]
    fn single_salary_sets_min_only() {
        let html = "<div class='salary compensation__salary'>$100,000.00/yr</div>";
        assert_eq!(
            ScraperExtractor::new().parse_salary(html),
            SalaryRange::new(100_000, 0)
        );
    }

    #[test]
    fn missing_salary_block_is_unknown() {
        assert_eq!(
            ScraperExtractor::new().parse_salary("<html></html>"),
            SalaryRange::UNKNOWN
        );
        let no_amount = "<div class='salary compensation__salary'>Competitive</div>";
        assert_eq!(
            ScraperExtractor::new().parse_salary(no_amount),
            SalaryRange::UNKNOWN
        );
    }

    #[test]
    fn invalid_salary_pattern_is_config_error() {
        let err = ScraperExtractor::with_salary_pattern("USD ([\\d").unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn custom_salary_pattern() {
        let extractor = ScraperExtractor::with_salary_pattern(r"USD\s*([\d,]+)").unwrap();
        let html = "<div class='salary compensation__salary'>USD 90,000 - USD 120,000</div>";
        assert_eq!(extractor.parse_salary(html), SalaryRange::new(90_000, 120_000));
    }
}
