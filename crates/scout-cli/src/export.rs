use std::fs::{self, OpenOptions};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use scout_core::models::JobPosting;
use scout_db::DATE_LOADED_FORMAT;

const HEADER: [&str; 13] = [
    "title",
    "company",
    "location",
    "date",
    "job_url",
    "job_description",
    "applied",
    "hidden",
    "interview",
    "rejected",
    "min_salary",
    "max_salary",
    "date_loaded",
];

/// Append `jobs` to the CSV at `path`, writing the header only when the file
/// is new or empty. Parent directories are created as needed.
pub fn append_csv(path: &Path, jobs: &[JobPosting], loaded_at: DateTime<Utc>) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let needs_header = file.metadata()?.len() == 0;

    let mut writer = csv::Writer::from_writer(file);
    if needs_header {
        writer.write_record(HEADER)?;
    }

    let date_loaded = loaded_at.format(DATE_LOADED_FORMAT).to_string();
    for job in jobs {
        writer.write_record(&[
            job.title.clone(),
            job.company.clone(),
            job.location.clone(),
            job.posted_date.clone(),
            job.url.clone(),
            job.description.clone(),
            job.applied.to_string(),
            job.hidden.to_string(),
            job.interview.to_string(),
            job.rejected.to_string(),
            job.min_salary.to_string(),
            job.max_salary.to_string(),
            date_loaded.clone(),
        ])?;
    }
    writer.flush()?;

    Ok(jobs.len())
}
