use scout_core::models::JobPosting;
use scout_db::{Database, DatabaseConfig};

/// Fresh in-memory database. A single connection keeps every query on the
/// same memory instance.
pub async fn setup_test_db() -> Database {
    let config = DatabaseConfig {
        url: "sqlite::memory:".into(),
        max_connections: 1,
    };
    Database::connect(&config)
        .await
        .expect("Failed to open in-memory database")
}

pub fn job(title: &str, company: &str, date: &str, url: &str) -> JobPosting {
    JobPosting {
        description: format!("{title} at {company}"),
        ..JobPosting::from_card(title, company, "Remote", date, url)
    }
}
