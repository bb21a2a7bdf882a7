use chrono::{DateTime, Utc};
use scout_core::config::validate_table_name;
use scout_core::error::AppError;
use scout_core::models::JobPosting;
use scout_core::reconcile::{JobIndex, records_to_append};
use scout_core::traits::JobStore;
use sqlx::SqlitePool;

/// Format of the `date_loaded` column.
pub const DATE_LOADED_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

const COLUMNS: &str = "title, company, location, date, job_url, job_description, \
                       min_salary, max_salary, applied, hidden, interview, rejected";

/// Repository for job tables in SQLite.
///
/// Table names come from configuration and cannot be bound as parameters, so
/// every method validates the name and quotes it before interpolation.
#[derive(Clone)]
pub struct JobRepository {
    pool: SqlitePool,
}

impl JobRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn table_exists(&self, table: &str) -> Result<bool, AppError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(table)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(count > 0)
    }

    pub async fn create_table(&self, table: &str) -> Result<(), AppError> {
        let table = quoted(table)?;
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {table} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT,
                company TEXT,
                location TEXT,
                date TEXT,
                job_url TEXT,
                job_description TEXT,
                applied INTEGER,
                hidden INTEGER,
                interview INTEGER,
                rejected INTEGER,
                min_salary INTEGER,
                max_salary INTEGER,
                date_loaded TEXT
            )
            "#
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(())
    }

    /// Every row of `table` in insertion order. Missing tables are empty.
    pub async fn list(&self, table: &str) -> Result<Vec<JobPosting>, AppError> {
        let quoted_table = quoted(table)?;
        if !self.table_exists(table).await? {
            return Ok(Vec::new());
        }

        let rows = sqlx::query_as::<_, JobRow>(&format!(
            "SELECT {COLUMNS} FROM {quoted_table} ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Insert `records` in one transaction, all stamped with `loaded_at`.
    pub async fn insert_all(
        &self,
        table: &str,
        records: &[&JobPosting],
        loaded_at: DateTime<Utc>,
    ) -> Result<usize, AppError> {
        let table = quoted(table)?;
        let date_loaded = loaded_at.format(DATE_LOADED_FORMAT).to_string();
        let sql = format!(
            "INSERT INTO {table} ({COLUMNS}, date_loaded) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        for job in records {
            sqlx::query(&sql)
                .bind(&job.title)
                .bind(&job.company)
                .bind(&job.location)
                .bind(&job.posted_date)
                .bind(&job.url)
                .bind(&job.description)
                .bind(to_db_int(job.min_salary)?)
                .bind(to_db_int(job.max_salary)?)
                .bind(i64::from(job.applied))
                .bind(i64::from(job.hidden))
                .bind(i64::from(job.interview))
                .bind(i64::from(job.rejected))
                .bind(&date_loaded)
                .execute(&mut *tx)
                .await
                .map_err(|e| AppError::DatabaseError(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| AppError::DatabaseError(e.to_string()))?;

        Ok(records.len())
    }
}

fn quoted(table: &str) -> Result<String, AppError> {
    validate_table_name(table)?;
    Ok(format!("\"{table}\""))
}

fn to_db_int(value: u64) -> Result<i64, AppError> {
    i64::try_from(value)
        .map_err(|_| AppError::DatabaseError(format!("Value {value} does not fit in INTEGER")))
}

// -- Internal row type for sqlx deserialization --

/// Columns are nullable in tables written by older tools.
#[derive(sqlx::FromRow)]
struct JobRow {
    title: Option<String>,
    company: Option<String>,
    location: Option<String>,
    date: Option<String>,
    job_url: Option<String>,
    job_description: Option<String>,
    min_salary: Option<i64>,
    max_salary: Option<i64>,
    applied: Option<i64>,
    hidden: Option<i64>,
    interview: Option<i64>,
    rejected: Option<i64>,
}

impl From<JobRow> for JobPosting {
    fn from(row: JobRow) -> Self {
        let amount = |v: Option<i64>| v.and_then(|v| u64::try_from(v).ok()).unwrap_or(0);
        let flag = |v: Option<i64>| v.and_then(|v| u8::try_from(v).ok()).unwrap_or(0);
        JobPosting {
            title: row.title.unwrap_or_default(),
            company: row.company.unwrap_or_default(),
            location: row.location.unwrap_or_default(),
            posted_date: row.date.unwrap_or_default(),
            url: row.job_url.unwrap_or_default(),
            description: row.job_description.unwrap_or_default(),
            min_salary: amount(row.min_salary),
            max_salary: amount(row.max_salary),
            applied: flag(row.applied),
            hidden: flag(row.hidden),
            interview: flag(row.interview),
            rejected: flag(row.rejected),
        }
    }
}

// -- Trait implementation --

impl JobStore for JobRepository {
    async fn load_known(&self, table: &str) -> Result<Vec<JobPosting>, AppError> {
        self.list(table).await
    }

    async fn persist(
        &self,
        records: &[JobPosting],
        table: &str,
        loaded_at: DateTime<Utc>,
    ) -> Result<usize, AppError> {
        self.create_table(table).await?;
        let existing = self.list(table).await?;
        let index = JobIndex::from_jobs(&existing);
        let fresh = records_to_append(&index, records);
        if fresh.is_empty() {
            tracing::debug!(table, offered = records.len(), "No new rows to insert");
            return Ok(0);
        }

        let inserted = self.insert_all(table, &fresh, loaded_at).await?;
        tracing::debug!(table, offered = records.len(), inserted, "Rows inserted");
        Ok(inserted)
    }
}
