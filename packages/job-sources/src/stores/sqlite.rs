//! SQLite storage implementation.
//!
//! A file-based storage backend using SQLite. Good for:
//! - Local development
//! - Single-server deployments
//! - Testing with persistent data
//!
//! Timestamps are stored as integer epoch milliseconds. Skills, raw
//! payloads, embeddings, and saved-search filters are JSON text columns.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AggregationError, Result};
use crate::traits::store::{InteractionStore, JobStore, SavedSearchStore, SourceStatusStore};
use crate::types::{
    interaction::{InteractionAction, JobInteraction, NewInteraction, PipelineStage},
    job::{DedupKey, JobQuery, JobRecord, UpsertOutcome},
    listing::{ExperienceLevel, JobType, NormalizedListing},
    saved_search::{Frequency, NewSavedSearch, RecordedMatches, SavedSearch, SearchFilters},
    source_status::{SourceStatus, SourceSync},
};

/// SQLite-based aggregation store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new SQLite store with the given connection URL.
    ///
    /// # Example URLs
    /// - `sqlite://jobs.db` - File-based database, created if missing
    /// - `sqlite::memory:` - Prefer [`SqliteStore::in_memory`]
    pub async fn new(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    ///
    /// Every connection to `:memory:` is its own database, so the pool holds
    /// exactly one connection that is never recycled.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                last_sync_at INTEGER,
                last_success_at INTEGER,
                last_error_at INTEGER,
                last_error TEXT,
                job_count INTEGER NOT NULL DEFAULT 0,
                sync_count INTEGER NOT NULL DEFAULT 0,
                avg_sync_duration_ms INTEGER
            );

            CREATE TABLE IF NOT EXISTS companies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                normalized_name TEXT NOT NULL UNIQUE
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                external_id TEXT NOT NULL,
                source TEXT NOT NULL,
                source_id INTEGER REFERENCES job_sources(id),
                company_id INTEGER REFERENCES companies(id),
                title TEXT NOT NULL,
                company TEXT NOT NULL,
                location TEXT,
                salary TEXT,
                salary_min INTEGER,
                salary_max INTEGER,
                description TEXT,
                url TEXT NOT NULL,
                posted_at INTEGER,
                remote INTEGER NOT NULL DEFAULT 0,
                job_type TEXT,
                experience_level TEXT,
                skills TEXT NOT NULL DEFAULT '[]',
                raw TEXT NOT NULL DEFAULT 'null',
                first_seen_at INTEGER NOT NULL,
                scraped_at INTEGER NOT NULL,
                embedding TEXT,
                UNIQUE (source, external_id)
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_scraped_at ON jobs(scraped_at);
            CREATE INDEX IF NOT EXISTS idx_jobs_company_id ON jobs(company_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS saved_searches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                query TEXT NOT NULL,
                filters TEXT NOT NULL DEFAULT '{}',
                is_active INTEGER NOT NULL DEFAULT 1,
                notify_email INTEGER NOT NULL DEFAULT 0,
                frequency TEXT NOT NULL DEFAULT 'daily',
                new_job_count INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                last_run_at INTEGER,
                last_viewed_at INTEGER,
                last_job_id INTEGER
            );

            CREATE TABLE IF NOT EXISTS saved_search_matches (
                saved_search_id INTEGER NOT NULL REFERENCES saved_searches(id) ON DELETE CASCADE,
                job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
                matched_at INTEGER NOT NULL,
                PRIMARY KEY (saved_search_id, job_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Databases created before saved searches tracked a job id cursor
        let has_cursor = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM pragma_table_info('saved_searches') WHERE name = 'last_job_id'",
        )
        .fetch_one(&self.pool)
        .await?;
        if has_cursor == 0 {
            sqlx::query("ALTER TABLE saved_searches ADD COLUMN last_job_id INTEGER")
                .execute(&self.pool)
                .await?;
        }

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS job_interactions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
                action TEXT NOT NULL,
                pipeline_stage TEXT,
                notes TEXT,
                rating INTEGER,
                applied_at INTEGER,
                response_at INTEGER,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_job_interactions_job_id ON job_interactions(job_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Cheap connectivity probe.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| AggregationError::storage(format!("Invalid timestamp: {}", ms)))
}

fn opt_from_millis(ms: Option<i64>) -> Result<Option<DateTime<Utc>>> {
    ms.map(from_millis).transpose()
}

/// Drop sub-millisecond precision so returned values equal stored ones.
fn stored_precision(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ts.timestamp_millis()).unwrap_or(ts)
}

fn parse_column<T: FromStr<Err = String>>(value: Option<String>) -> Result<Option<T>> {
    value
        .map(|v| v.parse::<T>().map_err(AggregationError::storage))
        .transpose()
}

/// `%needle%` with LIKE wildcards escaped by `\`.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

async fn source_id(conn: &mut SqliteConnection, name: &str) -> Result<i64> {
    sqlx::query("INSERT INTO job_sources (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
        .bind(name)
        .execute(&mut *conn)
        .await?;
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM job_sources WHERE name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

async fn company_id(conn: &mut SqliteConnection, company: &str) -> Result<i64> {
    let normalized = company.trim().to_lowercase();
    sqlx::query(
        "INSERT INTO companies (name, normalized_name) VALUES (?, ?) ON CONFLICT(normalized_name) DO NOTHING",
    )
    .bind(company.trim())
    .bind(&normalized)
    .execute(&mut *conn)
    .await?;
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM companies WHERE normalized_name = ?")
        .bind(&normalized)
        .fetch_one(&mut *conn)
        .await?;
    Ok(id)
}

/// Insert-if-absent on the `(source, external_id)` constraint; on conflict
/// only `scraped_at` moves.
async fn upsert_job(
    conn: &mut SqliteConnection,
    listing: &NormalizedListing,
    scraped_at: DateTime<Utc>,
) -> Result<UpsertOutcome> {
    let source_id = source_id(conn, &listing.source).await?;
    let company_id = company_id(conn, &listing.company).await?;
    let skills = serde_json::to_string(&listing.skills)?;
    let raw = serde_json::to_string(&listing.raw)?;
    let scraped_ms = to_millis(scraped_at);

    let inserted = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO jobs (
            external_id, source, source_id, company_id, title, company, location,
            salary, salary_min, salary_max, description, url, posted_at, remote,
            job_type, experience_level, skills, raw, first_seen_at, scraped_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(source, external_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(&listing.external_id)
    .bind(&listing.source)
    .bind(source_id)
    .bind(company_id)
    .bind(&listing.title)
    .bind(&listing.company)
    .bind(&listing.location)
    .bind(&listing.salary)
    .bind(listing.salary_min)
    .bind(listing.salary_max)
    .bind(&listing.description)
    .bind(&listing.url)
    .bind(listing.posted_at.map(to_millis))
    .bind(listing.remote)
    .bind(listing.job_type.map(|t| t.as_str()))
    .bind(listing.experience_level.map(|l| l.as_str()))
    .bind(&skills)
    .bind(&raw)
    .bind(scraped_ms)
    .bind(scraped_ms)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(id) = inserted {
        return Ok(UpsertOutcome::Inserted(id));
    }

    let id = sqlx::query_scalar::<_, i64>(
        "UPDATE jobs SET scraped_at = ? WHERE source = ? AND external_id = ? RETURNING id",
    )
    .bind(scraped_ms)
    .bind(&listing.source)
    .bind(&listing.external_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(UpsertOutcome::Existing(id))
}

// Row types for sqlx queries
#[derive(Debug, FromRow)]
struct JobRow {
    id: i64,
    external_id: String,
    source: String,
    source_id: Option<i64>,
    company_id: Option<i64>,
    title: String,
    company: String,
    location: Option<String>,
    salary: Option<String>,
    salary_min: Option<i64>,
    salary_max: Option<i64>,
    description: Option<String>,
    url: String,
    posted_at: Option<i64>,
    remote: bool,
    job_type: Option<String>,
    experience_level: Option<String>,
    skills: String,
    raw: String,
    first_seen_at: i64,
    scraped_at: i64,
    embedding: Option<String>,
}

impl JobRow {
    fn into_record(self) -> Result<JobRecord> {
        let embedding = self
            .embedding
            .as_deref()
            .map(serde_json::from_str::<Vec<f32>>)
            .transpose()?;

        Ok(JobRecord {
            id: self.id,
            external_id: self.external_id,
            source: self.source,
            source_id: self.source_id,
            company_id: self.company_id,
            title: self.title,
            company: self.company,
            location: self.location,
            salary: self.salary,
            salary_min: self.salary_min,
            salary_max: self.salary_max,
            description: self.description,
            url: self.url,
            posted_at: opt_from_millis(self.posted_at)?,
            remote: self.remote,
            job_type: parse_column::<JobType>(self.job_type)?,
            experience_level: parse_column::<ExperienceLevel>(self.experience_level)?,
            skills: serde_json::from_str(&self.skills)?,
            raw: serde_json::from_str(&self.raw)?,
            first_seen_at: from_millis(self.first_seen_at)?,
            scraped_at: from_millis(self.scraped_at)?,
            embedding,
        })
    }
}

#[derive(Debug, FromRow)]
struct SavedSearchRow {
    id: i64,
    name: String,
    query: String,
    filters: String,
    is_active: bool,
    notify_email: bool,
    frequency: String,
    new_job_count: i64,
    created_at: i64,
    last_run_at: Option<i64>,
    last_viewed_at: Option<i64>,
    last_job_id: Option<i64>,
}

impl SavedSearchRow {
    fn into_saved_search(self) -> Result<SavedSearch> {
        let filters: SearchFilters = serde_json::from_str(&self.filters)?;
        let frequency = self
            .frequency
            .parse::<Frequency>()
            .map_err(AggregationError::storage)?;

        Ok(SavedSearch {
            id: self.id,
            name: self.name,
            query: self.query,
            filters,
            is_active: self.is_active,
            notify_email: self.notify_email,
            frequency,
            new_job_count: self.new_job_count,
            created_at: from_millis(self.created_at)?,
            last_run_at: opt_from_millis(self.last_run_at)?,
            last_viewed_at: opt_from_millis(self.last_viewed_at)?,
            last_job_id: self.last_job_id,
        })
    }
}

#[derive(Debug, FromRow)]
struct InteractionRow {
    id: i64,
    job_id: i64,
    action: String,
    pipeline_stage: Option<String>,
    notes: Option<String>,
    rating: Option<i64>,
    applied_at: Option<i64>,
    response_at: Option<i64>,
    created_at: i64,
}

impl InteractionRow {
    fn into_interaction(self) -> Result<JobInteraction> {
        let rating = self
            .rating
            .map(u8::try_from)
            .transpose()
            .map_err(AggregationError::storage)?;

        Ok(JobInteraction {
            id: self.id,
            job_id: self.job_id,
            action: self
                .action
                .parse::<InteractionAction>()
                .map_err(AggregationError::storage)?,
            pipeline_stage: parse_column::<PipelineStage>(self.pipeline_stage)?,
            notes: self.notes,
            rating,
            applied_at: opt_from_millis(self.applied_at)?,
            response_at: opt_from_millis(self.response_at)?,
            created_at: from_millis(self.created_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct SourceRow {
    id: i64,
    name: String,
    last_sync_at: Option<i64>,
    last_success_at: Option<i64>,
    last_error_at: Option<i64>,
    last_error: Option<String>,
    job_count: i64,
    sync_count: i64,
    avg_sync_duration_ms: Option<i64>,
}

impl SourceRow {
    fn into_status(self) -> Result<SourceStatus> {
        Ok(SourceStatus {
            id: self.id,
            name: self.name,
            last_sync_at: opt_from_millis(self.last_sync_at)?,
            last_success_at: opt_from_millis(self.last_success_at)?,
            last_error_at: opt_from_millis(self.last_error_at)?,
            last_error: self.last_error,
            job_count: self.job_count,
            sync_count: self.sync_count,
            avg_sync_duration_ms: self.avg_sync_duration_ms,
        })
    }
}

#[async_trait]
impl JobStore for SqliteStore {
    async fn insert_if_absent(
        &self,
        listing: &NormalizedListing,
        scraped_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        let mut tx = self.pool.begin().await?;
        let outcome = upsert_job(&mut *tx, listing, scraped_at).await?;
        tx.commit().await?;
        Ok(outcome)
    }

    async fn upsert_batch(
        &self,
        listings: &[NormalizedListing],
        scraped_at: DateTime<Utc>,
    ) -> Result<Vec<UpsertOutcome>> {
        // All or nothing: dropping the transaction on error rolls it back
        let mut tx = self.pool.begin().await?;
        let mut outcomes = Vec::with_capacity(listings.len());
        for listing in listings {
            outcomes.push(upsert_job(&mut *tx, listing, scraped_at).await?);
        }
        tx.commit().await?;
        Ok(outcomes)
    }

    async fn find_by_key(&self, key: &DedupKey) -> Result<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs WHERE source = ? AND external_id = ?",
        )
        .bind(&key.source)
        .bind(&key.external_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(JobRow::into_record).transpose()
    }

    async fn jobs_scraped_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs WHERE scraped_at >= ? ORDER BY scraped_at ASC, id ASC",
        )
        .bind(since.map(to_millis).unwrap_or(i64::MIN))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(JobRow::into_record).collect()
    }

    async fn jobs_to_scan(
        &self,
        after_id: Option<i64>,
        scraped_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<JobRecord>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs WHERE id > ? OR scraped_at >= ? ORDER BY scraped_at ASC, id ASC",
        )
        .bind(after_id.unwrap_or(i64::MIN))
        .bind(scraped_since.map(to_millis).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(JobRow::into_record).collect()
    }

    async fn get_job(&self, id: i64) -> Result<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(JobRow::into_record).transpose()
    }

    async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<JobRecord>> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM jobs WHERE 1 = 1");

        if let Some(text) = query.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
            let pattern = like_pattern(text);
            builder
                .push(" AND (lower(title) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR lower(company) LIKE ")
                .push_bind(pattern.clone())
                .push(" ESCAPE '\\' OR lower(COALESCE(description, '')) LIKE ")
                .push_bind(pattern)
                .push(" ESCAPE '\\')");
        }
        if let Some(source) = &query.source {
            builder.push(" AND source = ").push_bind(source.clone());
        }
        if query.remote == Some(true) {
            builder.push(" AND remote = 1");
        }

        builder
            .push(" ORDER BY scraped_at DESC, id DESC LIMIT ")
            .push_bind(query.effective_limit() as i64)
            .push(" OFFSET ")
            .push_bind(query.offset as i64);

        let rows = builder
            .build_query_as::<JobRow>()
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(JobRow::into_record).collect()
    }

    async fn count_jobs(&self) -> Result<usize> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }
}

#[async_trait]
impl SavedSearchStore for SqliteStore {
    async fn create_saved_search(
        &self,
        search: &NewSavedSearch,
        now: DateTime<Utc>,
    ) -> Result<SavedSearch> {
        let now = stored_precision(now);
        let filters = serde_json::to_string(&search.filters)?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO saved_searches (name, query, filters, is_active, notify_email, frequency, created_at)
            VALUES (?, ?, ?, 1, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&search.name)
        .bind(&search.query)
        .bind(&filters)
        .bind(search.notify_email)
        .bind(search.frequency.as_str())
        .bind(to_millis(now))
        .fetch_one(&self.pool)
        .await?;

        Ok(search.clone().into_saved(id, now))
    }

    async fn get_saved_search(&self, id: i64) -> Result<Option<SavedSearch>> {
        let row = sqlx::query_as::<_, SavedSearchRow>("SELECT * FROM saved_searches WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(SavedSearchRow::into_saved_search).transpose()
    }

    async fn list_saved_searches(&self) -> Result<Vec<SavedSearch>> {
        let rows = sqlx::query_as::<_, SavedSearchRow>("SELECT * FROM saved_searches ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter()
            .map(SavedSearchRow::into_saved_search)
            .collect()
    }

    async fn set_saved_search_active(&self, id: i64, active: bool) -> Result<Option<SavedSearch>> {
        let row = sqlx::query_as::<_, SavedSearchRow>(
            "UPDATE saved_searches SET is_active = ? WHERE id = ? RETURNING *",
        )
        .bind(active)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SavedSearchRow::into_saved_search).transpose()
    }

    async fn delete_saved_search(&self, id: i64) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM saved_search_matches WHERE saved_search_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM saved_searches WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        Ok(deleted > 0)
    }

    async fn record_matches(
        &self,
        id: i64,
        job_ids: &[i64],
        scanned_through: i64,
        ran_at: DateTime<Utc>,
    ) -> Result<Option<RecordedMatches>> {
        let ran_ms = to_millis(ran_at);
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query(
            r#"
            UPDATE saved_searches
            SET last_run_at = ?, last_job_id = MAX(COALESCE(last_job_id, ?), ?)
            WHERE id = ?
            "#,
        )
        .bind(ran_ms)
        .bind(scanned_through)
        .bind(scanned_through)
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if exists == 0 {
            return Ok(None);
        }

        let mut newly = 0u64;
        for job_id in job_ids {
            newly += sqlx::query(
                r#"
                INSERT INTO saved_search_matches (saved_search_id, job_id, matched_at)
                VALUES (?, ?, ?)
                ON CONFLICT(saved_search_id, job_id) DO NOTHING
                "#,
            )
            .bind(id)
            .bind(*job_id)
            .bind(ran_ms)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }

        let new_job_count = sqlx::query_scalar::<_, i64>(
            "UPDATE saved_searches SET new_job_count = new_job_count + ? WHERE id = ? RETURNING new_job_count",
        )
        .bind(newly as i64)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(RecordedMatches {
            new_matches: newly as usize,
            new_job_count,
        }))
    }

    async fn mark_viewed(&self, id: i64, viewed_at: DateTime<Utc>) -> Result<Option<SavedSearch>> {
        let row = sqlx::query_as::<_, SavedSearchRow>(
            "UPDATE saved_searches SET new_job_count = 0, last_viewed_at = ? WHERE id = ? RETURNING *",
        )
        .bind(to_millis(viewed_at))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(SavedSearchRow::into_saved_search).transpose()
    }

    async fn matched_job_ids(&self, id: i64) -> Result<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT job_id FROM saved_search_matches WHERE saved_search_id = ? ORDER BY rowid",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }
}

#[async_trait]
impl InteractionStore for SqliteStore {
    async fn record_interaction(
        &self,
        interaction: &NewInteraction,
        now: DateTime<Utc>,
    ) -> Result<JobInteraction> {
        let now = stored_precision(now);
        let mut input = interaction.clone();
        input.applied_at = input.applied_at.map(stored_precision);
        input.response_at = input.response_at.map(stored_precision);

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO job_interactions (
                job_id, action, pipeline_stage, notes, rating, applied_at, response_at, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(input.job_id)
        .bind(input.action.as_str())
        .bind(input.pipeline_stage.map(|s| s.as_str()))
        .bind(&input.notes)
        .bind(input.rating.map(i64::from))
        .bind(input.applied_at.map(to_millis))
        .bind(input.response_at.map(to_millis))
        .bind(to_millis(now))
        .fetch_one(&self.pool)
        .await?;

        Ok(input.into_interaction(id, now))
    }

    async fn interactions_for_job(&self, job_id: i64) -> Result<Vec<JobInteraction>> {
        let rows = sqlx::query_as::<_, InteractionRow>(
            "SELECT * FROM job_interactions WHERE job_id = ? ORDER BY created_at, id",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(InteractionRow::into_interaction).collect()
    }

    async fn all_interactions(&self) -> Result<Vec<JobInteraction>> {
        let rows = sqlx::query_as::<_, InteractionRow>(
            "SELECT * FROM job_interactions ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(InteractionRow::into_interaction).collect()
    }
}

#[async_trait]
impl SourceStatusStore for SqliteStore {
    async fn record_source_sync(&self, sync: &SourceSync) -> Result<SourceStatus> {
        let mut tx = self.pool.begin().await?;
        let id = source_id(&mut *tx, &sync.source).await?;

        let row = sqlx::query_as::<_, SourceRow>("SELECT * FROM job_sources WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;
        let job_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM jobs WHERE source = ?")
            .bind(&sync.source)
            .fetch_one(&mut *tx)
            .await?;

        let mut status = row.into_status()?;
        status.apply(sync, job_count);

        sqlx::query(
            r#"
            UPDATE job_sources SET
                last_sync_at = ?,
                last_success_at = ?,
                last_error_at = ?,
                last_error = ?,
                job_count = ?,
                sync_count = ?,
                avg_sync_duration_ms = ?
            WHERE id = ?
            "#,
        )
        .bind(status.last_sync_at.map(to_millis))
        .bind(status.last_success_at.map(to_millis))
        .bind(status.last_error_at.map(to_millis))
        .bind(&status.last_error)
        .bind(status.job_count)
        .bind(status.sync_count)
        .bind(status.avg_sync_duration_ms)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(status)
    }

    async fn source_statuses(&self) -> Result<Vec<SourceStatus>> {
        let rows = sqlx::query_as::<_, SourceRow>("SELECT * FROM job_sources ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(SourceRow::into_status).collect()
    }
}
