//! In-memory storage implementation for testing and development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::Result;
use crate::traits::store::{InteractionStore, JobStore, SavedSearchStore, SourceStatusStore};
use crate::types::{
    interaction::{JobInteraction, NewInteraction},
    job::{DedupKey, JobQuery, JobRecord, UpsertOutcome},
    listing::NormalizedListing,
    saved_search::{NewSavedSearch, RecordedMatches, SavedSearch},
    source_status::{SourceStatus, SourceSync},
};

#[derive(Default)]
struct JobTable {
    by_key: IndexMap<DedupKey, JobRecord>,
    key_by_id: HashMap<i64, DedupKey>,
    next_id: i64,

    /// Lowercased company name to company id
    companies: HashMap<String, i64>,
}

impl JobTable {
    fn company_id(&mut self, company: &str) -> i64 {
        let next = self.companies.len() as i64 + 1;
        *self
            .companies
            .entry(company.trim().to_lowercase())
            .or_insert(next)
    }

    fn insert_if_absent(
        &mut self,
        listing: &NormalizedListing,
        source_id: i64,
        scraped_at: DateTime<Utc>,
    ) -> UpsertOutcome {
        let key = listing.dedup_key();
        if let Some(existing) = self.by_key.get_mut(&key) {
            existing.scraped_at = scraped_at;
            return UpsertOutcome::Existing(existing.id);
        }

        self.next_id += 1;
        let id = self.next_id;
        let company_id = self.company_id(&listing.company);
        let record =
            JobRecord::from_listing(id, listing, Some(source_id), Some(company_id), scraped_at);
        self.key_by_id.insert(id, key.clone());
        self.by_key.insert(key, record);
        UpsertOutcome::Inserted(id)
    }

    fn count_for_source(&self, source: &str) -> i64 {
        self.by_key.keys().filter(|k| k.source == source).count() as i64
    }
}

#[derive(Default)]
struct SearchTable {
    searches: IndexMap<i64, SavedSearch>,
    matches: HashMap<i64, IndexSet<i64>>,
    next_id: i64,
}

/// In-memory storage for jobs, saved searches, interactions, and source
/// status.
///
/// Useful for testing and development. Not suitable for production
/// as data is lost on restart.
pub struct MemoryStore {
    jobs: RwLock<JobTable>,
    searches: RwLock<SearchTable>,
    interactions: RwLock<Vec<JobInteraction>>,
    sources: RwLock<IndexMap<String, SourceStatus>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty memory store.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(JobTable::default()),
            searches: RwLock::new(SearchTable::default()),
            interactions: RwLock::new(Vec::new()),
            sources: RwLock::new(IndexMap::new()),
        }
    }

    /// Get the number of stored jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.read().unwrap().by_key.len()
    }

    /// Get the number of distinct companies seen.
    pub fn company_count(&self) -> usize {
        self.jobs.read().unwrap().companies.len()
    }

    fn source_id(&self, name: &str) -> i64 {
        let mut sources = self.sources.write().unwrap();
        let next = sources.len() as i64 + 1;
        sources
            .entry(name.to_string())
            .or_insert_with(|| SourceStatus::new(next, name))
            .id
    }
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert_if_absent(
        &self,
        listing: &NormalizedListing,
        scraped_at: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        let source_id = self.source_id(&listing.source);
        Ok(self
            .jobs
            .write()
            .unwrap()
            .insert_if_absent(listing, source_id, scraped_at))
    }

    async fn upsert_batch(
        &self,
        listings: &[NormalizedListing],
        scraped_at: DateTime<Utc>,
    ) -> Result<Vec<UpsertOutcome>> {
        let source_ids: Vec<i64> = listings.iter().map(|l| self.source_id(&l.source)).collect();

        // One write lock for the whole batch
        let mut jobs = self.jobs.write().unwrap();
        Ok(listings
            .iter()
            .zip(source_ids)
            .map(|(listing, source_id)| jobs.insert_if_absent(listing, source_id, scraped_at))
            .collect())
    }

    async fn find_by_key(&self, key: &DedupKey) -> Result<Option<JobRecord>> {
        Ok(self.jobs.read().unwrap().by_key.get(key).cloned())
    }

    async fn jobs_scraped_since(&self, since: Option<DateTime<Utc>>) -> Result<Vec<JobRecord>> {
        let jobs = self.jobs.read().unwrap();
        let mut found: Vec<JobRecord> = jobs
            .by_key
            .values()
            .filter(|j| since.map_or(true, |since| j.scraped_at >= since))
            .cloned()
            .collect();
        found.sort_by_key(|j| (j.scraped_at, j.id));
        Ok(found)
    }

    async fn jobs_to_scan(
        &self,
        after_id: Option<i64>,
        scraped_since: Option<DateTime<Utc>>,
    ) -> Result<Vec<JobRecord>> {
        let jobs = self.jobs.read().unwrap();
        let mut found: Vec<JobRecord> = jobs
            .by_key
            .values()
            .filter(|j| {
                after_id.map_or(true, |after| j.id > after)
                    || scraped_since.is_some_and(|since| j.scraped_at >= since)
            })
            .cloned()
            .collect();
        found.sort_by_key(|j| (j.scraped_at, j.id));
        Ok(found)
    }

    async fn get_job(&self, id: i64) -> Result<Option<JobRecord>> {
        let jobs = self.jobs.read().unwrap();
        Ok(jobs
            .key_by_id
            .get(&id)
            .and_then(|key| jobs.by_key.get(key))
            .cloned())
    }

    async fn list_jobs(&self, query: &JobQuery) -> Result<Vec<JobRecord>> {
        let jobs = self.jobs.read().unwrap();
        let mut found: Vec<&JobRecord> = jobs.by_key.values().filter(|j| query.matches(j)).collect();
        found.sort_by(|a, b| (b.scraped_at, b.id).cmp(&(a.scraped_at, a.id)));
        Ok(found
            .into_iter()
            .skip(query.offset)
            .take(query.effective_limit())
            .cloned()
            .collect())
    }

    async fn count_jobs(&self) -> Result<usize> {
        Ok(self.job_count())
    }
}

#[async_trait]
impl SavedSearchStore for MemoryStore {
    async fn create_saved_search(
        &self,
        search: &NewSavedSearch,
        now: DateTime<Utc>,
    ) -> Result<SavedSearch> {
        let mut table = self.searches.write().unwrap();
        table.next_id += 1;
        let saved = search.clone().into_saved(table.next_id, now);
        table.searches.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn get_saved_search(&self, id: i64) -> Result<Option<SavedSearch>> {
        Ok(self.searches.read().unwrap().searches.get(&id).cloned())
    }

    async fn list_saved_searches(&self) -> Result<Vec<SavedSearch>> {
        Ok(self
            .searches
            .read()
            .unwrap()
            .searches
            .values()
            .cloned()
            .collect())
    }

    async fn set_saved_search_active(&self, id: i64, active: bool) -> Result<Option<SavedSearch>> {
        let mut table = self.searches.write().unwrap();
        Ok(table.searches.get_mut(&id).map(|search| {
            search.is_active = active;
            search.clone()
        }))
    }

    async fn delete_saved_search(&self, id: i64) -> Result<bool> {
        let mut table = self.searches.write().unwrap();
        table.matches.remove(&id);
        Ok(table.searches.shift_remove(&id).is_some())
    }

    async fn record_matches(
        &self,
        id: i64,
        job_ids: &[i64],
        scanned_through: i64,
        ran_at: DateTime<Utc>,
    ) -> Result<Option<RecordedMatches>> {
        let mut table = self.searches.write().unwrap();
        if !table.searches.contains_key(&id) {
            return Ok(None);
        }

        let seen = table.matches.entry(id).or_default();
        let new_matches = job_ids.iter().filter(|job_id| seen.insert(**job_id)).count();

        Ok(table.searches.get_mut(&id).map(|search| {
            search.new_job_count += new_matches as i64;
            search.last_run_at = Some(ran_at);
            search.last_job_id = Some(search.last_job_id.map_or(scanned_through, |last| {
                last.max(scanned_through)
            }));
            RecordedMatches {
                new_matches,
                new_job_count: search.new_job_count,
            }
        }))
    }

    async fn mark_viewed(&self, id: i64, viewed_at: DateTime<Utc>) -> Result<Option<SavedSearch>> {
        let mut table = self.searches.write().unwrap();
        Ok(table.searches.get_mut(&id).map(|search| {
            search.new_job_count = 0;
            search.last_viewed_at = Some(viewed_at);
            search.clone()
        }))
    }

    async fn matched_job_ids(&self, id: i64) -> Result<Vec<i64>> {
        Ok(self
            .searches
            .read()
            .unwrap()
            .matches
            .get(&id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl InteractionStore for MemoryStore {
    async fn record_interaction(
        &self,
        interaction: &NewInteraction,
        now: DateTime<Utc>,
    ) -> Result<JobInteraction> {
        let mut rows = self.interactions.write().unwrap();
        let row = interaction.clone().into_interaction(rows.len() as i64 + 1, now);
        rows.push(row.clone());
        Ok(row)
    }

    async fn interactions_for_job(&self, job_id: i64) -> Result<Vec<JobInteraction>> {
        Ok(self
            .interactions
            .read()
            .unwrap()
            .iter()
            .filter(|i| i.job_id == job_id)
            .cloned()
            .collect())
    }

    async fn all_interactions(&self) -> Result<Vec<JobInteraction>> {
        Ok(self.interactions.read().unwrap().clone())
    }
}

#[async_trait]
impl SourceStatusStore for MemoryStore {
    async fn record_source_sync(&self, sync: &SourceSync) -> Result<SourceStatus> {
        let job_count = self.jobs.read().unwrap().count_for_source(&sync.source);
        let mut sources = self.sources.write().unwrap();
        let next = sources.len() as i64 + 1;
        let status = sources
            .entry(sync.source.clone())
            .or_insert_with(|| SourceStatus::new(next, &sync.source));
        status.apply(sync, job_count);
        Ok(status.clone())
    }

    async fn source_statuses(&self) -> Result<Vec<SourceStatus>> {
        Ok(self.sources.read().unwrap().values().cloned().collect())
    }
}
