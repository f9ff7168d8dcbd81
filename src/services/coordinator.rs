//! Batch coordinator
//!
//! Pages through the address store and runs the processor one record at a
//! time, pacing requests with a fixed delay so the geocoding service only
//! ever sees sequential traffic. A wall-clock budget is checked between
//! records; when it runs out the invocation stops early and hands the
//! advanced checkpoint back to the caller, which re-invokes until
//! `is_complete`. Work is spread across invocations but every record is
//! eventually visited: the cursor only moves past records actually
//! processed, and duplicate visits are harmless because writes are
//! idempotent.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::db::AddressStore;
use crate::error::Error;
use crate::services::geocoding::Geocoder;
use crate::services::processor::AddressProcessor;
use crate::types::{AddressRecord, BatchCheckpoint, BatchMode, BatchOutcome, ProcessResult};

/// Batch tuning knobs.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Records fetched per page.
    pub page_size: i64,
    /// Mandatory pause between records, independent of retry backoff.
    pub api_delay: Duration,
    /// Wall-clock budget for one invocation; must stay below the host's
    /// execution ceiling so the process is never killed mid-write.
    pub time_budget: Duration,
    /// Incremental scans only finish once the newest row they saw is at
    /// least this old, so rows edited during the scan are not missed.
    pub stale_threshold: Duration,
    /// Upper bound on records processed by one catch-up invocation.
    pub catch_up_cap: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            page_size: 10,
            api_delay: Duration::from_millis(1000),
            time_budget: Duration::from_millis(25_000),
            stale_threshold: Duration::from_secs(5 * 60),
            catch_up_cap: 500,
        }
    }
}

/// Batch coordinator: owns checkpoint advancement and completion detection.
pub struct BatchCoordinator {
    store: Arc<dyn AddressStore>,
    processor: AddressProcessor,
    config: BatchConfig,
}

impl BatchCoordinator {
    pub fn new(
        store: Arc<dyn AddressStore>,
        geocoder: Arc<dyn Geocoder>,
        config: BatchConfig,
    ) -> Self {
        let processor = AddressProcessor::new(Arc::clone(&store), geocoder);
        Self {
            store,
            processor,
            config,
        }
    }

    /// Run one batch invocation from `checkpoint`, in the given mode.
    pub async fn run(
        &self,
        mode: BatchMode,
        checkpoint: BatchCheckpoint,
    ) -> Result<BatchOutcome, Error> {
        match mode {
            BatchMode::Incremental => self.run_incremental(checkpoint).await,
            BatchMode::CatchUp => self.run_catch_up(checkpoint).await,
        }
    }

    /// Incremental scan: follow the id cursor (and updated-at cursor) until
    /// the table is drained and quiet, the budget runs out, or a page comes
    /// back short.
    async fn run_incremental(
        &self,
        mut checkpoint: BatchCheckpoint,
    ) -> Result<BatchOutcome, Error> {
        let started = Instant::now();
        let total_count = self.store.count_addresses().await?;
        let mut results: Vec<ProcessResult> = Vec::new();
        let mut is_complete = false;

        loop {
            let page = self
                .store
                .fetch_incremental_page(&checkpoint, self.config.page_size)
                .await?;
            debug!(page_len = page.len(), last_id = %checkpoint.last_processed_id, "fetched incremental page");

            let page_len = page.len();
            let finished_page = self
                .process_page(page, &mut results, &mut checkpoint, started, None)
                .await;

            if !finished_page {
                // Budget ran out mid-page; the caller re-invokes with the
                // checkpoint we advanced to.
                info!(processed = results.len(), "time budget exhausted, stopping batch early");
                break;
            }

            if (page_len as i64) < self.config.page_size {
                // No more rows behind the cursor. Only call it done once the
                // newest row seen predates the stale threshold — anything
                // fresher may have siblings committed during the scan.
                let stale_cutoff = Utc::now()
                    - chrono::Duration::from_std(self.config.stale_threshold)
                        .unwrap_or(chrono::Duration::zero());
                is_complete = checkpoint
                    .last_processed_timestamp
                    .map_or(true, |ts| ts < stale_cutoff);
                break;
            }

            if started.elapsed() >= self.config.time_budget {
                info!(processed = results.len(), "time budget exhausted between pages");
                break;
            }
        }

        Ok(BatchOutcome {
            results,
            checkpoint,
            is_complete,
            total_count,
        })
    }

    /// Catch-up scan: drain rows whose coordinates are unset, up to the
    /// configured cap. Rows the geocoder cannot resolve keep their unset
    /// coordinates and are skipped via the id cursor.
    async fn run_catch_up(&self, mut checkpoint: BatchCheckpoint) -> Result<BatchOutcome, Error> {
        let started = Instant::now();
        let total_count = self.store.count_addresses().await?;
        let mut results: Vec<ProcessResult> = Vec::new();
        let mut is_complete = false;

        loop {
            let page = self
                .store
                .fetch_unset_page(checkpoint.last_processed_id, self.config.page_size)
                .await?;
            debug!(page_len = page.len(), last_id = %checkpoint.last_processed_id, "fetched catch-up page");

            if page.is_empty() {
                is_complete = true;
                break;
            }

            let page_len = page.len();
            let finished_page = self
                .process_page(
                    page,
                    &mut results,
                    &mut checkpoint,
                    started,
                    Some(self.config.catch_up_cap),
                )
                .await;

            if !finished_page {
                info!(processed = results.len(), "catch-up stopped before completion");
                break;
            }

            if (page_len as i64) < self.config.page_size {
                is_complete = true;
                break;
            }
        }

        Ok(BatchOutcome {
            results,
            checkpoint,
            is_complete,
            total_count,
        })
    }

    /// Process one page sequentially. Returns `false` if the page was cut
    /// short by the time budget or the record cap.
    async fn process_page(
        &self,
        page: Vec<AddressRecord>,
        results: &mut Vec<ProcessResult>,
        checkpoint: &mut BatchCheckpoint,
        started: Instant,
        cap: Option<usize>,
    ) -> bool {
        for record in &page {
            if started.elapsed() >= self.config.time_budget {
                return false;
            }
            if let Some(cap) = cap {
                if results.len() >= cap {
                    return false;
                }
            }

            results.push(self.processor.process(record).await);
            checkpoint.advance(record.id, record.updated_at);

            // Steady-state pacing toward the geocoding service. This is
            // deliberate extra delay on top of any retry backoff.
            tokio::time::sleep(self.config.api_delay).await;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use uuid::Uuid;

    use crate::db::memory::MemoryAddressStore;
    use crate::services::geocoding::MockGeocoder;
    use crate::types::ProcessStatus;

    fn test_config() -> BatchConfig {
        BatchConfig {
            page_size: 10,
            api_delay: Duration::ZERO,
            time_budget: Duration::from_secs(30),
            stale_threshold: Duration::from_secs(5 * 60),
            catch_up_cap: 500,
        }
    }

    /// `count` records with unset coordinates, `updated_at` an hour ago so
    /// incremental scans can reach the stale-threshold completion state.
    fn seed_records(count: usize) -> Vec<AddressRecord> {
        let stale = Utc::now() - chrono::Duration::hours(1);
        (0..count)
            .map(|i| AddressRecord {
                id: Uuid::new_v4(),
                full_address_text: Some(format!("{} Main St, Springfield", i + 1)),
                lat: None,
                long: None,
                country: None,
                updated_at: Some(stale),
            })
            .collect()
    }

    fn coordinator(store: Arc<MemoryAddressStore>, config: BatchConfig) -> BatchCoordinator {
        BatchCoordinator::new(store, Arc::new(MockGeocoder::new()), config)
    }

    #[tokio::test]
    async fn incremental_scan_visits_every_record_exactly_once() {
        let records = seed_records(25);
        let expected: HashSet<Uuid> = records.iter().map(|r| r.id).collect();
        let store = Arc::new(MemoryAddressStore::new(records));
        let coordinator = coordinator(Arc::clone(&store), test_config());

        let mut checkpoint = BatchCheckpoint::default();
        let mut seen: Vec<Uuid> = Vec::new();
        let mut invocations = 0;

        loop {
            invocations += 1;
            assert!(invocations <= 10, "scan did not terminate");

            let outcome = coordinator.run(BatchMode::Incremental, checkpoint).await.unwrap();
            seen.extend(outcome.results.iter().map(|r| r.id));
            checkpoint = outcome.checkpoint;

            if outcome.is_complete {
                break;
            }
        }

        assert_eq!(seen.len(), expected.len(), "every record visited exactly once");
        assert_eq!(seen.iter().copied().collect::<HashSet<_>>(), expected);
    }

    #[tokio::test]
    async fn incremental_scan_reports_total_count() {
        let store = Arc::new(MemoryAddressStore::new(seed_records(7)));
        let coordinator = coordinator(store, test_config());

        let outcome = coordinator
            .run(BatchMode::Incremental, BatchCheckpoint::default())
            .await
            .unwrap();

        assert_eq!(outcome.total_count, 7);
        assert!(outcome.is_complete);
        assert_eq!(outcome.results.len(), 7);
    }

    #[tokio::test]
    async fn fresh_timestamp_defers_completion() {
        let mut records = seed_records(3);
        // Newest row was touched moments ago — the scan must not conclude.
        records[2].updated_at = Some(Utc::now());
        let store = Arc::new(MemoryAddressStore::new(records));
        let coordinator = coordinator(store, test_config());

        let outcome = coordinator
            .run(BatchMode::Incremental, BatchCheckpoint::default())
            .await
            .unwrap();

        assert!(!outcome.is_complete);
        assert_eq!(outcome.results.len(), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_stops_early_without_claiming_completion() {
        let store = Arc::new(MemoryAddressStore::new(seed_records(5)));
        let mut config = test_config();
        config.time_budget = Duration::ZERO;
        let coordinator = coordinator(store, config);

        let outcome = coordinator
            .run(BatchMode::Incremental, BatchCheckpoint::default())
            .await
            .unwrap();

        assert!(outcome.results.is_empty());
        assert!(!outcome.is_complete);
        assert_eq!(outcome.checkpoint.last_processed_id, Uuid::nil());
    }

    #[tokio::test]
    async fn catch_up_only_processes_unset_rows() {
        let mut records = seed_records(6);
        records[1].lat = Some(50.08);
        records[1].long = Some(14.43);
        records[4].lat = Some(40.0);
        records[4].long = Some(-88.0);
        let already_set: HashSet<Uuid> = [records[1].id, records[4].id].into_iter().collect();
        let store = Arc::new(MemoryAddressStore::new(records));
        let coordinator = coordinator(Arc::clone(&store), test_config());

        let outcome = coordinator
            .run(BatchMode::CatchUp, BatchCheckpoint::default())
            .await
            .unwrap();

        assert!(outcome.is_complete);
        assert_eq!(outcome.results.len(), 4);
        assert!(outcome.results.iter().all(|r| !already_set.contains(&r.id)));
        assert!(outcome.results.iter().all(|r| r.status == ProcessStatus::Updated));
    }

    #[tokio::test]
    async fn catch_up_honors_record_cap() {
        let store = Arc::new(MemoryAddressStore::new(seed_records(12)));
        let mut config = test_config();
        config.page_size = 5;
        config.catch_up_cap = 7;
        let coordinator = coordinator(store, config);

        let outcome = coordinator
            .run(BatchMode::CatchUp, BatchCheckpoint::default())
            .await
            .unwrap();

        assert_eq!(outcome.results.len(), 7);
        assert!(!outcome.is_complete);
    }

    #[tokio::test]
    async fn catch_up_resumes_and_finishes_from_checkpoint() {
        let store = Arc::new(MemoryAddressStore::new(seed_records(12)));
        let mut config = test_config();
        config.page_size = 5;
        config.catch_up_cap = 7;
        let coordinator = coordinator(Arc::clone(&store), config);

        let first = coordinator
            .run(BatchMode::CatchUp, BatchCheckpoint::default())
            .await
            .unwrap();
        let second = coordinator
            .run(BatchMode::CatchUp, first.checkpoint)
            .await
            .unwrap();

        assert!(second.is_complete);
        assert_eq!(first.results.len() + second.results.len(), 12);
        assert_eq!(store.updates().len(), 12);
    }

    #[tokio::test]
    async fn empty_store_completes_immediately() {
        let store = Arc::new(MemoryAddressStore::new(vec![]));
        let coordinator = coordinator(store, test_config());

        for mode in [BatchMode::Incremental, BatchMode::CatchUp] {
            let outcome = coordinator.run(mode, BatchCheckpoint::default()).await.unwrap();
            assert!(outcome.is_complete);
            assert!(outcome.results.is_empty());
            assert_eq!(outcome.total_count, 0);
        }
    }
}
