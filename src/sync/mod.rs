//! Bidirectional sync engine.
//!
//! Both phases share one step: fetch the page ending strictly before the
//! cursor, run the acceptance filter, upsert survivors, derive the next
//! cursor. State lives in the store's own extrema rather than an external
//! checkpoint, so an interrupted run resumes from whatever was committed.

use crate::db;
use crate::indexer::client::{ClientError, PageRequest, TransactionsSource};
use crate::indexer::models::{extract_record, page_cursor};
use crate::models::TransactionRecord;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use sqlx::SqlitePool;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The newest page is re-fetched eagerly; deeper pages are immutable history
/// and can live in the cache much longer.
const LATEST_PAGE_TTL: Duration = Duration::from_secs(300);
const BACKFILL_PAGE_TTL: Duration = Duration::from_secs(1800);

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("upstream client error: {0}")]
    Client(#[from] ClientError),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("history horizon must be positive, got {0}")]
    InvalidHorizon(i64),
}

impl SyncError {
    /// True when the failure was an exhausted rate-limit retry chain; callers
    /// may continue in degraded, store-only mode.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SyncError::Client(err) if err.is_rate_limited())
    }
}

/// Counters for one sync invocation. Dropped records are rejected by the
/// acceptance filter; they are counted for visibility but never stored.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyncOutcome {
    pub pages_fetched: usize,
    pub records_upserted: usize,
    pub records_dropped: usize,
}

impl SyncOutcome {
    fn merge(&mut self, other: SyncOutcome) {
        self.pages_fetched += other.pages_fetched;
        self.records_upserted += other.records_upserted;
        self.records_dropped += other.records_dropped;
    }
}

/// The result of one fetch-filter-upsert step. `next_cursor` always derives
/// from the unfiltered page, so a fully-rejected page still makes progress.
#[derive(Debug)]
pub struct PageStep {
    pub accepted: Vec<TransactionRecord>,
    pub raw_count: usize,
    pub next_cursor: Option<i64>,
}

impl PageStep {
    pub fn accepted_min_time(&self) -> Option<i64> {
        self.accepted.iter().map(|record| record.block_time).min()
    }

    pub fn dropped(&self) -> usize {
        self.raw_count - self.accepted.len()
    }
}

pub struct SyncEngine<'a, S> {
    source: &'a S,
    pool: &'a SqlitePool,
    page_limit: i64,
    max_pages: usize,
}

impl<'a, S: TransactionsSource> SyncEngine<'a, S> {
    pub fn new(source: &'a S, pool: &'a SqlitePool, page_limit: i64, max_pages: usize) -> Self {
        Self {
            source,
            pool,
            page_limit,
            max_pages,
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        self.pool
    }

    /// Fetch the page ending strictly before `cursor`, upsert what survives
    /// the acceptance filter, and hand back the explicitly derived next cursor.
    pub async fn fetch_step(
        &self,
        cursor: Option<i64>,
        force_refresh: bool,
        ttl: Duration,
    ) -> Result<PageStep, SyncError> {
        let request = PageRequest {
            limit: self.page_limit,
            offset: 0,
            end_time: cursor,
            force_refresh,
            ttl: Some(ttl),
        };
        let page = self.source.fetch_transactions_page(&request).await?;

        let ingested_at = Utc::now().timestamp();
        let accepted: Vec<TransactionRecord> = page
            .results
            .iter()
            .filter_map(|raw| extract_record(raw, ingested_at))
            .collect();
        let next_cursor = page_cursor(&page.results);

        if !accepted.is_empty() {
            db::transaction::upsert_transactions(self.pool, &accepted).await?;
        }

        Ok(PageStep {
            raw_count: page.results.len(),
            accepted,
            next_cursor,
        })
    }

    /// Forward phase: pull newest pages until the store has caught up with
    /// what it already knew, a page comes back empty, or the ceiling hits.
    pub async fn sync_latest(&self) -> Result<SyncOutcome, SyncError> {
        let extrema = db::transaction::time_extrema(self.pool).await?;
        let stored_max = extrema.max_block_time;

        let mut outcome = SyncOutcome::default();
        let mut cursor: Option<i64> = None;

        while outcome.pages_fetched < self.max_pages {
            let first_page = cursor.is_none();
            debug!(
                "fetching latest page {} (cursor {:?})",
                outcome.pages_fetched + 1,
                cursor
            );
            let ttl = if first_page {
                LATEST_PAGE_TTL
            } else {
                BACKFILL_PAGE_TTL
            };
            let step = self.fetch_step(cursor, first_page, ttl).await?;
            outcome.pages_fetched += 1;

            if step.raw_count == 0 {
                break;
            }
            outcome.records_upserted += step.accepted.len();
            outcome.records_dropped += step.dropped();

            let oldest_accepted = step.accepted_min_time();
            let Some(next) = step.next_cursor else {
                break;
            };
            // Successive cursors strictly decrease; anything else would loop.
            if let Some(current) = cursor {
                if next >= current {
                    warn!("latest sync cursor stalled at {}; stopping", current);
                    break;
                }
            }
            cursor = Some(next);

            if let (Some(stored), Some(oldest)) = (stored_max, oldest_accepted) {
                if oldest <= stored {
                    debug!("caught up with stored maximum {}", stored);
                    break;
                }
            }
        }

        info!(
            "latest sync: {} pages, {} records upserted, {} dropped by filter",
            outcome.pages_fetched, outcome.records_upserted, outcome.records_dropped
        );
        Ok(outcome)
    }

    /// Backward phase: walk strictly older pages from the store's oldest
    /// known record until the horizon is covered. A no-op when it already is.
    pub async fn sync_history(&self, horizon: DateTime<Utc>) -> Result<SyncOutcome, SyncError> {
        let extrema = db::transaction::time_extrema(self.pool).await?;
        let target = horizon.timestamp();

        let mut min_time = extrema.min_block_time;
        if let Some(min) = min_time {
            if min <= target {
                debug!("history already covers horizon {}", target);
                return Ok(SyncOutcome::default());
            }
        }

        let cursor_seed = extrema.min_burn_block_time.or(extrema.min_block_time);
        let mut cursor = match cursor_seed {
            Some(oldest) => oldest - 1,
            None => Utc::now().timestamp(),
        };

        let mut outcome = SyncOutcome::default();

        while outcome.pages_fetched < self.max_pages {
            debug!(
                "fetching historical page {}/{} (cursor {})",
                outcome.pages_fetched + 1,
                self.max_pages,
                cursor
            );
            let step = self
                .fetch_step(Some(cursor), false, BACKFILL_PAGE_TTL)
                .await?;
            outcome.pages_fetched += 1;

            if step.raw_count == 0 {
                break;
            }
            outcome.records_upserted += step.accepted.len();
            outcome.records_dropped += step.dropped();

            if let Some(page_min) = step.accepted_min_time() {
                let reached = match min_time {
                    Some(current) => current.min(page_min),
                    None => page_min,
                };
                min_time = Some(reached);
                if reached <= target {
                    break;
                }
            }

            match step.next_cursor {
                Some(next) if next < cursor => cursor = next,
                Some(next) => {
                    warn!(
                        "historical cursor failed to decrease ({} -> {}); stopping",
                        cursor, next
                    );
                    break;
                }
                None => break,
            }
        }

        info!(
            "historical sync: {} pages, {} records upserted, {} dropped by filter",
            outcome.pages_fetched, outcome.records_upserted, outcome.records_dropped
        );
        Ok(outcome)
    }

    /// Run both phases so the store covers at least the last `max_days` days.
    /// `force_refresh` wipes the store first and re-walks from scratch.
    pub async fn ensure_history(
        &self,
        max_days: i64,
        force_refresh: bool,
    ) -> Result<SyncOutcome, SyncError> {
        if max_days <= 0 {
            return Err(SyncError::InvalidHorizon(max_days));
        }

        if force_refresh {
            warn!("wiping transaction store for forced refresh");
            db::transaction::wipe_transactions(self.pool).await?;
        }

        let mut outcome = self.sync_latest().await?;
        let horizon = Utc::now() - ChronoDuration::days(max_days);
        outcome.merge(self.sync_history(horizon).await?);
        Ok(outcome)
    }
}
