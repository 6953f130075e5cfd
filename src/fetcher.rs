use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::db;
use crate::models::{FeedbackRecord, QueryLogRecord};

// Read-through cache for one-shot queries, keyed by the request's limit.
// Entries go stale after one poll interval; there is no ambient global copy.
pub struct QueryCache<T> {
    ttl: Duration,
    entries: HashMap<i64, CacheEntry<T>>,
}

struct CacheEntry<T> {
    rows: Vec<T>,
    fetched_at: DateTime<Utc>,
}

impl<T: Clone> QueryCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    pub fn lookup(&self, limit: i64, now: DateTime<Utc>) -> Option<&[T]> {
        let entry = self.entries.get(&limit)?;
        let age = now.signed_duration_since(entry.fetched_at);
        if age.num_milliseconds() < self.ttl.as_millis() as i64 {
            Some(&entry.rows)
        } else {
            None
        }
    }

    pub fn store(&mut self, limit: i64, rows: Vec<T>, now: DateTime<Utc>) {
        self.entries.insert(limit, CacheEntry { rows, fetched_at: now });
    }
}

pub async fn cached_feedback(
    cache: &mut QueryCache<FeedbackRecord>,
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<FeedbackRecord>> {
    let now = Utc::now();
    if let Some(rows) = cache.lookup(limit, now) {
        debug!(limit, "feedback cache hit");
        return Ok(rows.to_vec());
    }
    let rows = db::fetch_feedback(pool, limit).await?;
    cache.store(limit, rows.clone(), now);
    Ok(rows)
}

pub async fn cached_query_logs(
    cache: &mut QueryCache<QueryLogRecord>,
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<QueryLogRecord>> {
    let now = Utc::now();
    if let Some(rows) = cache.lookup(limit, now) {
        debug!(limit, "query log cache hit");
        return Ok(rows.to_vec());
    }
    let rows = db::fetch_query_logs(pool, limit).await?;
    cache.store(limit, rows.clone(), now);
    Ok(rows)
}

#[derive(Debug, Clone, Copy)]
pub struct FeedOptions {
    pub limit: i64,
    pub interval: Duration,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            limit: 50,
            interval: Duration::from_secs(10),
        }
    }
}

// Last completed poll, published over a watch channel: consumers always
// observe the newest value, never a backlog.
#[derive(Debug, Clone, Default)]
pub struct FeedSnapshot {
    pub records: Option<Vec<FeedbackRecord>>,
    pub error: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
    pub polls: u64,
}

impl FeedSnapshot {
    pub fn is_loading(&self) -> bool {
        self.polls == 0
    }

    pub fn rows(&self) -> &[FeedbackRecord] {
        self.records.as_deref().unwrap_or(&[])
    }

    fn absorb(mut self, outcome: Result<Vec<FeedbackRecord>>, now: DateTime<Utc>) -> Self {
        self.polls += 1;
        match outcome {
            Ok(records) => {
                self.records = Some(records);
                self.error = None;
                self.fetched_at = Some(now);
            }
            Err(error) => {
                // Keep the last good rows and their timestamp; the next
                // scheduled poll is the only retry.
                self.error = Some(format!("{error:#}"));
            }
        }
        self
    }
}

pub struct FeedbackFeed {
    rx: watch::Receiver<FeedSnapshot>,
    task: JoinHandle<()>,
}

impl FeedbackFeed {
    pub fn start(pool: PgPool, options: FeedOptions) -> Self {
        let (tx, rx) = watch::channel(FeedSnapshot::default());
        let task = tokio::spawn(run_feed(tx, options.interval, move || {
            let pool = pool.clone();
            async move { db::fetch_feedback(&pool, options.limit).await }
        }));
        Self { rx, task }
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.rx.clone()
    }
}

impl Drop for FeedbackFeed {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_feed<F, Fut>(tx: watch::Sender<FeedSnapshot>, interval: Duration, mut fetch: F)
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Vec<FeedbackRecord>>> + Send,
{
    let mut ticker = tokio::time::interval(interval);
    // A slow fetch delays the next tick instead of bursting to catch up.
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let outcome = fetch().await;
        if let Err(error) = &outcome {
            warn!("feedback poll failed: {error:#}");
        }
        let current = tx.borrow().clone();
        let next = current.absorb(outcome, Utc::now());
        debug!(polls = next.polls, rows = next.rows().len(), "feedback poll finished");
        if tx.send(next).is_err() {
            // Every receiver is gone; stop scheduling polls.
            break;
        }
    }
}
