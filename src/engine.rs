use std::collections::HashMap;
use std::time::Duration;

use futures_util::{stream, StreamExt};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::errors::AppResult;
use crate::metadata::{FetchOutcome, MetadataService};
use crate::points::Point;
use crate::store::{table_stats, ResultRow, ResultStore, TableStats};

const PACE_WINDOW: Duration = Duration::from_secs(1);

// One batch per pacing window keeps the service below its per-second ceiling,
// so batches hold at most ceiling - 1 requests.
pub fn plan_batches(points: &[Point], ceiling: usize) -> Vec<&[Point]> {
    if points.is_empty() {
        return Vec::new();
    }
    let batch_size = points.len().min(ceiling.saturating_sub(1)).max(1);
    points.chunks(batch_size).collect()
}

pub struct Pacer {
    window: Duration,
}

impl Pacer {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub async fn hold(&self, started: Instant) {
        let elapsed = started.elapsed();
        if elapsed < self.window {
            sleep(self.window - elapsed).await;
        }
    }
}

pub struct Harvester {
    service: MetadataService,
    store: ResultStore,
    api_limit: usize,
    max_in_flight: usize,
    max_retry_passes: Option<u32>,
    pacer: Pacer,
}

impl Harvester {
    pub fn new(service: MetadataService, store: ResultStore, config: &AppConfig) -> Self {
        Self {
            service,
            store,
            api_limit: config.api_limit,
            max_in_flight: config.max_in_flight,
            max_retry_passes: config.max_retry_passes,
            pacer: Pacer::new(PACE_WINDOW),
        }
    }

    pub async fn process_group(&self, group: i64, points: &[Point]) -> AppResult<TableStats> {
        let members: Vec<Point> = points
            .iter()
            .filter(|point| point.group == group)
            .cloned()
            .collect();
        self.run_initial(group, &members).await?;
        self.retry_failed(group).await?;
        Ok(table_stats(&self.store.load(group)?))
    }

    pub async fn run_initial(&self, group: i64, points: &[Point]) -> AppResult<()> {
        if self.store.exists(group) {
            info!(group, "result table already present; skipping fetch");
            return Ok(());
        }

        info!(group, points = points.len(), "fetching metadata");
        let mut outcomes = self.run_pass(points).await;
        let rows: Vec<ResultRow> = points
            .iter()
            .map(|point| {
                let outcome = outcomes
                    .remove(&point.id)
                    .expect("one outcome per fetched point");
                ResultRow::new(point, outcome)
            })
            .collect();
        self.store.save(group, &rows)
    }

    pub async fn retry_failed(&self, group: i64) -> AppResult<()> {
        let mut pass = 0u32;
        loop {
            let mut table = self.store.load(group)?;
            let pending = failed_points(&table);
            if pending.is_empty() {
                debug!(group, "no rows left to retry");
                return Ok(());
            }
            if let Some(limit) = self.max_retry_passes {
                if pass >= limit {
                    warn!(
                        group,
                        remaining = pending.len(),
                        "retry pass limit reached; leaving rows failed"
                    );
                    return Ok(());
                }
            }
            pass += 1;
            info!(group, pending = pending.len(), pass, "retrying failed rows");

            let outcomes = self.run_pass(&pending).await;
            for (index, row) in table.iter_mut().enumerate() {
                if let Some(outcome) = outcomes.get(&(index as u64)) {
                    row.record(outcome.clone());
                }
            }
            self.store.save(group, &table)?;
        }
    }

    async fn run_pass(&self, points: &[Point]) -> HashMap<u64, FetchOutcome> {
        let batches = plan_batches(points, self.api_limit);
        let total = batches.len();
        let mut outcomes = HashMap::with_capacity(points.len());
        for (index, batch) in batches.into_iter().enumerate() {
            let started = Instant::now();
            let fetched = self.fetch_batch(batch).await;
            debug!(
                batch = index + 1,
                total,
                size = fetched.len(),
                "batch complete"
            );
            outcomes.extend(fetched);
            if index + 1 < total {
                self.pacer.hold(started).await;
            }
        }
        outcomes
    }

    pub async fn fetch_batch(&self, batch: &[Point]) -> Vec<(u64, FetchOutcome)> {
        stream::iter(batch)
            .map(|point| {
                let service = self.service.clone();
                async move { (point.id, service.fetch(point).await) }
            })
            .buffer_unordered(self.max_in_flight)
            .collect()
            .await
    }
}

// Failed rows are re-fetched under their table index so corrections merge
// back by row identity rather than position within the retry subset.
fn failed_points(table: &[ResultRow]) -> Vec<Point> {
    table
        .iter()
        .enumerate()
        .filter(|(_, row)| row.needs_retry())
        .map(|(index, row)| Point {
            id: index as u64,
            lat: row.lat,
            lng: row.lng,
            group: row.kml,
        })
        .collect()
}
