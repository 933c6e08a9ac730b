use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::AppResult;
use crate::metadata::{
    FetchOutcome, FAILED_PANO_ID, NO_COVERAGE_PANO_ID, STATUS_OK, STATUS_ZERO_RESULTS,
};
use crate::points::Point;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultRow {
    pub lat: f64,
    pub lng: f64,
    pub kml: i64,
    pub ret_lat: f64,
    pub ret_lng: f64,
    pub pano_id: String,
    pub status: String,
}

impl ResultRow {
    pub fn new(point: &Point, outcome: FetchOutcome) -> Self {
        let mut row = Self {
            lat: point.lat,
            lng: point.lng,
            kml: point.group,
            ret_lat: 0.0,
            ret_lng: 0.0,
            pano_id: FAILED_PANO_ID.to_string(),
            status: String::new(),
        };
        row.record(outcome);
        row
    }

    pub fn record(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Found { lat, lng, pano_id } => {
                self.ret_lat = lat;
                self.ret_lng = lng;
                self.pano_id = pano_id;
                self.status = STATUS_OK.to_string();
            }
            FetchOutcome::NotFound => {
                self.ret_lat = -1.0;
                self.ret_lng = -1.0;
                self.pano_id = NO_COVERAGE_PANO_ID.to_string();
                self.status = STATUS_ZERO_RESULTS.to_string();
            }
            FetchOutcome::Transient { reason } => {
                self.ret_lat = 0.0;
                self.ret_lng = 0.0;
                self.pano_id = FAILED_PANO_ID.to_string();
                self.status = reason;
            }
        }
    }

    pub fn needs_retry(&self) -> bool {
        self.pano_id == FAILED_PANO_ID
    }
}

pub struct ResultStore {
    output_dir: PathBuf,
}

impl ResultStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> AppResult<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        Ok(Self { output_dir })
    }

    pub fn table_path(&self, group: i64) -> PathBuf {
        self.output_dir.join(format!("points-{group}-metadata.csv"))
    }

    pub fn exists(&self, group: i64) -> bool {
        self.table_path(group).exists()
    }

    pub fn load(&self, group: i64) -> AppResult<Vec<ResultRow>> {
        let mut reader = csv::Reader::from_path(self.table_path(group))?;
        let mut rows = Vec::new();
        for record in reader.deserialize::<ResultRow>() {
            rows.push(record?);
        }
        Ok(rows)
    }

    // Staged write plus rename, so an interrupted save never clobbers a
    // previously persisted table.
    pub fn save(&self, group: i64, rows: &[ResultRow]) -> AppResult<()> {
        let path = self.table_path(group);
        let staging = path.with_extension("csv.tmp");
        {
            let mut writer = csv::Writer::from_path(&staging)?;
            for row in rows {
                writer.serialize(row)?;
            }
            writer.flush()?;
        }
        fs::rename(&staging, &path)?;
        debug!(group, rows = rows.len(), path = %path.display(), "result table persisted");
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TableStats {
    pub total: usize,
    pub with_data: usize,
    pub zero_results: usize,
    pub failed: usize,
    pub unique_pano_ids: usize,
}

pub fn table_stats(rows: &[ResultRow]) -> TableStats {
    let mut unique = HashSet::new();
    let mut with_data = 0;
    let mut zero_results = 0;
    let mut failed = 0;
    for row in rows {
        if row.status == STATUS_OK {
            with_data += 1;
            unique.insert(row.pano_id.as_str());
        } else if row.status == STATUS_ZERO_RESULTS {
            zero_results += 1;
        }
        if row.needs_retry() {
            failed += 1;
        }
    }
    TableStats {
        total: rows.len(),
        with_data,
        zero_results,
        failed,
        unique_pano_ids: unique.len(),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn point(id: u64, group: i64) -> Point {
        Point {
            id,
            lat: 1.0 + id as f64,
            lng: 103.0 + id as f64,
            group,
        }
    }

    fn found(pano: &str) -> FetchOutcome {
        FetchOutcome::Found {
            lat: 9.0,
            lng: 9.5,
            pano_id: pano.to_string(),
        }
    }

    #[test]
    fn rows_carry_outcome_sentinels() {
        let ok = ResultRow::new(&point(0, 1), found("pano-1"));
        assert_eq!(ok.pano_id, "pano-1");
        assert_eq!(ok.status, STATUS_OK);
        assert!(!ok.needs_retry());

        let missing = ResultRow::new(&point(1, 1), FetchOutcome::NotFound);
        assert_eq!(missing.ret_lat, -1.0);
        assert_eq!(missing.pano_id, NO_COVERAGE_PANO_ID);
        assert!(!missing.needs_retry());

        let failed = ResultRow::new(&point(2, 1), FetchOutcome::transient("timeout"));
        assert_eq!(failed.ret_lat, 0.0);
        assert_eq!(failed.pano_id, FAILED_PANO_ID);
        assert_eq!(failed.status, "timeout_retrieve_again");
        assert!(failed.needs_retry());
    }

    #[test]
    fn saves_and_reloads_rows_in_order() {
        let dir = tempdir().unwrap();
        let store = ResultStore::new(dir.path()).unwrap();
        let rows = vec![
            ResultRow::new(&point(0, 3), found("pano-a")),
            ResultRow::new(&point(1, 3), FetchOutcome::NotFound),
            ResultRow::new(&point(2, 3), FetchOutcome::transient("boom")),
        ];

        assert!(!store.exists(3));
        store.save(3, &rows).unwrap();
        assert!(store.exists(3));

        let loaded = store.load(3).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].pano_id, "pano-a");
        assert_eq!(loaded[1].pano_id, NO_COVERAGE_PANO_ID);
        assert_eq!(loaded[2].status, "boom_retrieve_again");
        assert!(!store.table_path(3).with_extension("csv.tmp").exists());
    }

    #[test]
    fn save_replaces_table_atomically() {
        let dir = tempdir().unwrap();
        let store = ResultStore::new(dir.path()).unwrap();
        let before = vec![ResultRow::new(&point(0, 5), FetchOutcome::transient("boom"))];
        store.save(5, &before).unwrap();

        let mut after = store.load(5).unwrap();
        after[0].record(found("pano-b"));
        store.save(5, &after).unwrap();

        let loaded = store.load(5).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].pano_id, "pano-b");
    }

    #[test]
    fn stats_count_statuses_and_distinct_panos() {
        let rows = vec![
            ResultRow::new(&point(0, 1), found("pano-a")),
            ResultRow::new(&point(1, 1), found("pano-a")),
            ResultRow::new(&point(2, 1), found("pano-b")),
            ResultRow::new(&point(3, 1), FetchOutcome::NotFound),
            ResultRow::new(&point(4, 1), FetchOutcome::transient("boom")),
        ];

        let stats = table_stats(&rows);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.with_data, 3);
        assert_eq!(stats.zero_results, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.unique_pano_ids, 2);
    }
}
