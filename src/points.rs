use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::errors::AppResult;

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: u64,
    pub lat: f64,
    pub lng: f64,
    pub group: i64,
}

#[derive(Debug, Deserialize)]
struct RawPointRecord {
    x: Option<f64>,
    y: Option<f64>,
    kml: Option<i64>,
}

// Row identity is the record's position in the input file; rows with missing
// fields are dropped without shifting the ids of later rows.
pub fn load_points(path: &Path) -> AppResult<Vec<Point>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut points = Vec::new();
    let mut dropped = 0usize;
    for (index, record) in reader.deserialize::<RawPointRecord>().enumerate() {
        let record = record?;
        let (Some(x), Some(y), Some(kml)) = (record.x, record.y, record.kml) else {
            dropped += 1;
            continue;
        };
        points.push(Point {
            id: index as u64,
            lat: y,
            lng: x,
            group: kml,
        });
    }
    if dropped > 0 {
        debug!(dropped, "dropped incomplete rows from input file");
    }
    Ok(points)
}

pub fn group_ids(points: &[Point]) -> Vec<i64> {
    let mut seen = HashSet::new();
    points
        .iter()
        .filter(|point| seen.insert(point.group))
        .map(|point| point.group)
        .collect()
}
