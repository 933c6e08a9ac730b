use std::time::Instant;

use anyhow::Result;
use tracing::{info, warn};

use gsv_harvester::{
    group_ids, init_tracing, load_points, AppConfig, Harvester, MetadataService, ResultStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = AppConfig::from_env();

    let points = load_points(&config.points_file)?;
    if points.is_empty() {
        warn!(file = %config.points_file.display(), "no usable points in input file");
        return Ok(());
    }

    let service = MetadataService::new(&config)?;
    let store = ResultStore::new(&config.output_dir)?;
    let harvester = Harvester::new(service, store, &config);

    let groups = match config.group_filter {
        Some(group) => vec![group],
        None => group_ids(&points),
    };

    for group in groups {
        let started = Instant::now();
        let stats = harvester.process_group(group, &points).await?;
        info!(
            group,
            total = stats.total,
            with_data = stats.with_data,
            zero_results = stats.zero_results,
            failed = stats.failed,
            unique_pano_ids = stats.unique_pano_ids,
            elapsed_secs = started.elapsed().as_secs_f64(),
            "group complete"
        );
    }

    Ok(())
}
