mod config;
mod engine;
mod errors;
mod metadata;
mod points;
mod signing;
mod store;

use once_cell::sync::OnceCell;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub use config::AppConfig;
pub use engine::{plan_batches, Harvester, Pacer};
pub use errors::{AppError, AppResult};
pub use metadata::{
    FetchOutcome, HttpMetadataClient, MetadataLookup, MetadataService, FAILED_PANO_ID,
    NO_COVERAGE_PANO_ID, STATUS_OK, STATUS_ZERO_RESULTS,
};
pub use points::{group_ids, load_points, Point};
pub use signing::{sign, UrlSigner};
pub use store::{table_stats, ResultRow, ResultStore, TableStats};

pub fn init_tracing() {
    static INIT: OnceCell<()> = OnceCell::new();
    let _ = INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,gsv_harvester=debug"));
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    });
}
