use std::{env, io, path::PathBuf};

use secrecy::SecretString;
use tracing::debug;

const DEFAULT_API_LIMIT: usize = 500;
const DEFAULT_MAX_IN_FLIGHT: usize = 1000;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_METADATA_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/streetview";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api_key: Option<SecretString>,
    pub signing_secret: Option<SecretString>,
    pub api_limit: usize,
    pub max_in_flight: usize,
    pub image_size: String,
    pub fov: u32,
    pub heading: u32,
    pub metadata_endpoint: String,
    pub points_file: PathBuf,
    pub output_dir: PathBuf,
    pub group_filter: Option<i64>,
    pub max_retry_passes: Option<u32>,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        load_dotenv_if_applicable();
        Self {
            api_key: secret_var("GSV_API_KEY"),
            signing_secret: secret_var("GSV_SIGNING_SECRET"),
            api_limit: parse_usize("GSV_API_LIMIT", DEFAULT_API_LIMIT).max(1),
            max_in_flight: parse_usize("GSV_MAX_IN_FLIGHT", DEFAULT_MAX_IN_FLIGHT).max(1),
            image_size: env::var("GSV_IMAGE_SIZE").unwrap_or_else(|_| "200x200".to_string()),
            fov: parse_u32("GSV_FOV", 120),
            heading: parse_u32("GSV_HEADING", 0),
            metadata_endpoint: env::var("GSV_METADATA_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_METADATA_ENDPOINT.to_string()),
            points_file: env::var("GSV_POINTS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("extracted_points.csv")),
            output_dir: env::var("GSV_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("gsv_metadata")),
            group_filter: parse_opt_i64("GSV_GROUP"),
            max_retry_passes: parse_opt_u32("GSV_MAX_RETRY_PASSES"),
            request_timeout_secs: parse_u64(
                "GSV_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
        }
    }
}

fn load_dotenv_if_applicable() {
    if !should_load_dotenv() {
        debug!("skipping .env load outside dev mode");
        return;
    }

    if let Err(err) = dotenvy::dotenv() {
        match &err {
            dotenvy::Error::Io(io_err) if io_err.kind() == io::ErrorKind::NotFound => {}
            _ => debug!(?err, "unable to load .env file"),
        }
    }
}

fn should_load_dotenv() -> bool {
    cfg!(debug_assertions) || parse_bool("ALLOW_DOTENV", false)
}

fn secret_var(key: &str) -> Option<SecretString> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(SecretString::from)
}

fn parse_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim(), "1" | "true" | "TRUE" | "True"))
        .unwrap_or(default)
}

fn parse_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_usize(key: &str, default: usize) -> usize {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(default)
}

fn parse_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(default)
}

fn parse_opt_u32(key: &str) -> Option<u32> {
    env::var(key).ok().and_then(|v| v.parse::<u32>().ok())
}

fn parse_opt_i64(key: &str) -> Option<i64> {
    env::var(key).ok().and_then(|v| v.parse::<i64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_overrides_and_defaults_from_env() {
        env::set_var("GSV_API_KEY", "test-key");
        env::set_var("GSV_SIGNING_SECRET", "c2VjcmV0");
        env::set_var("GSV_API_LIMIT", "50");
        env::set_var("GSV_GROUP", "7");
        env::remove_var("GSV_MAX_IN_FLIGHT");
        env::remove_var("GSV_MAX_RETRY_PASSES");

        let config = AppConfig::from_env();

        assert!(config.api_key.is_some());
        assert!(config.signing_secret.is_some());
        assert_eq!(config.api_limit, 50);
        assert_eq!(config.max_in_flight, DEFAULT_MAX_IN_FLIGHT);
        assert_eq!(config.group_filter, Some(7));
        assert_eq!(config.max_retry_passes, None);
        assert_eq!(config.image_size, "200x200");
        assert_eq!(config.fov, 120);
        assert_eq!(config.metadata_endpoint, DEFAULT_METADATA_ENDPOINT);
    }
}
