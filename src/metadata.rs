use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::points::Point;
use crate::signing::UrlSigner;

pub const STATUS_OK: &str = "OK";
pub const STATUS_ZERO_RESULTS: &str = "ZERO_RESULTS";
pub const FAILED_PANO_ID: &str = "0";
pub const NO_COVERAGE_PANO_ID: &str = "-1";

const RETRY_MARKER: &str = "_retrieve_again";

#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Found { lat: f64, lng: f64, pano_id: String },
    NotFound,
    Transient { reason: String },
}

impl FetchOutcome {
    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: format!("{}{}", reason.into(), RETRY_MARKER),
        }
    }
}

#[async_trait]
pub trait MetadataLookup: Send + Sync {
    async fn fetch(&self, point: &Point) -> FetchOutcome;
}

#[derive(Clone)]
pub struct MetadataService {
    inner: Arc<dyn MetadataLookup>,
}

impl MetadataService {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        Ok(Self {
            inner: Arc::new(HttpMetadataClient::new(config)?),
        })
    }

    #[cfg(test)]
    pub fn from_lookup(lookup: Arc<dyn MetadataLookup>) -> Self {
        Self { inner: lookup }
    }

    pub async fn fetch(&self, point: &Point) -> FetchOutcome {
        self.inner.fetch(point).await
    }
}

pub struct HttpMetadataClient {
    http: reqwest::Client,
    endpoint: Url,
    api_key: SecretString,
    signer: UrlSigner,
    image_size: String,
    fov: u32,
    heading: u32,
}

impl HttpMetadataClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::Config("GSV_API_KEY must be set".into()))?;
        let secret = config
            .signing_secret
            .clone()
            .ok_or_else(|| AppError::Config("GSV_SIGNING_SECRET must be set".into()))?;
        let signer = UrlSigner::new(secret.expose_secret())?;
        let endpoint = Url::parse(&config.metadata_endpoint)
            .map_err(|err| AppError::Config(format!("invalid metadata endpoint: {err}")))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint,
            api_key,
            signer,
            image_size: config.image_size.clone(),
            fov: config.fov,
            heading: config.heading,
        })
    }

    fn metadata_url(&self, point: &Point) -> AppResult<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| AppError::Config("invalid metadata endpoint base".into()))?
            .pop_if_empty()
            .push("metadata");
        let query = format!(
            "size={}&fov={}&heading={}&location={},{}&key={}",
            self.image_size,
            self.fov,
            self.heading,
            point.lat,
            point.lng,
            self.api_key.expose_secret()
        );
        let signature = self.signer.signature(&format!("{}?{}", url.path(), query));
        url.set_query(Some(&format!("{query}&signature={signature}")));
        Ok(url)
    }

    async fn try_fetch(&self, point: &Point) -> AppResult<FetchOutcome> {
        let url = self.metadata_url(point)?;
        let response = self.http.get(url).send().await?;
        let body: MetadataResponse = response.json().await?;
        Ok(classify(body))
    }
}

#[async_trait]
impl MetadataLookup for HttpMetadataClient {
    async fn fetch(&self, point: &Point) -> FetchOutcome {
        match self.try_fetch(point).await {
            Ok(outcome) => outcome,
            Err(err) => FetchOutcome::transient(err.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MetadataResponse {
    status: String,
    location: Option<ResponseLocation>,
    pano_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseLocation {
    lat: f64,
    lng: f64,
}

fn classify(body: MetadataResponse) -> FetchOutcome {
    match body.status.as_str() {
        STATUS_OK => match (body.location, body.pano_id) {
            (Some(location), Some(pano_id)) => FetchOutcome::Found {
                lat: location.lat,
                lng: location.lng,
                pano_id,
            },
            _ => FetchOutcome::transient("OK response missing location or pano_id"),
        },
        STATUS_ZERO_RESULTS => FetchOutcome::NotFound,
        other => FetchOutcome::transient(other),
    }
}
