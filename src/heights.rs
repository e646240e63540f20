use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use std::collections::HashMap;

use crate::DecodedRecord;

const LOG_EVERY: usize = 100;

/// Elevation lookup backend: (latitude, longitude) to elevation in meters,
/// or None when the service has no data for that location.
pub trait ElevationProvider {
    fn elevation(&self, latitude: f64, longitude: f64) -> Result<Option<f64>>;
}

/// Coordinate-keyed elevation cache. Owned by the caller so its lifetime is
/// explicit and a fake backend can inspect it in tests.
pub type HeightCache = HashMap<String, f64>;

pub fn cache_key(latitude: f64, longitude: f64) -> String {
    format!("{},{}", latitude, longitude)
}

/// Fill in missing heights on decoded records from the provider, going
/// through the cache first. Lookups that fail or return nothing leave the
/// height missing; the pipeline carries on either way.
pub fn fill_missing_heights(
    records: &mut [DecodedRecord],
    provider: &dyn ElevationProvider,
    cache: &mut HeightCache,
) -> usize {
    let missing = records.iter().filter(|r| r.height.is_none()).count();
    if missing == 0 {
        info!("No missing heights found.");
        return 0;
    }

    let mut filled = 0;
    let mut processed = 0;
    for record in records.iter_mut().filter(|r| r.height.is_none()) {
        processed += 1;
        let key = cache_key(record.latitude, record.longitude);
        let height = match cache.get(&key) {
            Some(height) => Some(*height),
            None => match provider.elevation(record.latitude, record.longitude) {
                Ok(Some(height)) => {
                    cache.insert(key, height);
                    Some(height)
                }
                Ok(None) => {
                    warn!(
                        "No elevation found for location {}, {}.",
                        record.latitude, record.longitude
                    );
                    None
                }
                Err(err) => {
                    warn!(
                        "Failed to fetch elevation for location {}, {}: {}",
                        record.latitude, record.longitude, err
                    );
                    None
                }
            },
        };

        if let Some(height) = height {
            record.height = Some(height);
            filled += 1;
        }
        if processed % LOG_EVERY == 0 {
            info!("Processed {} of {} missing heights.", processed, missing);
        }
    }
    filled
}

/// Client for an elevation API that answers
/// `GET {url}?locations={lat},{lon}&key={key}` with
/// `{"results": [{"elevation": ...}]}`.
pub struct HttpElevationProvider {
    client: reqwest::blocking::Client,
    api_url: String,
    api_key: String,
}

impl HttpElevationProvider {
    pub fn new(api_url: String, api_key: String) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            api_url,
            api_key,
        }
    }
}

impl ElevationProvider for HttpElevationProvider {
    fn elevation(&self, latitude: f64, longitude: f64) -> Result<Option<f64>> {
        let url = format!(
            "{}?locations={},{}&key={}",
            self.api_url, latitude, longitude, self.api_key
        );
        let response = self
            .client
            .get(&url)
            .send()
            .context("Elevation request failed")?;
        if !response.status().is_success() {
            return Err(anyhow!("Elevation service returned {}", response.status()));
        }
        let body: serde_json::Value = response
            .json()
            .context("Elevation response was not valid JSON")?;
        Ok(body
            .get("results")
            .and_then(|results| results.get(0))
            .and_then(|result| result.get("elevation"))
            .and_then(|elevation| elevation.as_f64()))
    }
}
