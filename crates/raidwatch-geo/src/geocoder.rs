//! Place-name geocoding with a pass-scoped, single-flight cache.
//!
//! A *pass* is one rendering of the current state. Within a pass every
//! distinct name is sent to the provider at most once; concurrent callers
//! asking for the same name wait for the first lookup instead of issuing
//! their own. Failed lookups are cached too, so a bad name costs one
//! request per pass.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::time::Duration;

use chrono::Utc;
use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use raidwatch_core::constants::{GEOCODE_COUNTRIES, GEOCODE_LANGUAGES};
use raidwatch_core::types::GeoPoint;

use crate::audit::{GeocodeAttempt, GeocodeAudit};

/// Errors returned by a geocoding provider.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid geocoding endpoint: {0}")]
    Endpoint(String),
    #[error("geocoding provider error: {0}")]
    Provider(String),
}

/// External forward-geocoding service.
pub trait GeocodingProvider: Send + Sync {
    /// Candidate coordinates for `name`, best match first.
    fn forward_geocode(
        &self,
        name: &str,
        languages: &[&str],
        countries: &[&str],
    ) -> Result<Vec<GeoPoint>, GeocodeError>;
}

/// Anything that can turn a place name into a coordinate.
pub trait PlaceLookup {
    fn lookup(&self, name: &str) -> Option<GeoPoint>;
}

const MAPTILER_DEFAULT_URL: &str = "https://api.maptiler.com/geocoding/";

/// MapTiler forward geocoding over blocking HTTP.
pub struct MapTilerProvider {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    /// `[lon, lat]`
    center: [f64; 2],
}

impl MapTilerProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, GeocodeError> {
        Self::with_base_url(api_key, MAPTILER_DEFAULT_URL)
    }

    /// Point the provider at a different endpoint (self-hosted or proxy).
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, GeocodeError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }

    fn request_url(&self, name: &str) -> Result<Url, GeocodeError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| GeocodeError::Endpoint(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| GeocodeError::Endpoint(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .push(&format!("{name}.json"));
        Ok(url)
    }
}

impl GeocodingProvider for MapTilerProvider {
    fn forward_geocode(
        &self,
        name: &str,
        languages: &[&str],
        countries: &[&str],
    ) -> Result<Vec<GeoPoint>, GeocodeError> {
        let url = self.request_url(name)?;
        let languages = languages.join(",");
        let countries = countries.join(",");
        let response = self
            .client
            .get(url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("limit", "1"),
                ("language", languages.as_str()),
                ("country", countries.as_str()),
            ])
            .send()?;
        if !response.status().is_success() {
            return Err(GeocodeError::Provider(format!(
                "provider responded with {}",
                response.status()
            )));
        }
        let body: FeatureCollection = response.json()?;
        Ok(body
            .features
            .into_iter()
            .map(|f| GeoPoint::new(f.center[0], f.center[1]))
            .collect())
    }
}

type Slot = Arc<OnceLock<Option<GeoPoint>>>;

/// Geocoding context for one rendering pass.
pub struct GeocodePass<'a> {
    pass_id: String,
    provider: &'a dyn GeocodingProvider,
    audit: &'a dyn GeocodeAudit,
    cache: Mutex<HashMap<String, Slot>>,
}

impl<'a> GeocodePass<'a> {
    pub fn new(
        pass_id: impl Into<String>,
        provider: &'a dyn GeocodingProvider,
        audit: &'a dyn GeocodeAudit,
    ) -> Self {
        Self {
            pass_id: pass_id.into(),
            provider,
            audit,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn pass_id(&self) -> &str {
        &self.pass_id
    }

    /// Resolve a name, hitting the provider only on the first request in
    /// this pass.
    pub fn resolve(&self, name: &str) -> Option<GeoPoint> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        let slot = {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(cache.entry(name.to_string()).or_default())
        };
        *slot.get_or_init(|| self.fetch(name))
    }

    /// Resolve every distinct name concurrently, one thread per name.
    /// Results land in the cache; later `resolve` calls are free.
    pub fn prefetch<'n>(&self, names: impl IntoIterator<Item = &'n str>) {
        let distinct: HashSet<&str> = names
            .into_iter()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .collect();
        if distinct.len() <= 1 {
            distinct.into_iter().for_each(|n| {
                self.resolve(n);
            });
            return;
        }
        std::thread::scope(|scope| {
            for name in distinct {
                scope.spawn(move || {
                    self.resolve(name);
                });
            }
        });
    }

    /// Number of distinct names looked up so far.
    pub fn cached_len(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn fetch(&self, name: &str) -> Option<GeoPoint> {
        let coords = match self
            .provider
            .forward_geocode(name, &GEOCODE_LANGUAGES, &GEOCODE_COUNTRIES)
        {
            Ok(candidates) => {
                let first = candidates.into_iter().next();
                match first {
                    Some(point) => debug!(location = name, lon = point.lon, lat = point.lat, "Geocoded"),
                    None => warn!(location = name, "No geocoding results"),
                }
                first
            }
            Err(e) => {
                warn!(location = name, error = %e, "Geocoding failed");
                None
            }
        };
        self.audit.record(&GeocodeAttempt {
            pass_id: self.pass_id.clone(),
            location_name: name.to_string(),
            coords,
            success: coords.is_some(),
            timestamp: Utc::now(),
        });
        coords
    }
}

impl PlaceLookup for GeocodePass<'_> {
    fn lookup(&self, name: &str) -> Option<GeoPoint> {
        self.resolve(name)
    }
}
