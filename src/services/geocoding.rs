//! Geocoding abstraction layer
//!
//! All coordinate lookups go through the `Geocoder` trait:
//! - `MockGeocoder` — deterministic, no network; used by tests and selected
//!   by `GEOCODER_BACKEND=mock` for development.
//! - `NominatimGeocoder` — production backend over `NominatimClient`, which
//!   already handles throttling and retries.
//!
//! A query is either free text or a structured country lookup; country hits
//! carry a bounding box so the caller can collapse them to a midpoint.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::services::nominatim::{NominatimClient, NominatimPlace};

/// What to ask the geocoding service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeocodeQuery {
    FreeText(String),
    Country(String),
}

impl GeocodeQuery {
    pub fn text(&self) -> &str {
        match self {
            GeocodeQuery::FreeText(s) | GeocodeQuery::Country(s) => s,
        }
    }
}

/// `[latMin, latMax, lonMin, lonMax]` extent of a country-level match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// Center of the box: the average of each axis' bounds.
    pub fn midpoint(&self) -> (f64, f64) {
        (
            (self.lat_min + self.lat_max) / 2.0,
            (self.lon_min + self.lon_max) / 2.0,
        )
    }
}

/// One geocoding match.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodeHit {
    pub lat: f64,
    pub lon: f64,
    pub bounding_box: Option<BoundingBox>,
}

/// Geocoder trait — abstraction over all geocoding implementations.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolve a query to its best match, or `None` if the service has no
    /// answer for it.
    async fn geocode(&self, query: &GeocodeQuery) -> Result<Option<GeocodeHit>, FetchError>;

    /// Name of this geocoder implementation.
    fn name(&self) -> &'static str;
}

// ==========================================================================
// MockGeocoder
// ==========================================================================

/// Deterministic fake geocoder. The same query always hashes to the same
/// coordinates; different queries land in different places.
pub struct MockGeocoder;

impl MockGeocoder {
    pub fn new() -> Self {
        Self
    }

    fn hash_to_point(text: &str) -> (f64, f64) {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let hash = hasher.finish();

        // Spread over inhabited latitudes, full longitude range.
        let lat_normalized = ((hash >> 32) as f64) / (u32::MAX as f64);
        let lon_normalized = ((hash & 0xFFFF_FFFF) as f64) / (u32::MAX as f64);

        (
            -55.0 + lat_normalized * 120.0,
            -180.0 + lon_normalized * 360.0,
        )
    }
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, query: &GeocodeQuery) -> Result<Option<GeocodeHit>, FetchError> {
        let (lat, lon) = Self::hash_to_point(query.text());
        let bounding_box = match query {
            GeocodeQuery::Country(_) => Some(BoundingBox {
                lat_min: lat - 2.0,
                lat_max: lat + 2.0,
                lon_min: lon - 2.0,
                lon_max: lon + 2.0,
            }),
            GeocodeQuery::FreeText(_) => None,
        };
        Ok(Some(GeocodeHit {
            lat,
            lon,
            bounding_box,
        }))
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

// ==========================================================================
// NominatimGeocoder
// ==========================================================================

/// Production geocoder backed by Nominatim.
pub struct NominatimGeocoder {
    client: NominatimClient,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: NominatimClient::new(base_url),
        }
    }
}

fn parse_place(place: &NominatimPlace) -> Option<GeocodeHit> {
    let lat: f64 = match place.lat.parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(lat = %place.lat, "unparseable latitude in geocoding result");
            return None;
        }
    };
    let lon: f64 = match place.lon.parse() {
        Ok(v) => v,
        Err(_) => {
            warn!(lon = %place.lon, "unparseable longitude in geocoding result");
            return None;
        }
    };

    let bounding_box = place.boundingbox.as_ref().and_then(|raw| {
        let parsed: Vec<f64> = raw.iter().filter_map(|s| s.parse().ok()).collect();
        match parsed[..] {
            [lat_min, lat_max, lon_min, lon_max] => Some(BoundingBox {
                lat_min,
                lat_max,
                lon_min,
                lon_max,
            }),
            _ => {
                warn!("malformed bounding box in geocoding result");
                None
            }
        }
    });

    Some(GeocodeHit {
        lat,
        lon,
        bounding_box,
    })
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &GeocodeQuery) -> Result<Option<GeocodeHit>, FetchError> {
        let places = match query {
            GeocodeQuery::FreeText(text) => self.client.search(text).await?,
            GeocodeQuery::Country(country) => self.client.search_country(country).await?,
        };

        if let Some(place) = places.first() {
            debug!(
                display_name = place.display_name.as_deref().unwrap_or(""),
                "geocoder matched"
            );
        }

        Ok(places.first().and_then(parse_place))
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

// ==========================================================================
// Factory
// ==========================================================================

/// Create a geocoder for the configured backend: `"nominatim"` for
/// production, `"mock"` for development and tests.
pub fn create_geocoder(backend: &str, nominatim_url: &str) -> Arc<dyn Geocoder> {
    match backend {
        "nominatim" => {
            info!("Using Nominatim geocoder at {}", nominatim_url);
            Arc::new(NominatimGeocoder::new(nominatim_url))
        }
        "mock" => {
            info!("Using mock geocoder");
            Arc::new(MockGeocoder::new())
        }
        other => {
            warn!("Unknown geocoder backend '{}', using mock", other);
            Arc::new(MockGeocoder::new())
        }
    }
}

// ==========================================================================
// Tests
// ==========================================================================
