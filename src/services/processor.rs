//! Per-record geocoding pipeline
//!
//! Takes one address record, decides whether a lookup is needed, queries the
//! geocoder, and persists coordinates when they differ from what is stored.
//! Failures are captured in the returned `ProcessResult` — a bad record
//! never takes down the batch around it.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::db::AddressStore;
use crate::services::geocoding::{GeocodeHit, GeocodeQuery, Geocoder};
use crate::types::{AddressRecord, Coordinates, ProcessResult};

/// Apartment/unit fragments that confuse street-level lookups:
/// "Apt 4B", "apartment 12", "Unit 7-A", "# 301". Stripped before querying.
static UNIT_FRAGMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:apt|apartment|unit)\b\.?\s*#?\s*[0-9a-z-]+\s*,?|#\s*[0-9a-z-]+\s*,?")
        .expect("invalid unit fragment pattern")
});

/// Remove apartment/unit fragments and tidy up the separators left behind.
pub fn strip_unit_fragments(full_address: &str) -> String {
    let stripped = UNIT_FRAGMENT.replace_all(full_address, "");
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .replace(" ,", ",")
        .replace(",,", ",")
        .trim_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}

/// Build the geocoding query for a record. An address that is exactly the
/// record's country name becomes a structured country lookup; everything
/// else is free text with unit fragments stripped.
fn build_query(full_address: &str, country: Option<&str>) -> GeocodeQuery {
    if let Some(country) = country.map(str::trim).filter(|c| !c.is_empty()) {
        if full_address.eq_ignore_ascii_case(country) {
            return GeocodeQuery::Country(country.to_string());
        }
    }
    GeocodeQuery::FreeText(strip_unit_fragments(full_address))
}

/// Collapse a hit to a single point: country boxes become their midpoint,
/// point matches are taken as-is.
fn resolve_point(query: &GeocodeQuery, hit: &GeocodeHit) -> (f64, f64) {
    match (query, hit.bounding_box) {
        (GeocodeQuery::Country(_), Some(bbox)) => bbox.midpoint(),
        _ => (hit.lat, hit.lon),
    }
}

/// A record with unset coordinates is always eligible for a write;
/// otherwise both axes must match exactly for the write to be skipped.
fn coordinates_changed(record: &AddressRecord, new: Coordinates) -> bool {
    if !record.has_coordinates() {
        return true;
    }
    record.lat != Some(new.lat) || record.long != Some(new.long)
}

/// Address processor: stateless per call, at most one store write and one
/// geocoder query (the fetcher may retry internally) per record.
pub struct AddressProcessor {
    store: Arc<dyn AddressStore>,
    geocoder: Arc<dyn Geocoder>,
}

impl AddressProcessor {
    pub fn new(store: Arc<dyn AddressStore>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self { store, geocoder }
    }

    pub async fn process(&self, record: &AddressRecord) -> ProcessResult {
        let full_address = match record.full_address_text.as_deref().map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => {
                warn!(id = %record.id, "record has no address text");
                return ProcessResult::error(record.id, "no address text available");
            }
        };

        let query = build_query(full_address, record.country.as_deref());

        let hit = match self.geocoder.geocode(&query).await {
            Ok(Some(hit)) => hit,
            Ok(None) => {
                info!(id = %record.id, "geocoder found no coordinates for address");
                return ProcessResult::not_found(record.id, full_address);
            }
            Err(e) => {
                warn!(id = %record.id, error = %e, "geocoding request failed");
                return ProcessResult::error(record.id, e.to_string());
            }
        };

        let (lat, long) = resolve_point(&query, &hit);
        let new = Coordinates { lat, long };

        if !coordinates_changed(record, new) {
            debug!(id = %record.id, "coordinates unchanged, skipping write");
            return ProcessResult::unchanged(record.id, full_address, new);
        }

        let old = match (record.lat, record.long) {
            (Some(lat), Some(long)) => Some(Coordinates { lat, long }),
            _ => None,
        };

        match self.store.update_coordinates(record.id, lat, long).await {
            Ok(()) => {
                info!(id = %record.id, lat, long, "coordinates updated");
                ProcessResult::updated(record.id, full_address, old, new)
            }
            Err(e) => {
                error!(id = %record.id, error = %e, "failed to persist coordinates");
                ProcessResult::error(record.id, e.to_string())
            }
        }
    }
}
