//! Address types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One postal address awaiting (or having undergone) geocoding.
///
/// `updated_at` is always present on stored rows but may be absent on
/// webhook payloads that submit a record for immediate processing.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    pub id: Uuid,
    pub full_address_text: Option<String>,
    pub lat: Option<f64>,
    pub long: Option<f64>,
    pub country: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl AddressRecord {
    /// Whether the record carries real coordinates. `(null, null)`, any
    /// half-set pair, and the `(0, 0)` placeholder all count as unset.
    pub fn has_coordinates(&self) -> bool {
        match (self.lat, self.long) {
            (Some(lat), Some(long)) => !(lat == 0.0 && long == 0.0),
            _ => false,
        }
    }
}

/// Coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coordinates {
    pub lat: f64,
    pub long: f64,
}

/// Outcome category for one processed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Updated,
    Unchanged,
    NotFound,
    Error,
}

/// Result of processing one address record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResult {
    pub id: Uuid,
    pub status: ProcessStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_coordinates: Option<Coordinates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ProcessResult {
    pub fn updated(
        id: Uuid,
        address: &str,
        old: Option<Coordinates>,
        new: Coordinates,
    ) -> Self {
        Self {
            id,
            status: ProcessStatus::Updated,
            address: Some(address.to_string()),
            old_coordinates: old,
            new_coordinates: Some(new),
            message: None,
        }
    }

    pub fn unchanged(id: Uuid, address: &str, coordinates: Coordinates) -> Self {
        Self {
            id,
            status: ProcessStatus::Unchanged,
            address: Some(address.to_string()),
            old_coordinates: None,
            new_coordinates: Some(coordinates),
            message: None,
        }
    }

    pub fn not_found(id: Uuid, address: &str) -> Self {
        Self {
            id,
            status: ProcessStatus::NotFound,
            address: Some(address.to_string()),
            old_coordinates: None,
            new_coordinates: None,
            message: Some("geocoder could not find coordinates for this address".to_string()),
        }
    }

    pub fn error(id: Uuid, message: impl Into<String>) -> Self {
        Self {
            id,
            status: ProcessStatus::Error,
            address: None,
            old_coordinates: None,
            new_coordinates: None,
            message: Some(message.into()),
        }
    }
}
