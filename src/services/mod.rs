//! Business logic services

pub mod coordinator;
pub mod fetcher;
pub mod geocoding;
pub mod nominatim;
pub mod processor;
