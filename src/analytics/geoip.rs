//! GeoIP lookup service using MaxMind GeoLite2/GeoIP2 City MMDB
//!
//! Lookups are best-effort: a malformed address, an address missing from the
//! database, or a missing database all yield `None` rather than an error.

use anyhow::{Context, Result};
use maxminddb::{geoip2, Mmap, Reader};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{trace, warn};

use crate::analytics::models::GeoLocation;

/// Resolves IP addresses to locations. Implementations must be read-only.
pub trait GeoResolver: Send + Sync {
    /// Lookup an already-parsed address
    fn lookup(&self, ip: IpAddr) -> Option<GeoLocation>;

    /// Validate `ip` as an IPv4/IPv6 literal, then look it up
    fn resolve(&self, ip: &str) -> Option<GeoLocation> {
        let ip = ip.parse::<IpAddr>().ok()?;
        self.lookup(ip)
    }
}

/// GeoIP lookup service backed by a memory-mapped City database
#[derive(Clone, Default)]
pub struct GeoIpService {
    city_reader: Option<Arc<Reader<Mmap>>>,
}

impl GeoIpService {
    /// Create a new GeoIP service from an MMDB file path
    ///
    /// # Arguments
    /// * `city_path` - Optional path to the MaxMind GeoLite2-City or GeoIP2-City .mmdb file
    ///
    /// # Returns
    /// An error if a path is given but the database cannot be opened
    pub fn new(city_path: Option<&str>) -> Result<Self> {
        let city_reader = if let Some(path) = city_path {
            let reader = unsafe { Reader::open_mmap(path) }
                .with_context(|| format!("Failed to open GeoIP City database at {}", path))?;
            Some(Arc::new(reader))
        } else {
            None
        };

        Ok(Self { city_reader })
    }

    /// Like [`GeoIpService::new`], but a missing or corrupt database only
    /// disables enrichment instead of failing startup
    pub fn open_or_disabled(city_path: Option<&str>) -> Self {
        match Self::new(city_path) {
            Ok(service) => service,
            Err(err) => {
                warn!("GeoIP enrichment disabled: {err:#}");
                Self::disabled()
            }
        }
    }

    /// A service that never resolves anything
    pub fn disabled() -> Self {
        Self { city_reader: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.city_reader.is_some()
    }
}

impl GeoResolver for GeoIpService {
    fn lookup(&self, ip: IpAddr) -> Option<GeoLocation> {
        let reader = self.city_reader.as_ref()?;

        let result = match reader.lookup(ip) {
            Ok(result) => result,
            Err(err) => {
                trace!(%ip, error = %err, "GeoIP lookup failed");
                return None;
            }
        };
        let city = result.decode::<geoip2::City>().ok()??;

        let subdivision = city.subdivisions.first();
        Some(GeoLocation::from_names(
            city.country.names.english,
            city.country.iso_code,
            subdivision.and_then(|s| s.names.english),
            subdivision.and_then(|s| s.iso_code),
            city.city.names.english,
        ))
    }
}
