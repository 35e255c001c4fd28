//! Data models for redirect analytics

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raw redirect data handed over by the redirect-serving path
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedirectInput {
    pub short_url_id: u64,
    pub url_group_id: u64,
    pub short_url: String,
    /// Owner of the short URL; 0 means unknown and is never persisted
    pub creator_id: u64,
    pub ip_address: String,
    pub user_agent: String,
    pub referer: String,
}

/// Geographic location resolved from an IP address
///
/// Country and region are formatted as `"<Name> (<ISO>)"`, city as a bare name.
/// A field is `None` when the database has no name for it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
}

impl GeoLocation {
    /// Build a location from raw English names and ISO codes
    pub fn from_names(
        country_name: Option<&str>,
        country_iso: Option<&str>,
        region_name: Option<&str>,
        region_iso: Option<&str>,
        city_name: Option<&str>,
    ) -> Self {
        Self {
            country: labelled(country_name, country_iso),
            region: labelled(region_name, region_iso),
            city: city_name.filter(|n| !n.is_empty()).map(str::to_string),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.country.is_none() && self.region.is_none() && self.city.is_none()
    }
}

fn labelled(name: Option<&str>, iso_code: Option<&str>) -> Option<String> {
    let name = name.filter(|n| !n.is_empty())?;
    match iso_code.filter(|c| !c.is_empty()) {
        Some(code) => Some(format!("{name} ({code})")),
        None => Some(name.to_string()),
    }
}

/// A single redirect occurrence, immutable once built
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectEvent {
    pub id: Uuid,
    pub short_url_id: u64,
    pub url_group_id: u64,
    pub short_url: String,
    pub creator_id: u64,
    pub ip_address: String,
    pub user_agent: String,
    pub referer: String,
    pub location: GeoLocation,
    /// Unix timestamp (seconds)
    pub created_at: i64,
}

impl RedirectEvent {
    /// Create a new event with a freshly allocated identifier
    pub fn new(input: RedirectInput, location: GeoLocation) -> Self {
        Self {
            id: Uuid::new_v4(),
            short_url_id: input.short_url_id,
            url_group_id: input.url_group_id,
            short_url: input.short_url,
            creator_id: input.creator_id,
            ip_address: input.ip_address,
            user_agent: input.user_agent,
            referer: input.referer,
            location,
            created_at: chrono::Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_location_formats_name_and_iso() {
        let loc = GeoLocation::from_names(
            Some("United States"),
            Some("US"),
            Some("California"),
            Some("CA"),
            Some("Mountain View"),
        );
        assert_eq!(loc.country.as_deref(), Some("United States (US)"));
        assert_eq!(loc.region.as_deref(), Some("California (CA)"));
        assert_eq!(loc.city.as_deref(), Some("Mountain View"));
    }

    #[test]
    fn test_location_omits_empty_names() {
        // An ISO code alone is not enough to fill a field
        let loc = GeoLocation::from_names(Some(""), Some("DE"), None, Some("BE"), Some(""));
        assert!(loc.is_empty());
    }

    #[test]
    fn test_location_without_iso_code() {
        let loc = GeoLocation::from_names(Some("Germany"), None, None, None, None);
        assert_eq!(loc.country.as_deref(), Some("Germany"));
        assert!(loc.region.is_none());
    }

    #[test]
    fn test_event_ids_are_unique() {
        let ids: HashSet<Uuid> = (0..1000)
            .map(|_| RedirectEvent::new(RedirectInput::default(), GeoLocation::default()).id)
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_event_copies_input() {
        let input = RedirectInput {
            short_url_id: 7,
            url_group_id: 3,
            short_url: "abc".to_string(),
            creator_id: 42,
            ip_address: "203.0.113.9".to_string(),
            user_agent: "curl/8.0".to_string(),
            referer: "https://example.com".to_string(),
        };
        let event = RedirectEvent::new(input, GeoLocation::default());
        assert_eq!(event.short_url, "abc");
        assert_eq!(event.creator_id, 42);
        assert_eq!(event.url_group_id, 3);
        assert!(event.created_at > 0);
    }
}
