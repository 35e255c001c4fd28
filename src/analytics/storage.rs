//! Analytics storage models

use serde::{Deserialize, Serialize};
use std::fmt;

/// Base table holding every redirect event
pub const EVENT_REDIRECTS_TABLE: &str = "event_redirects";

/// Redirect count for one short URL, scoped to a single user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RedirectCount {
    pub short_url: String,
    pub redirects: i64,
}

/// Redirect event as stored in the database
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoredRedirect {
    pub id: String,
    pub short_url_id: i64,
    pub url_group_id: i64,
    pub short_url: String,
    pub creator_id: i64,
    pub ip_address: String,
    pub user_agent: String,
    pub referer: String,
    pub location_country: Option<String>,
    pub location_region: Option<String>,
    pub location_city: Option<String>,
    pub created_at: i64,
}

/// Name of the per-user view over [`EVENT_REDIRECTS_TABLE`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UserViewName(String);

impl UserViewName {
    pub fn for_user(user_id: u64) -> Self {
        Self(format!("{EVENT_REDIRECTS_TABLE}_{user_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Double-quoted identifier for use in SQL text
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for UserViewName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_name_is_derived_from_table_and_user() {
        assert_eq!(UserViewName::for_user(42).as_str(), "event_redirects_42");
        assert_eq!(UserViewName::for_user(42), UserViewName::for_user(42));
        assert_ne!(UserViewName::for_user(4), UserViewName::for_user(42));
        assert_eq!(UserViewName::for_user(7).quoted(), "\"event_redirects_7\"");
    }
}
