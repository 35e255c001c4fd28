//! Redirect event ingestion and per-user aggregation
//!
//! Events are written fire-and-forget by [`EventRecorder`], enriched with
//! MaxMind GeoLite2 City data when a database is available. Reports go through
//! [`AggregationQuery`], which reads per-user views obtained from [`ViewGate`].

pub mod geoip;
pub mod models;
pub mod query;
pub mod recorder;
pub mod storage;
pub mod view_gate;

pub use geoip::{GeoIpService, GeoResolver};
pub use models::{GeoLocation, RedirectEvent, RedirectInput};
pub use query::AggregationQuery;
pub use recorder::EventRecorder;
pub use storage::{RedirectCount, StoredRedirect, UserViewName};
pub use view_gate::{UserView, ViewGate};
