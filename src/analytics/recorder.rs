//! Fire-and-forget recording of redirect events
//!
//! `log_redirect` is called on the redirect hot path. It only schedules a
//! background task; GeoIP enrichment and the database insert happen there.
//! Every failure on this path is logged and dropped, the caller never sees it.

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, error};

use crate::analytics::geoip::GeoResolver;
use crate::analytics::models::{GeoLocation, RedirectEvent, RedirectInput};
use crate::storage::{EventStore, StoreError, StoreResult};

/// Background writes that have been scheduled but not finished
#[derive(Default)]
struct InFlight {
    count: AtomicUsize,
    idle: Notify,
}

/// Decrements the in-flight count when the write task ends, even on panic
struct InFlightGuard(Arc<InFlight>);

impl InFlightGuard {
    fn enter(in_flight: &Arc<InFlight>) -> Self {
        in_flight.count.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(in_flight))
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

/// Records redirect events without blocking the caller
#[derive(Clone)]
pub struct EventRecorder {
    store: Arc<dyn EventStore>,
    geoip: Arc<dyn GeoResolver>,
    runtime: Handle,
    in_flight: Arc<InFlight>,
}

impl EventRecorder {
    /// Create a recorder that schedules its writes on the current tokio runtime
    ///
    /// # Panics
    /// When called outside a tokio runtime. Use [`EventRecorder::with_handle`] there.
    pub fn new(store: Arc<dyn EventStore>, geoip: Arc<dyn GeoResolver>) -> Self {
        Self::with_handle(store, geoip, Handle::current())
    }

    pub fn with_handle(
        store: Arc<dyn EventStore>,
        geoip: Arc<dyn GeoResolver>,
        runtime: Handle,
    ) -> Self {
        Self {
            store,
            geoip,
            runtime,
            in_flight: Arc::new(InFlight::default()),
        }
    }

    /// Record a redirect in the background and return immediately.
    ///
    /// Safe to call from any thread, inside or outside the runtime.
    pub fn log_redirect(&self, input: RedirectInput) {
        let guard = InFlightGuard::enter(&self.in_flight);
        let store = Arc::clone(&self.store);
        let geoip = Arc::clone(&self.geoip);

        self.runtime.spawn(async move {
            let _guard = guard;

            let location = enrich(geoip.as_ref(), &input.ip_address);
            let event = RedirectEvent::new(input, location);

            match persist(store.as_ref(), &event).await {
                Ok(()) => debug!(
                    event_id = %event.id,
                    short_url = %event.short_url,
                    "recorded redirect event"
                ),
                Err(err) => error!(
                    event_id = %event.id,
                    short_url = %event.short_url,
                    creator_id = event.creator_id,
                    error = %err,
                    "failed to record redirect event"
                ),
            }
        });
    }

    /// Number of scheduled writes that have not finished yet
    pub fn in_flight(&self) -> usize {
        self.in_flight.count.load(Ordering::Acquire)
    }

    /// Wait until every scheduled write has finished.
    ///
    /// Meant for shutdown; request paths never call this.
    pub async fn drain(&self) {
        loop {
            let notified = self.in_flight.idle.notified();
            tokio::pin!(notified);
            // Register before checking the count so a wakeup cannot slip in between
            notified.as_mut().enable();

            if self.in_flight.count.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Location for a raw address; empty when it is not an IP or cannot be resolved
fn enrich(geoip: &dyn GeoResolver, ip_address: &str) -> GeoLocation {
    ip_address
        .parse::<IpAddr>()
        .ok()
        .and_then(|ip| geoip.lookup(ip))
        .unwrap_or_default()
}

async fn persist(store: &dyn EventStore, event: &RedirectEvent) -> StoreResult<()> {
    if event.creator_id == 0 {
        return Err(StoreError::MissingCreator);
    }
    store.insert_redirect(event).await
}
