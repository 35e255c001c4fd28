//! Per-user redirect counts

use std::sync::Arc;
use tracing::error;

use crate::analytics::storage::RedirectCount;
use crate::analytics::view_gate::ViewGate;
use crate::storage::StoreResult;

pub struct AggregationQuery {
    gate: Arc<ViewGate>,
}

impl AggregationQuery {
    pub fn new(gate: Arc<ViewGate>) -> Self {
        Self { gate }
    }

    /// Redirect counts per short URL for one user, in the order the store returns them.
    ///
    /// Errors are logged and returned; there is no retry.
    pub async fn counts_for_user(&self, user_id: u64) -> StoreResult<Vec<RedirectCount>> {
        let result = self
            .gate
            .with_user_view(user_id, |view| async move { view.count_by_short_url().await })
            .await;

        if let Err(ref err) = result {
            error!(user_id, error = %err, "failed to count redirects for user");
        }
        result
    }
}
