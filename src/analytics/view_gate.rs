//! Serialized access to per-user views
//!
//! The event store does not tolerate concurrent schema changes, so every
//! create-or-replace of a user view, and the query that follows it, runs
//! under one lock shared by all users. All aggregate traffic queues here.
//! `tokio::sync::Mutex` is fair, so callers are served in arrival order.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error};

use crate::analytics::storage::{RedirectCount, UserViewName};
use crate::config::ViewRefresh;
use crate::storage::{EventStore, StoreResult};

/// Handle to one user's view, valid inside [`ViewGate::with_user_view`]
pub struct UserView {
    user_id: u64,
    name: UserViewName,
    store: Arc<dyn EventStore>,
}

impl UserView {
    pub fn user_id(&self) -> u64 {
        self.user_id
    }

    pub fn name(&self) -> &UserViewName {
        &self.name
    }

    /// Count this user's events per short URL, in store order
    pub async fn count_by_short_url(&self) -> StoreResult<Vec<RedirectCount>> {
        self.store.count_by_short_url(&self.name).await
    }
}

/// Process-wide gate over the view namespace
pub struct ViewGate {
    store: Arc<dyn EventStore>,
    refresh: ViewRefresh,
    /// The gate itself. With [`ViewRefresh::Once`] it also remembers which views exist.
    created: Mutex<HashSet<UserViewName>>,
}

impl ViewGate {
    pub fn new(store: Arc<dyn EventStore>, refresh: ViewRefresh) -> Self {
        Self {
            store,
            refresh,
            created: Mutex::new(HashSet::new()),
        }
    }

    /// Create-or-replace the view for `user_id` and run `f` against it, all
    /// while holding the gate. The gate is released before the result is returned.
    ///
    /// A failed view creation is logged and `f` still runs; whatever it queries
    /// will then fail and report the error.
    pub async fn with_user_view<F, Fut, R>(&self, user_id: u64, f: F) -> R
    where
        F: FnOnce(UserView) -> Fut,
        Fut: Future<Output = R>,
    {
        let mut created = self.created.lock().await;
        let name = UserViewName::for_user(user_id);

        let needs_create = match self.refresh {
            ViewRefresh::Always => true,
            ViewRefresh::Once => !created.contains(&name),
        };

        if needs_create {
            match self.store.replace_user_view(&name, user_id).await {
                Ok(()) => {
                    debug!(user_id, view = %name, "created view for user");
                    if self.refresh == ViewRefresh::Once {
                        created.insert(name.clone());
                    }
                }
                Err(err) => {
                    error!(user_id, view = %name, error = %err, "failed to create view for user");
                }
            }
        }

        let view = UserView {
            user_id,
            name,
            store: Arc::clone(&self.store),
        };
        let result = f(view).await;
        drop(created);
        result
    }
}
