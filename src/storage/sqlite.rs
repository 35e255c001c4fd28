use crate::analytics::models::RedirectEvent;
use crate::analytics::storage::{
    RedirectCount, StoredRedirect, UserViewName, EVENT_REDIRECTS_TABLE,
};
use crate::storage::{db_id, EventStore, StoreResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

pub struct SqliteEventStore {
    pool: Arc<SqlitePool>,
}

impl SqliteEventStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        // Every connection to an in-memory database sees its own empty database,
        // so pin the pool to a single connection that is never recycled.
        let in_memory = database_url.contains(":memory:") || database_url.contains("mode=memory");
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(Option::<Duration>::None)
                .max_lifetime(Option::<Duration>::None)
        } else {
            SqlitePoolOptions::new().max_connections(max_connections)
        };

        let pool = pool_options.connect_with(options).await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS event_redirects (
                id TEXT PRIMARY KEY,
                short_url_id INTEGER NOT NULL,
                url_group_id INTEGER NOT NULL,
                short_url TEXT NOT NULL,
                creator_id INTEGER NOT NULL,
                ip_address TEXT NOT NULL,
                user_agent TEXT NOT NULL,
                referer TEXT NOT NULL,
                location_country TEXT,
                location_region TEXT,
                location_city TEXT,
                created_at INTEGER NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_event_redirects_creator_id ON event_redirects(creator_id)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn insert_redirect(&self, event: &RedirectEvent) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO event_redirects (
                id, short_url_id, url_group_id, short_url, creator_id,
                ip_address, user_agent, referer,
                location_country, location_region, location_city, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id.to_string())
        .bind(db_id(event.short_url_id)?)
        .bind(db_id(event.url_group_id)?)
        .bind(&event.short_url)
        .bind(db_id(event.creator_id)?)
        .bind(&event.ip_address)
        .bind(&event.user_agent)
        .bind(&event.referer)
        .bind(event.location.country.as_deref())
        .bind(event.location.region.as_deref())
        .bind(event.location.city.as_deref())
        .bind(event.created_at)
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn replace_user_view(&self, view: &UserViewName, user_id: u64) -> StoreResult<()> {
        let creator_id = db_id(user_id)?;

        // No CREATE OR REPLACE VIEW in SQLite; drop and create in one transaction instead.
        // IMMEDIATE takes the write lock up front so a concurrent insert cannot turn the
        // read-to-write upgrade into SQLITE_BUSY_SNAPSHOT, which busy_timeout never retries.
        let drop_sql = format!("DROP VIEW IF EXISTS {}", view.quoted());
        let create_sql = format!(
            "CREATE VIEW {} AS SELECT * FROM {} WHERE creator_id = {}",
            view.quoted(),
            EVENT_REDIRECTS_TABLE,
            creator_id
        );

        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        sqlx::query(&drop_sql).execute(&mut *tx).await?;
        sqlx::query(&create_sql).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn count_by_short_url(&self, view: &UserViewName) -> StoreResult<Vec<RedirectCount>> {
        let sql = format!(
            "SELECT short_url, COUNT(id) AS redirects FROM {} GROUP BY short_url",
            view.quoted()
        );

        let counts = sqlx::query_as::<_, RedirectCount>(&sql)
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(counts)
    }

    async fn recent_redirects(
        &self,
        creator_id: u64,
        limit: u32,
    ) -> StoreResult<Vec<StoredRedirect>> {
        let events = sqlx::query_as::<_, StoredRedirect>(
            r#"
            SELECT id, short_url_id, url_group_id, short_url, creator_id,
                   ip_address, user_agent, referer,
                   location_country, location_region, location_city, created_at
            FROM event_redirects
            WHERE creator_id = ?
            ORDER BY created_at DESC
            LIMIT ?
            "#,
        )
        .bind(db_id(creator_id)?)
        .bind(i64::from(limit))
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(events)
    }
}
