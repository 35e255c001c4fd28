use crate::analytics::models::RedirectEvent;
use crate::analytics::storage::{
    RedirectCount, StoredRedirect, UserViewName, EVENT_REDIRECTS_TABLE,
};
use crate::storage::{db_id, EventStore, StoreResult};
use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;

pub struct PostgresEventStore {
    pool: Arc<PgPool>,
}

impl PostgresEventStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS event_redirects (
                id UUID PRIMARY KEY,
                short_url_id BIGINT NOT NULL,
                url_group_id BIGINT NOT NULL,
                short_url TEXT NOT NULL,
                creator_id BIGINT NOT NULL,
                ip_address TEXT NOT NULL,
                user_agent TEXT NOT NULL,
                referer TEXT NOT NULL,
                location_country TEXT,
                location_region TEXT,
                location_city TEXT,
                created_at BIGINT NOT NULL
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
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(event.id)
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
        // DDL cannot take bind parameters; the predicate is a validated integer
        let sql = format!(
            "CREATE OR REPLACE VIEW {} AS SELECT * FROM {} WHERE creator_id = {}",
            view.quoted(),
            EVENT_REDIRECTS_TABLE,
            db_id(user_id)?
        );

        sqlx::query(&sql).execute(self.pool.as_ref()).await?;

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
            SELECT id::text AS id, short_url_id, url_group_id, short_url, creator_id,
                   ip_address, user_agent, referer,
                   location_country, location_region, location_city, created_at
            FROM event_redirects
            WHERE creator_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(db_id(creator_id)?)
        .bind(i64::from(limit))
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(events)
    }
}
