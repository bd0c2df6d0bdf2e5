use crate::db_storage::CoverageStore;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;
use std::time::Duration;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS coverage_requests (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        age INTEGER NOT NULL,
        city TEXT NOT NULL,
        annual_income DOUBLE PRECISION NOT NULL,
        dependents INTEGER NOT NULL,
        recommended_coverage BIGINT NOT NULL,
        monthly_premium BIGINT NOT NULL,
        weather_data JSONB,
        crypto_data JSONB,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS coverage_requests_created_at_idx ON coverage_requests (created_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS api_call_records (
        id UUID PRIMARY KEY,
        kind TEXT NOT NULL,
        endpoint TEXT NOT NULL,
        request JSONB NOT NULL,
        response JSONB NOT NULL,
        correlation_id UUID,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS api_call_records_created_at_idx ON api_call_records (created_at DESC)",
];

pub struct Database {
    pub pool: PgPool,
}

impl Database {
    /// Builds the pool without opening a connection, so an unreachable
    /// database never prevents the server from starting.
    pub fn connect_lazy(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(database_url)?;

        Ok(Self { pool })
    }

}

/// Creates the tables if they do not exist yet. Safe to run repeatedly.
pub async fn create_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Pings the store every `interval` and logs connected/disconnected transitions.
///
/// A store that was unreachable at startup finishes its schema bootstrap on
/// the first successful ping.
pub fn spawn_connection_monitor(store: Arc<dyn CoverageStore>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut last: Option<bool> = None;
        loop {
            ticker.tick().await;
            let connected = store.ping().await;
            match (last, connected) {
                (Some(true), true) | (Some(false), false) => {}
                (_, true) => tracing::info!("✓ Database connected"),
                (_, false) => tracing::warn!("Database disconnected"),
            }
            last = Some(connected);
        }
    });
}
