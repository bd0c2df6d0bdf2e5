use crate::errors::AppError;
use crate::models::{ApiCallRecord, CoverageRequestRecord};
use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Mutex;
use tokio::sync::OnceCell;

/// Append-only store for coverage requests and enrichment call logs.
///
/// Handlers and services receive it as `Arc<dyn CoverageStore>`.
#[async_trait]
pub trait CoverageStore: Send + Sync {
    async fn insert_coverage_request(&self, record: &CoverageRequestRecord)
        -> Result<(), AppError>;

    async fn insert_api_call(&self, record: &ApiCallRecord) -> Result<(), AppError>;

    /// Most recent first.
    async fn recent_coverage_requests(
        &self,
        limit: i64,
    ) -> Result<Vec<CoverageRequestRecord>, AppError>;

    /// Most recent first.
    async fn recent_api_calls(&self, limit: i64) -> Result<Vec<ApiCallRecord>, AppError>;

    async fn count_coverage_requests(&self) -> Result<i64, AppError>;

    async fn count_api_calls(&self) -> Result<i64, AppError>;

    /// Whether the store is currently reachable.
    async fn ping(&self) -> bool;
}

/// PostgreSQL-backed store; payloads live in JSONB columns.
///
/// The schema is created on first use and retried on every call until it
/// succeeds, so a database that comes up after the server still gets its tables.
pub struct PgCoverageStore {
    pool: PgPool,
    schema: OnceCell<()>,
}

impl PgCoverageStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema: OnceCell::new(),
        }
    }

    /// Creates the tables unless an earlier call already did.
    pub async fn ensure_schema(&self) -> Result<(), AppError> {
        self.schema
            .get_or_try_init(|| async {
                crate::db::create_schema(&self.pool).await?;
                tracing::info!("✓ Database schema ready");
                Ok::<(), AppError>(())
            })
            .await?;
        Ok(())
    }

    pub fn schema_ready(&self) -> bool {
        self.schema.initialized()
    }
}

#[async_trait]
impl CoverageStore for PgCoverageStore {
    async fn insert_coverage_request(
        &self,
        record: &CoverageRequestRecord,
    ) -> Result<(), AppError> {
        self.ensure_schema().await?;
        sqlx::query(
            r#"
            INSERT INTO coverage_requests (
                id, name, age, city, annual_income, dependents,
                recommended_coverage, monthly_premium, weather_data, crypto_data, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(record.id)
        .bind(&record.name)
        .bind(record.age)
        .bind(&record.city)
        .bind(record.annual_income)
        .bind(record.dependents)
        .bind(record.recommended_coverage)
        .bind(record.monthly_premium)
        .bind(&record.weather_data)
        .bind(&record.crypto_data)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_api_call(&self, record: &ApiCallRecord) -> Result<(), AppError> {
        self.ensure_schema().await?;
        sqlx::query(
            r#"
            INSERT INTO api_call_records (
                id, kind, endpoint, request, response, correlation_id, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.id)
        .bind(record.kind.as_str())
        .bind(&record.endpoint)
        .bind(&record.request)
        .bind(&record.response)
        .bind(record.correlation_id)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn recent_coverage_requests(
        &self,
        limit: i64,
    ) -> Result<Vec<CoverageRequestRecord>, AppError> {
        self.ensure_schema().await?;
        let rows = sqlx::query_as::<_, CoverageRequestRecord>(
            "SELECT * FROM coverage_requests ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn recent_api_calls(&self, limit: i64) -> Result<Vec<ApiCallRecord>, AppError> {
        self.ensure_schema().await?;
        let rows = sqlx::query_as::<_, ApiCallRecord>(
            "SELECT * FROM api_call_records ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn count_coverage_requests(&self) -> Result<i64, AppError> {
        self.ensure_schema().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM coverage_requests")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn count_api_calls(&self) -> Result<i64, AppError> {
        self.ensure_schema().await?;
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM api_call_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn ping(&self) -> bool {
        if let Err(e) = self.ensure_schema().await {
            tracing::debug!("Database ping failed: {}", e);
            return false;
        }
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

/// In-process store for tests.
///
/// [`MemoryStore::failing`] builds a store whose every operation errors, to
/// simulate an unreachable database.
#[derive(Default)]
pub struct MemoryStore {
    coverage_requests: Mutex<Vec<CoverageRequestRecord>>,
    api_calls: Mutex<Vec<ApiCallRecord>>,
    failing: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    fn check(&self) -> Result<(), AppError> {
        if self.failing {
            return Err(AppError::DatabaseError(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

fn newest_first<T: Clone>(
    items: &[T],
    limit: i64,
    created_at: impl Fn(&T) -> chrono::DateTime<chrono::Utc>,
) -> Vec<T> {
    let mut sorted: Vec<T> = items.to_vec();
    // Stable sort keeps insertion order for equal timestamps, so reverse first.
    sorted.reverse();
    sorted.sort_by(|a, b| created_at(b).cmp(&created_at(a)));
    sorted.truncate(usize::try_from(limit).unwrap_or(0));
    sorted
}

#[async_trait]
impl CoverageStore for MemoryStore {
    async fn insert_coverage_request(
        &self,
        record: &CoverageRequestRecord,
    ) -> Result<(), AppError> {
        self.check()?;
        self.coverage_requests
            .lock()
            .map_err(|e| AppError::InternalError(e.to_string()))?
            .push(record.clone());
        Ok(())
    }

    async fn insert_api_call(&self, record: &ApiCallRecord) -> Result<(), AppError> {
        self.check()?;
        self.api_calls
            .lock()
            .map_err(|e| AppError::InternalError(e.to_string()))?
            .push(record.clone());
        Ok(())
    }

    async fn recent_coverage_requests(
        &self,
        limit: i64,
    ) -> Result<Vec<CoverageRequestRecord>, AppError> {
        self.check()?;
        let items = self
            .coverage_requests
            .lock()
            .map_err(|e| AppError::InternalError(e.to_string()))?;
        Ok(newest_first(&items, limit, |r| r.created_at))
    }

    async fn recent_api_calls(&self, limit: i64) -> Result<Vec<ApiCallRecord>, AppError> {
        self.check()?;
        let items = self
            .api_calls
            .lock()
            .map_err(|e| AppError::InternalError(e.to_string()))?;
        Ok(newest_first(&items, limit, |r| r.created_at))
    }

    async fn count_coverage_requests(&self) -> Result<i64, AppError> {
        self.check()?;
        let items = self
            .coverage_requests
            .lock()
            .map_err(|e| AppError::InternalError(e.to_string()))?;
        Ok(items.len() as i64)
    }

    async fn count_api_calls(&self) -> Result<i64, AppError> {
        self.check()?;
        let items = self
            .api_calls
            .lock()
            .map_err(|e| AppError::InternalError(e.to_string()))?;
        Ok(items.len() as i64)
    }

    async fn ping(&self) -> bool {
        !self.failing
    }
}
