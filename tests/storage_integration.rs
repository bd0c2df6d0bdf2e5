use std::env;
use std::str::FromStr;

use coverage_api::db::Database;
use coverage_api::db_storage::{CoverageStore, PgCoverageStore};
use coverage_api::models::{ApiCallRecord, ApiKind, CoverageRequestRecord};
use serde_json::json;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use uuid::Uuid;

/// Integration smoke test for the PostgreSQL store.
/// Marked ignored so it only runs against a database on purpose; set TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn store_round_trip_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL to run this test"))?;

    let db = Database::connect_lazy(&db_url)?;
    let store = PgCoverageStore::new(db.pool.clone());
    store
        .ensure_schema()
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(store.ping().await);

    let request = CoverageRequestRecord {
        id: Uuid::new_v4(),
        name: "Smoke Test".to_string(),
        age: 40,
        city: "Jaipur".to_string(),
        annual_income: 800_000.0,
        dependents: 1,
        recommended_coverage: 12_200_000,
        monthly_premium: 109_800,
        weather_data: Some(json!({ "main": { "temp": 31.0 } })),
        crypto_data: None,
        created_at: chrono::Utc::now(),
    };
    store
        .insert_coverage_request(&request)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let call = ApiCallRecord::new(
        ApiKind::Weather,
        "api.openweathermap.org/data/2.5/weather",
        json!({ "city": "Jaipur" }),
        json!({ "main": { "temp": 31.0 } }),
        Some(request.id),
    );
    store
        .insert_api_call(&call)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let recent = store
        .recent_coverage_requests(50)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(recent.iter().any(|r| r.id == request.id));

    let calls = store
        .recent_api_calls(100)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let stored = calls
        .iter()
        .find(|c| c.id == call.id)
        .ok_or_else(|| anyhow::anyhow!("api call record not found"))?;
    assert_eq!(stored.kind, ApiKind::Weather);
    assert_eq!(stored.correlation_id, Some(request.id));

    Ok(())
}

/// A store built before its tables exist creates them on the first write.
/// Runs in a throwaway schema so the shared tables are untouched.
#[tokio::test]
#[ignore]
async fn store_creates_schema_on_first_use() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL to run this test"))?;

    let admin = Database::connect_lazy(&db_url)?;
    let schema = format!("late_start_{}", Uuid::new_v4().simple());
    sqlx::query(&format!("CREATE SCHEMA {}", schema))
        .execute(&admin.pool)
        .await?;

    let options = PgConnectOptions::from_str(&db_url)?.options([("search_path", schema.as_str())]);
    let pool = PgPoolOptions::new().connect_lazy_with(options);
    let store = PgCoverageStore::new(pool);
    assert!(!store.schema_ready());

    let call = ApiCallRecord::new(
        ApiKind::Crypto,
        "api.coindesk.com/v1/bpi/currentprice.json",
        json!({}),
        json!({ "bpi": { "USD": { "rate": "64,231.5600" } } }),
        None,
    );
    store
        .insert_api_call(&call)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert!(store.schema_ready());

    let calls = store
        .recent_api_calls(100)
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].id, call.id);

    sqlx::query(&format!("DROP SCHEMA {} CASCADE", schema))
        .execute(&admin.pool)
        .await?;

    Ok(())
}
