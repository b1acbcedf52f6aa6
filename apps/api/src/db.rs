use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Creates and returns a PostgreSQL connection pool. `name` only labels logs.
pub async fn create_pool(name: &str, database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL ({name})...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .with_context(|| format!("Could not connect to the {name} database"))?;

    info!("PostgreSQL connection pool established ({name})");
    Ok(pool)
}

/// Pool on `TEST_DATABASE_URL` with the intake schema applied. Used by the
/// `#[ignore]`d store tests; run them with `cargo test -- --ignored`.
#[cfg(test)]
pub(crate) async fn test_pool() -> PgPool {
    use sqlx::Executor;

    let url = std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set");
    let pool = create_pool("test", &url).await.expect("test database");
    // simple-query protocol: one implicit transaction, so the lock serializes
    // concurrent test binaries applying the schema
    let schema = format!(
        "SELECT pg_advisory_xact_lock(72011);\n{}",
        include_str!("../migrations/0001_intake.sql")
    );
    pool.execute(schema.as_str()).await.expect("apply intake schema");
    pool
}
