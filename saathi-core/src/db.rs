use crate::config::DatabaseConfig;
use crate::error::SaathiError;
use sqlx::{postgres::PgPoolOptions, PgPool};

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, SaathiError> {
    if config.url.is_empty() {
        return Err(SaathiError::NoDatabase);
    }
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;
    Ok(pool)
}

/// Lazily-connected pool: the server can start and serve fallback content
/// while Postgres is still coming up.
pub fn create_lazy_pool(config: &DatabaseConfig) -> Result<PgPool, SaathiError> {
    if config.url.is_empty() {
        return Err(SaathiError::NoDatabase);
    }
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect_lazy(&config.url)?;
    Ok(pool)
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}
