use anyhow::{Context, Result};
use fight_exposure_core::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};

/// Owns the connection pool and the schema migrations.
#[derive(Debug, Clone)]
pub struct DatabaseClient {
    pool: PgPool,
}

impl DatabaseClient {
    /// Creates a new database client connected to the specified `PostgreSQL` database.
    ///
    /// # Errors
    /// Returns an error if the database connection cannot be established.
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::connect(database_url, 10).await
    }

    /// Connects using the `[database]` configuration section.
    ///
    /// # Errors
    /// Returns an error if the database connection cannot be established.
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::connect(&config.url, config.max_connections).await
    }

    async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("failed to connect to PostgreSQL")?;

        tracing::info!(max_connections, "connected to database");
        Ok(Self { pool })
    }

    /// Applies pending schema migrations.
    ///
    /// # Errors
    /// Returns an error if a migration fails.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("failed to run database migrations")?;
        Ok(())
    }

    /// Returns the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
