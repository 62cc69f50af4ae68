use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::infrastructure::error::AppResult;

pub mod labs;
pub mod submissions;
pub mod universities;
pub mod users;

pub use labs::LabRepository;
pub use submissions::AttemptRepository;
pub use universities::UniversityRepository;
pub use users::UserRepository;

/// Postgres connection pool wrapper shared through application state.
#[derive(Debug, Clone)]
pub struct Database {
    pub pool: PgPool,
}

impl Database {
    pub async fn new(url: &str, max_connections: u32) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        info!("database pool ready (max_connections={})", max_connections);
        Ok(Self { pool })
    }

    /// Pool that does not connect until first use. Test-only helper for
    /// spinning up the HTTP app without a live database.
    pub fn connect_lazy(url: &str) -> AppResult<Self> {
        let pool = PgPoolOptions::new().max_connections(1).connect_lazy(url)?;
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> AppResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| crate::infrastructure::error::AppError::Configuration(e.to_string()))?;
        info!("database migrations applied");
        Ok(())
    }
}
