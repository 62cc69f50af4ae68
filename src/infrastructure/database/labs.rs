use sqlx::{query_as, PgPool};

use crate::domain::lab::Lab;
use crate::infrastructure::error::{not_found, AppResult};

/// Repository for the lab catalogue.
#[derive(Clone)]
pub struct LabRepository {
    pool: PgPool,
}

impl LabRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list(&self) -> AppResult<Vec<Lab>> {
        let labs = query_as::<_, Lab>("SELECT * FROM labs ORDER BY lab_number")
            .fetch_all(&self.pool)
            .await?;
        Ok(labs)
    }

    pub async fn find_by_number(&self, lab_number: i32) -> AppResult<Lab> {
        query_as::<_, Lab>("SELECT * FROM labs WHERE lab_number = $1")
            .bind(lab_number)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("Lab"))
    }
}
