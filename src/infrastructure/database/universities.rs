use chrono::{Duration, Utc};
use sqlx::{query, query_as, query_scalar, PgPool};
use uuid::Uuid;

use crate::domain::university::{generate_code, RegisterCode, University, UniversityWithRoster};
use crate::infrastructure::error::{conflict, not_found, AppError, AppResult};

/// Repository for universities and their register codes.
#[derive(Clone)]
pub struct UniversityRepository {
    pool: PgPool,
}

impl UniversityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, name: &str, capacity: i32) -> AppResult<University> {
        let university = query_as::<_, University>(
            r#"
            INSERT INTO universities (id, name, capacity, created_at)
            VALUES ($1, $2, $3, now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(capacity)
        .fetch_one(&self.pool)
        .await?;
        Ok(university)
    }

    pub async fn list_with_roster(&self) -> AppResult<Vec<UniversityWithRoster>> {
        let universities = query_as::<_, UniversityWithRoster>(
            r#"
            SELECT un.id, un.name, un.capacity,
                   COUNT(u.id) FILTER (WHERE u.role = 'student') AS enrolled,
                   un.created_at
            FROM universities un
            LEFT JOIN users u ON u.university_id = un.id
            GROUP BY un.id
            ORDER BY un.name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(universities)
    }

    pub async fn find_by_id(&self, id: &Uuid) -> AppResult<University> {
        query_as::<_, University>("SELECT * FROM universities WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("University"))
    }

    pub async fn update(&self, id: &Uuid, name: &str, capacity: i32) -> AppResult<University> {
        query_as::<_, University>(
            "UPDATE universities SET name = $2, capacity = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(name)
        .bind(capacity)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| not_found("University"))
    }

    /// Delete a university. Rejected while students are still enrolled.
    pub async fn delete(&self, id: &Uuid) -> AppResult<()> {
        let enrolled: i64 =
            query_scalar("SELECT COUNT(*) FROM users WHERE university_id = $1")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        if enrolled > 0 {
            return Err(conflict("University still has enrolled users"));
        }

        let result = query("DELETE FROM universities WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found("University"));
        }
        Ok(())
    }

    pub async fn create_code(&self, university_id: &Uuid, valid_days: i64) -> AppResult<RegisterCode> {
        let code = query_as::<_, RegisterCode>(
            r#"
            INSERT INTO register_codes (id, code, university_id, uses, expires_at, created_at)
            VALUES ($1, $2, $3, 0, $4, now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(generate_code())
        .bind(university_id)
        .bind(Utc::now() + Duration::days(valid_days))
        .fetch_one(&self.pool)
        .await?;
        Ok(code)
    }

    pub async fn list_codes(&self, university_id: &Uuid) -> AppResult<Vec<RegisterCode>> {
        let codes = query_as::<_, RegisterCode>(
            "SELECT * FROM register_codes WHERE university_id = $1 ORDER BY created_at DESC",
        )
        .bind(university_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(codes)
    }

    /// Redeem a register code for signup: the code must exist and be
    /// unexpired, and the university roster must be under capacity. Usage is
    /// counted inside the same transaction as the capacity check.
    pub async fn redeem_code(&self, code: &str) -> AppResult<University> {
        let mut tx = self.pool.begin().await?;

        let register_code = query_as::<_, RegisterCode>(
            "SELECT * FROM register_codes WHERE code = $1 FOR UPDATE",
        )
        .bind(code)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::BadRequest("Unknown register code".to_string()))?;

        if register_code.is_expired(Utc::now()) {
            return Err(AppError::BadRequest("Register code has expired".to_string()));
        }

        let university = query_as::<_, University>("SELECT * FROM universities WHERE id = $1")
            .bind(register_code.university_id)
            .fetch_one(&mut *tx)
            .await?;

        let enrolled: i64 = query_scalar(
            "SELECT COUNT(*) FROM users WHERE university_id = $1 AND role = 'student'",
        )
        .bind(university.id)
        .fetch_one(&mut *tx)
        .await?;

        if enrolled >= i64::from(university.capacity) {
            return Err(conflict("University roster is at capacity"));
        }

        query("UPDATE register_codes SET uses = uses + 1 WHERE id = $1")
            .bind(register_code.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(university)
    }
}
