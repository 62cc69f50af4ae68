use sqlx::{query_as, query_scalar, PgPool};
use uuid::Uuid;

use crate::domain::lab::LabProgressRow;
use crate::domain::submission::{LabAttempt, NewAttempt};
use crate::infrastructure::error::{conflict, AppResult};

/// Repository for graded lab attempts and the aggregates built on them.
#[derive(Clone)]
pub struct AttemptRepository {
    pool: PgPool,
}

/// One student's standing across the cohort, for professor dashboards.
#[derive(Debug, serde::Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StudentOverviewRow {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub labs_attempted: i64,
    pub labs_passed: i64,
    pub average_score: Option<f64>,
}

/// Cohort-wide aggregate for a single lab.
#[derive(Debug, serde::Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LabSummaryRow {
    pub submissions: i64,
    pub students: i64,
    pub students_passed: i64,
    pub average_score: Option<f64>,
}

/// Attempt joined with its lab, for per-student drill-down views.
#[derive(Debug, serde::Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct StudentAttemptRow {
    pub lab_number: i32,
    pub title: String,
    pub attempt_number: i32,
    pub score: f64,
    pub passed: bool,
    pub pass_fail_status: String,
    pub pros: String,
    pub recommendations: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl AttemptRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn count_for_user_lab(&self, user_id: &Uuid, lab_id: &Uuid) -> AppResult<i64> {
        let count: i64 =
            query_scalar("SELECT COUNT(*) FROM lab_attempts WHERE user_id = $1 AND lab_id = $2")
                .bind(user_id)
                .bind(lab_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Insert a graded attempt, assigning the next attempt number inside a
    /// transaction. The unique (user, lab, attempt_number) constraint is the
    /// backstop against two concurrent finalizes of the same lab; the loser
    /// surfaces as a conflict instead of a duplicate index.
    pub async fn record(&self, new_attempt: &NewAttempt, max_attempts: i32) -> AppResult<LabAttempt> {
        let mut tx = self.pool.begin().await?;

        let used: i64 =
            query_scalar("SELECT COUNT(*) FROM lab_attempts WHERE user_id = $1 AND lab_id = $2")
                .bind(new_attempt.user_id)
                .bind(new_attempt.lab_id)
                .fetch_one(&mut *tx)
                .await?;

        if used >= i64::from(max_attempts) {
            return Err(conflict("No attempts remaining for this lab"));
        }

        let attempt = query_as::<_, LabAttempt>(
            r#"
            INSERT INTO lab_attempts
                (id, user_id, lab_id, attempt_number, media_path, media_size_bytes,
                 media_sha256, score, passed, pass_fail_status, pros, recommendations, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_attempt.user_id)
        .bind(new_attempt.lab_id)
        .bind((used + 1) as i32)
        .bind(&new_attempt.media_path)
        .bind(new_attempt.media_size_bytes)
        .bind(&new_attempt.media_sha256)
        .bind(new_attempt.score)
        .bind(new_attempt.passed)
        .bind(&new_attempt.pass_fail_status)
        .bind(&new_attempt.pros)
        .bind(&new_attempt.recommendations)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(attempt)
    }

    pub async fn list_for_user_lab(
        &self,
        user_id: &Uuid,
        lab_id: &Uuid,
    ) -> AppResult<Vec<LabAttempt>> {
        let attempts = query_as::<_, LabAttempt>(
            r#"
            SELECT * FROM lab_attempts
            WHERE user_id = $1 AND lab_id = $2
            ORDER BY attempt_number DESC
            "#,
        )
        .bind(user_id)
        .bind(lab_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(attempts)
    }

    /// Per-lab progress rows for one student, keyed by lab id.
    pub async fn progress_for_user(&self, user_id: &Uuid) -> AppResult<Vec<LabProgressRow>> {
        let rows = query_as::<_, LabProgressRow>(
            r#"
            SELECT lab_id,
                   COUNT(*) AS attempts_used,
                   MAX(score) AS best_score,
                   (ARRAY_AGG(passed ORDER BY attempt_number DESC))[1] AS latest_passed
            FROM lab_attempts
            WHERE user_id = $1
            GROUP BY lab_id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Roster overview for a university cohort: every student, attempted or
    /// not, with their aggregate standing.
    pub async fn students_overview(&self, university_id: &Uuid) -> AppResult<Vec<StudentOverviewRow>> {
        let rows = query_as::<_, StudentOverviewRow>(
            r#"
            SELECT u.id AS user_id, u.name, u.email,
                   COUNT(DISTINCT a.lab_id) AS labs_attempted,
                   COUNT(DISTINCT a.lab_id) FILTER (WHERE a.passed) AS labs_passed,
                   AVG(a.score) AS average_score
            FROM users u
            LEFT JOIN lab_attempts a ON a.user_id = u.id
            WHERE u.university_id = $1 AND u.role = 'student'
            GROUP BY u.id, u.name, u.email
            ORDER BY u.name
            "#,
        )
        .bind(university_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn attempts_with_labs(&self, user_id: &Uuid) -> AppResult<Vec<StudentAttemptRow>> {
        let rows = query_as::<_, StudentAttemptRow>(
            r#"
            SELECT l.lab_number, l.title, a.attempt_number, a.score, a.passed,
                   a.pass_fail_status, a.pros, a.recommendations, a.created_at
            FROM lab_attempts a
            JOIN labs l ON l.id = a.lab_id
            WHERE a.user_id = $1
            ORDER BY l.lab_number, a.attempt_number DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Cohort aggregate for one lab. `university_id = None` spans all
    /// universities (admin view).
    pub async fn lab_summary(
        &self,
        lab_id: &Uuid,
        university_id: Option<&Uuid>,
    ) -> AppResult<LabSummaryRow> {
        let row = query_as::<_, LabSummaryRow>(
            r#"
            SELECT COUNT(a.id) AS submissions,
                   COUNT(DISTINCT a.user_id) AS students,
                   COUNT(DISTINCT a.user_id) FILTER (WHERE a.passed) AS students_passed,
                   AVG(a.score) AS average_score
            FROM lab_attempts a
            JOIN users u ON u.id = a.user_id
            WHERE a.lab_id = $1 AND ($2::uuid IS NULL OR u.university_id = $2)
            "#,
        )
        .bind(lab_id)
        .bind(university_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
