use sqlx::{query_as, query_scalar, PgPool};
use uuid::Uuid;

use crate::domain::user::{NewUser, Role, User};
use crate::infrastructure::error::{not_found, AppResult};

/// Repository for user rows.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

/// User joined with its university name, for admin listings.
#[derive(Debug, serde::Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserWithUniversity {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub university_id: Option<Uuid>,
    pub university_name: Option<String>,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, new_user: &NewUser) -> AppResult<User> {
        let user = query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, role, university_id, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, TRUE, now(), now())
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new_user.name)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .bind(new_user.role)
        .bind(new_user.university_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn find_by_id(&self, id: &Uuid) -> AppResult<User> {
        query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| not_found("User"))
    }

    pub async fn email_exists(&self, email: &str) -> AppResult<bool> {
        let exists: bool = query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    pub async fn admin_exists(&self) -> AppResult<bool> {
        let exists: bool =
            query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE role = 'admin')")
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    pub async fn list_with_university(&self) -> AppResult<Vec<UserWithUniversity>> {
        let users = query_as::<_, UserWithUniversity>(
            r#"
            SELECT u.id, u.name, u.email, u.role, u.university_id,
                   un.name AS university_name, u.is_active, u.created_at
            FROM users u
            LEFT JOIN universities un ON un.id = u.university_id
            ORDER BY u.created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }
}
