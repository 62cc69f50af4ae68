use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Account role, used by the client for role-appropriate routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Professor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Professor => "professor",
            Role::Admin => "admin",
        }
    }
}

/// A platform user. The password hash never leaves the backend.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub university_id: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Data required to insert a user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub university_id: Option<Uuid>,
}

/// Sign-in request body.
#[derive(Debug, Deserialize, Validate)]
pub struct SigninRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Sign-up request body. The register code binds the account to a cohort.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "Register code is required"))]
    pub register_code: String,
}

/// Admin-side provisioning request. Professor and admin accounts have no
/// self-service signup; an admin creates them here.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[validate(length(min = 2, message = "Name must be at least 2 characters"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub role: Role,
    pub university_id: Option<Uuid>,
}

/// Public view of a user, safe for API responses.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub university_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
            university_id: user.university_id,
            created_at: user.created_at,
        }
    }
}

/// Successful sign-in / sign-up response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserProfile,
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Professor).unwrap(), "\"professor\"");
        assert_eq!(Role::Admin.as_str(), "admin");
    }

    #[test]
    fn signup_request_validation() {
        let bad = SignupRequest {
            name: "A".into(),
            email: "not-an-email".into(),
            password: "short".into(),
            register_code: "".into(),
        };
        let errors = bad.validate().unwrap_err();
        assert_eq!(errors.field_errors().len(), 4);

        let good = SignupRequest {
            name: "Somsri".into(),
            email: "somsri@example.ac.th".into(),
            password: "a-long-password".into(),
            register_code: "NURSE-2345".into(),
        };
        assert!(good.validate().is_ok());
    }

    #[test]
    fn create_user_request_parses_role_and_cohort() {
        let request: CreateUserRequest = serde_json::from_value(serde_json::json!({
            "name": "Anong",
            "email": "anong@example.ac.th",
            "password": "a-long-password",
            "role": "professor",
            "universityId": null
        }))
        .unwrap();
        assert_eq!(request.role, Role::Professor);
        assert!(request.university_id.is_none());
        assert!(request.validate().is_ok());

        let bad: CreateUserRequest = serde_json::from_value(serde_json::json!({
            "name": "A",
            "email": "not-an-email",
            "password": "short",
            "role": "admin"
        }))
        .unwrap();
        assert!(bad.validate().is_err());
    }
}
