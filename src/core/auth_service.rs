use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use tracing::info;

use crate::config::AuthSettings;
use crate::domain::user::{CreateUserRequest, NewUser, Role, SignupRequest, User};
use crate::infrastructure::database::{UniversityRepository, UserRepository};
use crate::infrastructure::error::{conflict, unauthorized, AppError, AppResult};
use crate::infrastructure::jwt::JwtKeys;

/// Sign-in and register-code sign-up.
#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    universities: UniversityRepository,
    jwt: JwtKeys,
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(format!("password hashing failed: {}", e)))?;
    Ok(hash.to_string())
}

pub fn verify_password(hash: &str, password: &str) -> AppResult<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("stored password hash is invalid: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

impl AuthService {
    pub fn new(users: UserRepository, universities: UniversityRepository, jwt: JwtKeys) -> Self {
        Self {
            users,
            universities,
            jwt,
        }
    }

    pub fn jwt(&self) -> &JwtKeys {
        &self.jwt
    }

    /// Email/password sign-in. The same message is returned for unknown
    /// email and wrong password.
    pub async fn signin(&self, email: &str, password: &str) -> AppResult<(User, String)> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| unauthorized("Invalid email or password"))?;

        if !verify_password(&user.password_hash, password)? {
            return Err(unauthorized("Invalid email or password"));
        }
        if !user.is_active {
            return Err(unauthorized("Account is deactivated"));
        }

        let token = self.jwt.issue(&user)?;
        info!(user = %user.id, role = user.role.as_str(), "user signed in");
        Ok((user, token))
    }

    /// Register-code sign-up. The code binds the account to a university and
    /// fails when unknown, expired, or the roster is at capacity. New
    /// accounts are always students.
    pub async fn signup(&self, request: &SignupRequest) -> AppResult<(User, String)> {
        if self.users.email_exists(&request.email).await? {
            return Err(conflict("Email is already registered"));
        }

        let university = self.universities.redeem_code(&request.register_code).await?;

        let new_user = NewUser {
            name: request.name.clone(),
            email: request.email.clone(),
            password_hash: hash_password(&request.password)?,
            role: Role::Student,
            university_id: Some(university.id),
        };
        let user = self.users.create(&new_user).await?;
        let token = self.jwt.issue(&user)?;
        info!(user = %user.id, university = %university.id, "student registered");
        Ok((user, token))
    }

    /// Admin-side account provisioning, any role. Professors must carry a
    /// university so their dashboard has a cohort to show.
    pub async fn provision(&self, request: &CreateUserRequest) -> AppResult<User> {
        if self.users.email_exists(&request.email).await? {
            return Err(conflict("Email is already registered"));
        }
        if request.role == Role::Professor && request.university_id.is_none() {
            return Err(AppError::BadRequest(
                "Professor accounts require a university".to_string(),
            ));
        }
        if let Some(university_id) = request.university_id {
            self.universities.find_by_id(&university_id).await?;
        }

        let user = self
            .users
            .create(&NewUser {
                name: request.name.clone(),
                email: request.email.clone(),
                password_hash: hash_password(&request.password)?,
                role: request.role,
                university_id: request.university_id,
            })
            .await?;
        info!(user = %user.id, role = user.role.as_str(), "account provisioned");
        Ok(user)
    }

    /// First-run bootstrap: when credentials are configured and no admin
    /// row exists yet, create one. Without this a fresh deployment has no
    /// way to reach the admin surface at all.
    pub async fn ensure_bootstrap_admin(&self, settings: &AuthSettings) -> AppResult<()> {
        let (email, password) = match (
            settings.bootstrap_admin_email.as_deref(),
            settings.bootstrap_admin_password.as_deref(),
        ) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                (email, password)
            }
            _ => return Ok(()),
        };

        if self.users.admin_exists().await? {
            return Ok(());
        }

        let user = self
            .users
            .create(&NewUser {
                name: "Administrator".to_string(),
                email: email.to_string(),
                password_hash: hash_password(password)?,
                role: Role::Admin,
                university_id: None,
            })
            .await?;
        info!(user = %user.id, "bootstrap admin created");
        Ok(())
    }
}
