use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::{ready, Ready};
use uuid::Uuid;

use crate::api::AppState;
use crate::domain::user::Role;
use crate::infrastructure::error::{forbidden, unauthorized, AppError};
use crate::infrastructure::jwt::Claims;

/// Extractor for the authenticated caller. Pulls the bearer token from the
/// `Authorization` header and verifies it against the application keys.
#[derive(Debug, Clone)]
pub struct AuthedUser(pub Claims);

impl AuthedUser {
    pub fn user_id(&self) -> Uuid {
        self.0.sub
    }

    pub fn role(&self) -> Role {
        self.0.role
    }

    pub fn university_id(&self) -> Option<Uuid> {
        self.0.university_id
    }

    pub fn require_role(&self, role: Role) -> Result<(), AppError> {
        if self.0.role == role {
            Ok(())
        } else {
            Err(forbidden(format!("{} privileges required", role.as_str())))
        }
    }

    pub fn require_any(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.0.role) {
            Ok(())
        } else {
            Err(forbidden("Insufficient privileges"))
        }
    }
}

fn authenticate(req: &HttpRequest) -> Result<Claims, AppError> {
    let state = req
        .app_data::<web::Data<AppState>>()
        .ok_or_else(|| AppError::Internal("application state not configured".to_string()))?;

    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("Authorization header must carry a Bearer token"))?;

    state.jwt.verify(token)
}

impl FromRequest for AuthedUser {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req).map(AuthedUser).map_err(Into::into))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn claims(role: Role) -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            role,
            university_id: None,
            iat: Utc::now().timestamp(),
            exp: Utc::now().timestamp() + 3600,
        }
    }

    #[test]
    fn role_guards() {
        let student = AuthedUser(claims(Role::Student));
        assert!(student.require_role(Role::Student).is_ok());
        assert!(student.require_role(Role::Admin).is_err());
        assert!(student
            .require_any(&[Role::Professor, Role::Admin])
            .is_err());

        let admin = AuthedUser(claims(Role::Admin));
        assert!(admin.require_any(&[Role::Professor, Role::Admin]).is_ok());
    }
}
