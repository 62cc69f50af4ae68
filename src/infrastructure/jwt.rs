use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::user::{Role, User};
use crate::infrastructure::error::AppResult;

/// Claims carried by every bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    pub university_id: Option<Uuid>,
    pub iat: i64,
    pub exp: i64,
}

/// HS256 signing/verification keys plus the access-token TTL.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl JwtKeys {
    pub fn new(secret: &str, access_ttl_hours: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl: Duration::hours(access_ttl_hours),
        }
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(&self, user: &User) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            role: user.role,
            university_id: user.university_id,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify(&self, token: &str) -> AppResult<Claims> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::Role;
    use chrono::Utc;

    fn student() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test Student".into(),
            email: "student@example.com".into(),
            password_hash: "x".into(),
            role: Role::Student,
            university_id: Some(Uuid::new_v4()),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn issue_verify_round_trip() {
        let keys = JwtKeys::new("test-secret-that-is-long-enough-0123", 12);
        let user = student();
        let token = keys.issue(&user).unwrap();
        let claims = keys.verify(&token).unwrap();
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, Role::Student);
        assert_eq!(claims.university_id, user.university_id);
    }

    #[test]
    fn expired_token_is_rejected() {
        // Negative TTL puts exp well past jsonwebtoken's default leeway.
        let keys = JwtKeys::new("test-secret-that-is-long-enough-0123", -2);
        let token = keys.issue(&student()).unwrap();
        assert!(keys.verify(&token).is_err());
    }

    #[test]
    fn token_from_other_secret_is_rejected() {
        let keys_a = JwtKeys::new("secret-a-that-is-long-enough-012345", 1);
        let keys_b = JwtKeys::new("secret-b-that-is-long-enough-012345", 1);
        let token = keys_a.issue(&student()).unwrap();
        assert!(keys_b.verify(&token).is_err());
        assert!(keys_b.verify("not-a-token").is_err());
    }
}
