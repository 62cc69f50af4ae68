use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// A registration-code-gated cohort with a capacity.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct University {
    pub id: Uuid,
    pub name: String,
    pub capacity: i32,
    pub created_at: DateTime<Utc>,
}

/// University plus its current roster size.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UniversityWithRoster {
    pub id: Uuid,
    pub name: String,
    pub capacity: i32,
    pub enrolled: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UniversityRequest {
    #[validate(length(min = 2, message = "University name must be at least 2 characters"))]
    pub name: String,
    #[validate(range(min = 1, message = "Capacity must be positive"))]
    pub capacity: i32,
}

/// A cohort-join code issued by an admin.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct RegisterCode {
    pub id: Uuid,
    pub code: String,
    pub university_id: Uuid,
    pub uses: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl RegisterCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewRegisterCodeRequest {
    #[validate(range(min = 1, max = 365, message = "Validity must be between 1 and 365 days"))]
    pub valid_days: i64,
}

/// Alphabet without the look-alikes 0/O, 1/I/L: codes are read aloud in
/// classrooms.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LEN: usize = 8;

pub fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn code_uses_unambiguous_alphabet() {
        for _ in 0..100 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
            assert!(!code.contains('0') && !code.contains('O') && !code.contains('I'));
        }
    }

    #[test]
    fn expiry_is_inclusive_of_now() {
        let now = Utc::now();
        let code = RegisterCode {
            id: Uuid::new_v4(),
            code: generate_code(),
            university_id: Uuid::new_v4(),
            uses: 0,
            expires_at: now,
            created_at: now - Duration::days(1),
        };
        assert!(code.is_expired(now));
        assert!(!code.is_expired(now - Duration::seconds(1)));
    }
}
