use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A clinical lab scenario. Scenarios are data rows, not code: every
/// language/course variant is one row with its own prompt and number.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Lab {
    pub id: Uuid,
    pub lab_number: i32,
    pub title: String,
    pub description: String,
    pub question_prompt: String,
    pub language: String,
    pub reference_video_url: Option<String>,
    pub pass_score: f64,
    pub max_attempts: i32,
    pub created_at: DateTime<Utc>,
}

/// Per-student progress on one lab, aggregated over graded attempts.
#[derive(Debug, Clone, FromRow)]
pub struct LabProgressRow {
    pub lab_id: Uuid,
    pub attempts_used: i64,
    pub best_score: Option<f64>,
    pub latest_passed: Option<bool>,
}

/// Attempts a student still has on a lab. Clamped at zero: a student can
/// never see a negative counter, even if the max was lowered after the
/// fact.
pub fn attempts_remaining(max_attempts: i32, attempts_used: i64) -> i64 {
    (i64::from(max_attempts) - attempts_used).max(0)
}

/// Catalogue entry joined with the caller's progress.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabWithProgress {
    pub lab_number: i32,
    pub title: String,
    pub description: String,
    pub question_prompt: String,
    pub language: String,
    pub reference_video_url: Option<String>,
    pub pass_score: f64,
    pub max_attempts: i32,
    pub attempts_used: i64,
    pub attempts_remaining: i64,
    pub best_score: Option<f64>,
    pub latest_passed: Option<bool>,
}

impl LabWithProgress {
    pub fn new(lab: Lab, progress: Option<&LabProgressRow>) -> Self {
        let attempts_used = progress.map(|p| p.attempts_used).unwrap_or(0);
        Self {
            attempts_remaining: attempts_remaining(lab.max_attempts, attempts_used),
            attempts_used,
            best_score: progress.and_then(|p| p.best_score),
            latest_passed: progress.and_then(|p| p.latest_passed),
            lab_number: lab.lab_number,
            title: lab.title,
            description: lab.description,
            question_prompt: lab.question_prompt,
            language: lab.language,
            reference_video_url: lab.reference_video_url,
            pass_score: lab.pass_score,
            max_attempts: lab.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_decrements_by_one_per_attempt() {
        assert_eq!(attempts_remaining(3, 0), 3);
        assert_eq!(attempts_remaining(3, 1), 2);
        assert_eq!(attempts_remaining(3, 2), 1);
        assert_eq!(attempts_remaining(3, 3), 0);
    }

    #[test]
    fn remaining_never_goes_below_zero() {
        assert_eq!(attempts_remaining(3, 4), 0);
        assert_eq!(attempts_remaining(1, 100), 0);
        // max lowered after attempts were made
        assert_eq!(attempts_remaining(2, 3), 0);
    }
}
