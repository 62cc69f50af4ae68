use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One graded submission of a lab by a student.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LabAttempt {
    pub id: Uuid,
    pub user_id: Uuid,
    pub lab_id: Uuid,
    pub attempt_number: i32,
    pub media_path: String,
    pub media_size_bytes: i64,
    pub media_sha256: String,
    pub score: f64,
    pub passed: bool,
    pub pass_fail_status: String,
    pub pros: String,
    pub recommendations: String,
    pub created_at: DateTime<Utc>,
}

/// Data for inserting a graded attempt. The attempt number is assigned by
/// the repository, not the caller.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    pub user_id: Uuid,
    pub lab_id: Uuid,
    pub media_path: String,
    pub media_size_bytes: i64,
    pub media_sha256: String,
    pub score: f64,
    pub passed: bool,
    pub pass_fail_status: String,
    pub pros: String,
    pub recommendations: String,
}

/// API view of an attempt, shaped the way the client renders feedback.
/// `pass_fail_status` is the grading service's own wording, untouched.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptView {
    pub attempt_number: i32,
    pub score: f64,
    pub pass_fail_status: String,
    pub pros: String,
    pub recommendations: String,
    pub submitted_at: DateTime<Utc>,
}

impl From<LabAttempt> for AttemptView {
    fn from(attempt: LabAttempt) -> Self {
        Self {
            attempt_number: attempt.attempt_number,
            score: attempt.score,
            pass_fail_status: attempt.pass_fail_status,
            pros: attempt.pros,
            recommendations: attempt.recommendations,
            submitted_at: attempt.created_at,
        }
    }
}

/// Response for a finalized, graded upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeResponse {
    pub lab_number: i32,
    pub attempt_number: i32,
    pub attempts_remaining: i64,
    pub score: f64,
    pub pass_fail_status: String,
    pub pros: String,
    pub recommendations: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_view_keeps_grading_service_wording() {
        let attempt = LabAttempt {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            lab_id: Uuid::new_v4(),
            attempt_number: 2,
            media_path: "/data/a.webm".into(),
            media_size_bytes: 10,
            media_sha256: "00".into(),
            score: 72.5,
            passed: true,
            pass_fail_status: "Passed".into(),
            pros: "Clear SBAR handoff".into(),
            recommendations: "Verify patient ID earlier".into(),
            created_at: Utc::now(),
        };
        let view = AttemptView::from(attempt);
        // Whatever casing the grading service used comes back unchanged.
        assert_eq!(view.pass_fail_status, "Passed");
        assert_eq!(view.attempt_number, 2);

        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("passFailStatus").is_some());
        assert!(json.get("submittedAt").is_some());
    }
}
