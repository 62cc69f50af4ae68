use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::GradingSettings;
use crate::infrastructure::error::{AppError, AppResult};

/// What the grading service returns for a submission, stored verbatim on
/// the attempt and shown to the student.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradingOutcome {
    pub score: f64,
    pub pass_fail_status: String,
    #[serde(default)]
    pub pros: String,
    #[serde(default)]
    pub recommendations: String,
}

impl GradingOutcome {
    /// Normalized flag for aggregates (best score, cohort pass counts).
    /// Only the literal word "passed", in any casing, counts as a pass;
    /// the verbatim `pass_fail_status` string is what gets stored and
    /// shown to students.
    pub fn passed(&self) -> bool {
        self.pass_fail_status.eq_ignore_ascii_case("passed")
    }
}

/// A submission handed to the grading service.
#[derive(Debug, Clone)]
pub struct GradingJob {
    pub lab_number: i32,
    pub question_prompt: String,
    pub language: String,
    pub pass_score: f64,
    pub file_name: String,
    pub media: Vec<u8>,
}

/// Seam for the grading backend, so the upload pipeline can be exercised
/// without the real service.
#[async_trait]
pub trait Grader: Send + Sync {
    async fn grade(&self, job: GradingJob) -> AppResult<GradingOutcome>;
}

/// HTTP client for the AI grading service.
///
/// Failures map to exactly three categories surfaced to the caller: the
/// service answered with an error status (`GradingRejected`), it never
/// answered (`GradingUnreachable`), or the request could not be built
/// (`GradingRequest`). There is no retry; the student repeats the action.
pub struct GradingClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct GradingErrorBody {
    #[serde(alias = "message")]
    error: String,
}

impl GradingClient {
    pub fn new(settings: &GradingSettings) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| AppError::GradingRequest(e.to_string()))?;
        Ok(Self {
            http,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        })
    }
}

#[async_trait]
impl Grader for GradingClient {
    async fn grade(&self, job: GradingJob) -> AppResult<GradingOutcome> {
        let media_len = job.media.len();
        let part = multipart::Part::bytes(job.media)
            .file_name(job.file_name.clone())
            .mime_str("application/octet-stream")
            .map_err(|e| AppError::GradingRequest(e.to_string()))?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("labNumber", job.lab_number.to_string())
            .text("questionPrompt", job.question_prompt)
            .text("language", job.language)
            .text("passScore", job.pass_score.to_string());

        let mut request = self
            .http
            .post(format!("{}/v1/grade", self.base_url))
            .multipart(form);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        info!(lab = job.lab_number, bytes = media_len, "submitting media for grading");
        // From<reqwest::Error> sorts send failures into unreachable/request.
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<GradingErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string(),
            };
            warn!(lab = job.lab_number, %status, "grading service rejected submission");
            return Err(AppError::GradingRejected(format!("{}: {}", status.as_u16(), message)));
        }

        let outcome = response
            .json::<GradingOutcome>()
            .await
            .map_err(|e| AppError::GradingRejected(format!("unparseable response: {}", e)))?;
        info!(
            lab = job.lab_number,
            score = outcome.score,
            status = %outcome.pass_fail_status,
            "grading response received"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_include;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(base_url: &str) -> GradingSettings {
        GradingSettings {
            base_url: base_url.to_string(),
            api_key: "test-key".to_string(),
            timeout_secs: 5,
        }
    }

    fn job() -> GradingJob {
        GradingJob {
            lab_number: 4,
            question_prompt: "Postpartum hemorrhage: state your first actions".into(),
            language: "en".into(),
            pass_score: 60.0,
            file_name: "resp.webm".into(),
            media: vec![1, 2, 3, 4],
        }
    }

    #[tokio::test]
    async fn parses_successful_grading_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/grade"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "score": 78.0,
                "passFailStatus": "passed",
                "pros": "Assessed fundus promptly",
                "recommendations": "Call for help earlier"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = GradingClient::new(&settings(&server.uri())).unwrap();
        let outcome = client.grade(job()).await.unwrap();
        assert!(outcome.passed());
        assert_eq!(outcome.score, 78.0);

        assert_json_include!(
            actual: serde_json::to_value(&outcome).unwrap(),
            expected: serde_json::json!({ "passFailStatus": "passed", "score": 78.0 })
        );
    }

    #[tokio::test]
    async fn failed_status_is_not_passed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/grade"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "score": 41.0,
                "passFailStatus": "failed"
            })))
            .mount(&server)
            .await;

        let client = GradingClient::new(&settings(&server.uri())).unwrap();
        let outcome = client.grade(job()).await.unwrap();
        assert!(!outcome.passed());
        assert_eq!(outcome.pros, "");
    }

    #[test]
    fn only_the_word_passed_counts_as_a_pass() {
        let outcome = |status: &str| GradingOutcome {
            score: 70.0,
            pass_fail_status: status.to_string(),
            pros: String::new(),
            recommendations: String::new(),
        };
        assert!(outcome("passed").passed());
        assert!(outcome("Passed").passed());
        assert!(outcome("PASSED").passed());
        // Anything else is treated as a fail, but the string itself is
        // preserved for the student to see.
        assert!(!outcome("pass").passed());
        assert!(!outcome("failed").passed());
        assert_eq!(outcome("pass").pass_fail_status, "pass");
    }

    #[tokio::test]
    async fn error_status_maps_to_rejected_with_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/grade"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_json(serde_json::json!({ "error": "audio track missing" })),
            )
            .mount(&server)
            .await;

        let client = GradingClient::new(&settings(&server.uri())).unwrap();
        let err = client.grade(job()).await.unwrap_err();
        match err {
            AppError::GradingRejected(msg) => {
                assert!(msg.contains("422"));
                assert!(msg.contains("audio track missing"));
            }
            other => panic!("expected GradingRejected, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unreachable_service_maps_to_no_response_category() {
        // Nothing listens on this port.
        let client = GradingClient::new(&settings("http://127.0.0.1:9")).unwrap();
        let err = client.grade(job()).await.unwrap_err();
        assert!(
            matches!(err, AppError::GradingUnreachable(_)),
            "expected GradingUnreachable, got {:?}",
            err
        );
    }
}
