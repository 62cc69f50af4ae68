use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::core::grading::{Grader, GradingJob};
use crate::domain::lab::{attempts_remaining, Lab};
use crate::domain::submission::{GradeResponse, LabAttempt, NewAttempt};
use crate::infrastructure::database::{AttemptRepository, LabRepository};
use crate::infrastructure::error::{conflict, AppResult};
use crate::infrastructure::storage::ChunkStore;

/// Lab lookup as the finalize pipeline needs it.
#[async_trait]
pub trait LabCatalogue: Send + Sync {
    async fn find_by_number(&self, lab_number: i32) -> AppResult<Lab>;
}

/// Attempt counting and recording behind the finalize pipeline.
#[async_trait]
pub trait AttemptLedger: Send + Sync {
    async fn count_for_user_lab(&self, user_id: &Uuid, lab_id: &Uuid) -> AppResult<i64>;
    async fn record(&self, new_attempt: &NewAttempt, max_attempts: i32) -> AppResult<LabAttempt>;
}

#[async_trait]
impl LabCatalogue for LabRepository {
    async fn find_by_number(&self, lab_number: i32) -> AppResult<Lab> {
        LabRepository::find_by_number(self, lab_number).await
    }
}

#[async_trait]
impl AttemptLedger for AttemptRepository {
    async fn count_for_user_lab(&self, user_id: &Uuid, lab_id: &Uuid) -> AppResult<i64> {
        AttemptRepository::count_for_user_lab(self, user_id, lab_id).await
    }

    async fn record(&self, new_attempt: &NewAttempt, max_attempts: i32) -> AppResult<LabAttempt> {
        AttemptRepository::record(self, new_attempt, max_attempts).await
    }
}

/// The chunk-staging and finalize pipeline: stage chunks on disk, and on
/// finalize reassemble, grade, and record the attempt.
///
/// Ordering matters for the attempts invariant: the attempt row is inserted
/// only after the grading service has answered, so a failed reassembly or a
/// failed grading call consumes nothing.
#[derive(Clone)]
pub struct UploadService {
    store: ChunkStore,
    grader: Arc<dyn Grader>,
    labs: Arc<dyn LabCatalogue>,
    attempts: Arc<dyn AttemptLedger>,
}

impl UploadService {
    pub fn new(
        store: ChunkStore,
        grader: Arc<dyn Grader>,
        labs: Arc<dyn LabCatalogue>,
        attempts: Arc<dyn AttemptLedger>,
    ) -> Self {
        Self {
            store,
            grader,
            labs,
            attempts,
        }
    }

    pub async fn stage_chunk(
        &self,
        user_id: &Uuid,
        file_name: &str,
        chunk_index: u32,
        total_chunks: u32,
        bytes: &[u8],
    ) -> AppResult<()> {
        self.store
            .put_chunk(user_id, file_name, chunk_index, total_chunks, bytes)
            .await
    }

    pub async fn finalize(
        &self,
        user_id: &Uuid,
        lab_number: i32,
        file_name: &str,
        total_chunks: u32,
    ) -> AppResult<GradeResponse> {
        let lab = self.labs.find_by_number(lab_number).await?;

        let used = self.attempts.count_for_user_lab(user_id, &lab.id).await?;
        if used >= i64::from(lab.max_attempts) {
            // The staged media can never be graded; free the disk.
            self.store.discard(user_id, file_name).await;
            return Err(conflict("No attempts remaining for this lab"));
        }

        let assembled = self.store.assemble(user_id, file_name, total_chunks).await?;
        info!(
            user = %user_id,
            lab = lab_number,
            bytes = assembled.size_bytes,
            sha256 = %assembled.sha256_hex,
            "upload assembled"
        );

        let media = fs::read(&assembled.path).await?;
        let outcome = match self
            .grader
            .grade(GradingJob {
                lab_number: lab.lab_number,
                question_prompt: lab.question_prompt.clone(),
                language: lab.language.clone(),
                pass_score: lab.pass_score,
                file_name: file_name.to_string(),
                media,
            })
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                // No grade, no attempt consumed, no orphaned media.
                warn!(user = %user_id, lab = lab_number, "grading failed: {}", e);
                self.store.remove_assembled(&assembled.path).await;
                return Err(e);
            }
        };

        let attempt = self
            .attempts
            .record(
                &NewAttempt {
                    user_id: *user_id,
                    lab_id: lab.id,
                    media_path: assembled.path.display().to_string(),
                    media_size_bytes: assembled.size_bytes as i64,
                    media_sha256: assembled.sha256_hex,
                    score: outcome.score,
                    passed: outcome.passed(),
                    pass_fail_status: outcome.pass_fail_status.clone(),
                    pros: outcome.pros.clone(),
                    recommendations: outcome.recommendations.clone(),
                },
                lab.max_attempts,
            )
            .await?;

        info!(
            user = %user_id,
            lab = lab_number,
            attempt = attempt.attempt_number,
            score = attempt.score,
            passed = attempt.passed,
            "attempt recorded"
        );

        Ok(GradeResponse {
            lab_number: lab.lab_number,
            attempt_number: attempt.attempt_number,
            attempts_remaining: attempts_remaining(
                lab.max_attempts,
                i64::from(attempt.attempt_number),
            ),
            score: attempt.score,
            pass_fail_status: attempt.pass_fail_status,
            pros: attempt.pros,
            recommendations: attempt.recommendations,
        })
    }
}
