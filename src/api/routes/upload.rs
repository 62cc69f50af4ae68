use actix_multipart::form::tempfile::TempFile;
use actix_multipart::form::text::Text;
use actix_multipart::form::MultipartForm;
use actix_web::{post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tokio::fs;

use crate::api::routes::middleware::AuthedUser;
use crate::api::AppState;
use crate::infrastructure::error::{AppError, AppResult};

/// One chunk of a recorded response, as the frontend posts it:
/// `(chunk bytes, fileName, chunkIndex, totalChunks)`.
#[derive(MultipartForm)]
pub struct ChunkForm {
    pub file: TempFile,
    #[multipart(rename = "fileName")]
    pub file_name: Text<String>,
    #[multipart(rename = "chunkIndex")]
    pub chunk_index: Text<u32>,
    #[multipart(rename = "totalChunks")]
    pub total_chunks: Text<u32>,
}

#[post("/lab-deployed/upload-chunk")]
pub async fn upload_chunk(
    user: AuthedUser,
    MultipartForm(form): MultipartForm<ChunkForm>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let file_name = form.file_name.into_inner();
    let chunk_index = form.chunk_index.into_inner();
    let total_chunks = form.total_chunks.into_inner();

    let bytes = fs::read(form.file.file.path())
        .await
        .map_err(|e| AppError::Internal(format!("failed to read staged chunk: {}", e)))?;

    state
        .uploads
        .stage_chunk(&user.user_id(), &file_name, chunk_index, total_chunks, &bytes)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "fileName": file_name,
        "chunkIndex": chunk_index,
        "totalChunks": total_chunks,
        "received": true,
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    pub file_name: String,
    pub total_chunks: u32,
}

/// Finalize a chunked upload for a lab: verify all chunks arrived,
/// reassemble, grade, and return the stored result.
#[post("/lab-deployed/upload/{lab_number}")]
pub async fn finalize_upload(
    user: AuthedUser,
    path: web::Path<i32>,
    request: web::Json<FinalizeRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let grade = state
        .uploads
        .finalize(
            &user.user_id(),
            path.into_inner(),
            &request.file_name,
            request.total_chunks,
        )
        .await?;

    Ok(HttpResponse::Ok().json(grade))
}
