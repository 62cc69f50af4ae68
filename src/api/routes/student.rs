use std::collections::HashMap;

use actix_web::{get, web, HttpResponse};
use serde_json::json;
use uuid::Uuid;

use crate::api::routes::middleware::AuthedUser;
use crate::api::AppState;
use crate::domain::lab::{LabProgressRow, LabWithProgress};
use crate::domain::submission::AttemptView;
use crate::infrastructure::database::{AttemptRepository, LabRepository};
use crate::infrastructure::error::AppResult;

/// Lab catalogue joined with the caller's progress.
#[get("/student/labs")]
pub async fn list_labs(user: AuthedUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let labs = LabRepository::new(state.db.pool.clone()).list().await?;
    let progress: HashMap<Uuid, LabProgressRow> = AttemptRepository::new(state.db.pool.clone())
        .progress_for_user(&user.user_id())
        .await?
        .into_iter()
        .map(|row| (row.lab_id, row))
        .collect();

    let labs: Vec<LabWithProgress> = labs
        .into_iter()
        .map(|lab| {
            let row = progress.get(&lab.id);
            LabWithProgress::new(lab, row)
        })
        .collect();

    Ok(HttpResponse::Ok().json(json!({ "labs": labs })))
}

#[get("/student/labs/{number}")]
pub async fn get_lab(
    user: AuthedUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let lab = LabRepository::new(state.db.pool.clone())
        .find_by_number(path.into_inner())
        .await?;
    let progress = AttemptRepository::new(state.db.pool.clone())
        .progress_for_user(&user.user_id())
        .await?;
    let row = progress.iter().find(|p| p.lab_id == lab.id);

    Ok(HttpResponse::Ok().json(LabWithProgress::new(lab, row)))
}

/// The caller's graded attempts for one lab, newest first.
#[get("/student/labs/{number}/attempts")]
pub async fn list_attempts(
    user: AuthedUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let lab_number = path.into_inner();
    let lab = LabRepository::new(state.db.pool.clone())
        .find_by_number(lab_number)
        .await?;
    let attempts: Vec<AttemptView> = AttemptRepository::new(state.db.pool.clone())
        .list_for_user_lab(&user.user_id(), &lab.id)
        .await?
        .into_iter()
        .map(AttemptView::from)
        .collect();

    Ok(HttpResponse::Ok().json(json!({
        "labNumber": lab_number,
        "attempts": attempts,
    })))
}
