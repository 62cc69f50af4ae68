use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::routes::middleware::AuthedUser;
use crate::api::AppState;
use crate::domain::user::{Role, UserProfile};
use crate::infrastructure::database::{AttemptRepository, LabRepository, UserRepository};
use crate::infrastructure::error::{forbidden, AppError, AppResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortQuery {
    pub university_id: Option<Uuid>,
}

/// Resolve which university a dashboard call is scoped to. Professors are
/// pinned to their own cohort; admins pick one explicitly.
fn resolve_cohort(user: &AuthedUser, query: &CohortQuery) -> Result<Uuid, AppError> {
    user.require_any(&[Role::Professor, Role::Admin])?;
    match user.role() {
        Role::Admin => query
            .university_id
            .ok_or_else(|| AppError::BadRequest("universityId query parameter is required".into())),
        _ => user
            .university_id()
            .ok_or_else(|| forbidden("Professor account has no university")),
    }
}

/// Roster with per-student aggregates: labs attempted, labs passed,
/// average score.
#[get("/professor/students")]
pub async fn list_students(
    user: AuthedUser,
    query: web::Query<CohortQuery>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let university_id = resolve_cohort(&user, &query)?;
    let students = AttemptRepository::new(state.db.pool.clone())
        .students_overview(&university_id)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "universityId": university_id,
        "students": students,
    })))
}

/// One student's per-lab attempt history.
#[get("/professor/students/{id}")]
pub async fn student_detail(
    user: AuthedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    user.require_any(&[Role::Professor, Role::Admin])?;

    let student = UserRepository::new(state.db.pool.clone())
        .find_by_id(&path.into_inner())
        .await?;

    // Professors only see students of their own university.
    if user.role() == Role::Professor && student.university_id != user.university_id() {
        return Err(forbidden("Student belongs to another university"));
    }

    let attempts = AttemptRepository::new(state.db.pool.clone())
        .attempts_with_labs(&student.id)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "student": UserProfile::from(student),
        "attempts": attempts,
    })))
}

/// Cohort-wide aggregate for one lab: submissions, pass rate, average score.
#[get("/professor/labs/{number}/summary")]
pub async fn lab_summary(
    user: AuthedUser,
    path: web::Path<i32>,
    query: web::Query<CohortQuery>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    user.require_any(&[Role::Professor, Role::Admin])?;
    let university_id = match user.role() {
        Role::Admin => query.university_id,
        _ => Some(
            user.university_id()
                .ok_or_else(|| forbidden("Professor account has no university"))?,
        ),
    };

    let lab_number = path.into_inner();
    let lab = LabRepository::new(state.db.pool.clone())
        .find_by_number(lab_number)
        .await?;
    let summary = AttemptRepository::new(state.db.pool.clone())
        .lab_summary(&lab.id, university_id.as_ref())
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "labNumber": lab_number,
        "title": lab.title,
        "summary": summary,
    })))
}
