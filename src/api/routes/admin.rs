use actix_web::{delete, get, post, put, web, HttpResponse};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::api::routes::middleware::AuthedUser;
use crate::api::AppState;
use crate::domain::university::{NewRegisterCodeRequest, UniversityRequest};
use crate::domain::user::{CreateUserRequest, Role, UserProfile};
use crate::infrastructure::database::{UniversityRepository, UserRepository};
use crate::infrastructure::error::AppResult;

#[get("/admin/universities")]
pub async fn list_universities(
    user: AuthedUser,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    user.require_role(Role::Admin)?;
    let universities = UniversityRepository::new(state.db.pool.clone())
        .list_with_roster()
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "universities": universities })))
}

#[post("/admin/universities")]
pub async fn create_university(
    user: AuthedUser,
    request: web::Json<UniversityRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    user.require_role(Role::Admin)?;
    request.validate()?;
    let university = UniversityRepository::new(state.db.pool.clone())
        .create(&request.name, request.capacity)
        .await?;
    Ok(HttpResponse::Created().json(university))
}

#[get("/admin/universities/{id}")]
pub async fn get_university(
    user: AuthedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    user.require_role(Role::Admin)?;
    let university = UniversityRepository::new(state.db.pool.clone())
        .find_by_id(&path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(university))
}

#[put("/admin/universities/{id}")]
pub async fn update_university(
    user: AuthedUser,
    path: web::Path<Uuid>,
    request: web::Json<UniversityRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    user.require_role(Role::Admin)?;
    request.validate()?;
    let university = UniversityRepository::new(state.db.pool.clone())
        .update(&path.into_inner(), &request.name, request.capacity)
        .await?;
    Ok(HttpResponse::Ok().json(university))
}

#[delete("/admin/universities/{id}")]
pub async fn delete_university(
    user: AuthedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    user.require_role(Role::Admin)?;
    UniversityRepository::new(state.db.pool.clone())
        .delete(&path.into_inner())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/admin/universities/{id}/register-codes")]
pub async fn create_register_code(
    user: AuthedUser,
    path: web::Path<Uuid>,
    request: web::Json<NewRegisterCodeRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    user.require_role(Role::Admin)?;
    request.validate()?;
    let repo = UniversityRepository::new(state.db.pool.clone());
    let university_id = path.into_inner();
    // 404 before minting a code for a phantom cohort.
    repo.find_by_id(&university_id).await?;
    let code = repo.create_code(&university_id, request.valid_days).await?;
    Ok(HttpResponse::Created().json(code))
}

#[get("/admin/universities/{id}/register-codes")]
pub async fn list_register_codes(
    user: AuthedUser,
    path: web::Path<Uuid>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    user.require_role(Role::Admin)?;
    let codes = UniversityRepository::new(state.db.pool.clone())
        .list_codes(&path.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "codes": codes })))
}

#[get("/admin/users")]
pub async fn list_users(user: AuthedUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    user.require_role(Role::Admin)?;
    let users = UserRepository::new(state.db.pool.clone())
        .list_with_university()
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "users": users })))
}

/// Staff accounts come in here; student accounts come in through signup.
#[post("/admin/users")]
pub async fn create_user(
    user: AuthedUser,
    request: web::Json<CreateUserRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    user.require_role(Role::Admin)?;
    let request = request.into_inner();
    request.validate()?;
    let created = state.auth.provision(&request).await?;
    Ok(HttpResponse::Created().json(UserProfile::from(created)))
}
