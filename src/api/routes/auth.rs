use actix_web::{get, post, web, HttpResponse};
use validator::Validate;

use crate::api::routes::middleware::AuthedUser;
use crate::api::AppState;
use crate::domain::user::{AuthResponse, SigninRequest, SignupRequest, UserProfile};
use crate::infrastructure::database::UserRepository;
use crate::infrastructure::error::AppResult;

#[post("/user/signin")]
pub async fn signin(
    credentials: web::Json<SigninRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    credentials.validate()?;

    let (user, token) = state.auth.signin(&credentials.email, &credentials.password).await?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        user: user.into(),
        access_token: token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.ttl_seconds(),
    }))
}

#[post("/user/signup")]
pub async fn signup(
    request: web::Json<SignupRequest>,
    state: web::Data<AppState>,
) -> AppResult<HttpResponse> {
    let request = request.into_inner();
    request.validate()?;

    let (user, token) = state.auth.signup(&request).await?;

    Ok(HttpResponse::Created().json(AuthResponse {
        user: user.into(),
        access_token: token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt.ttl_seconds(),
    }))
}

#[get("/user/me")]
pub async fn me(user: AuthedUser, state: web::Data<AppState>) -> AppResult<HttpResponse> {
    let users = UserRepository::new(state.db.pool.clone());
    let profile: UserProfile = users.find_by_id(&user.user_id()).await?.into();
    Ok(HttpResponse::Ok().json(profile))
}
