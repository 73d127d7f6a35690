use super::{ApiResult, AppState, RequireUser, SessionToken};
use crate::auth::{AuthSession, SessionContext, SignUpInput, UpdateProfileInput};
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct SignUpRequest {
    email: String,
    password: String,
    #[serde(default)]
    full_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SignInRequest {
    email: String,
    password: String,
}

pub(crate) async fn sign_up_handler(
    State(state): State<AppState>,
    Json(payload): Json<SignUpRequest>,
) -> ApiResult<AuthSession> {
    let session = state.auth.sign_up(SignUpInput {
        email: payload.email,
        password: payload.password,
        full_name: payload.full_name,
    })?;
    Ok(Json(session))
}

pub(crate) async fn sign_in_handler(
    State(state): State<AppState>,
    Json(payload): Json<SignInRequest>,
) -> ApiResult<AuthSession> {
    let session = state.auth.sign_in(&payload.email, &payload.password)?;
    Ok(Json(session))
}

pub(crate) async fn sign_out_handler(
    State(state): State<AppState>,
    SessionToken(token): SessionToken,
) -> ApiResult<serde_json::Value> {
    state.auth.sign_out(&token)?;
    Ok(Json(serde_json::json!({ "signed_out": true })))
}

pub(crate) async fn me_handler(RequireUser(ctx): RequireUser) -> ApiResult<SessionContext> {
    Ok(Json(ctx))
}

pub(crate) async fn update_me_handler(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    Json(payload): Json<UpdateProfileInput>,
) -> ApiResult<SessionContext> {
    Ok(Json(state.auth.update_profile(&ctx.user_id, payload)?))
}
