use super::{ApiResult, AppState, RequireAdmin, RequireUser};
use crate::polls::{CreatePollInput, PollView};
use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct VoteRequest {
    option_index: i64,
}

pub(crate) async fn list_polls(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
) -> ApiResult<Vec<PollView>> {
    Ok(Json(state.polls.list_polls(Some(&ctx))?))
}

pub(crate) async fn get_poll(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    Path(poll_id): Path<String>,
) -> ApiResult<PollView> {
    Ok(Json(state.polls.get_poll(&poll_id, Some(&ctx))?))
}

pub(crate) async fn create_poll(
    State(state): State<AppState>,
    RequireAdmin(ctx): RequireAdmin,
    Json(payload): Json<CreatePollInput>,
) -> ApiResult<PollView> {
    Ok(Json(state.polls.create_poll(payload, &ctx)?))
}

pub(crate) async fn vote(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    Path(poll_id): Path<String>,
    Json(payload): Json<VoteRequest>,
) -> ApiResult<PollView> {
    Ok(Json(state.polls.vote(&poll_id, payload.option_index, &ctx)?))
}
