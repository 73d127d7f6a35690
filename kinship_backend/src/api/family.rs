use super::{ApiResult, AppState, RequireAdmin, RequireUser};
use crate::database::models::{FamilyBranchRecord, FamilyMemberRecord, FamilyNewsRecord};
use crate::family::{BranchView, CreateBranchInput, CreateMemberInput, CreateNewsInput};
use crate::media::MediaView;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub(crate) struct NewsQuery {
    branch_id: Option<String>,
}

/// Everything the branch page renders in one response.
#[derive(Debug, Serialize)]
pub(crate) struct BranchDetailsResponse {
    #[serde(flatten)]
    branch: BranchView,
    media: Vec<MediaView>,
    news: Vec<FamilyNewsRecord>,
}

pub(crate) async fn list_branches(
    State(state): State<AppState>,
    RequireUser(_ctx): RequireUser,
) -> ApiResult<Vec<BranchView>> {
    Ok(Json(state.family.list_branches()?))
}

pub(crate) async fn get_branch(
    State(state): State<AppState>,
    RequireUser(_ctx): RequireUser,
    Path(branch_id): Path<String>,
) -> ApiResult<BranchDetailsResponse> {
    let branch = state.family.get_branch(&branch_id)?;
    let media = state.media.list_for_branch(&branch_id)?;
    let news = state.family.list_news(Some(&branch_id))?;
    Ok(Json(BranchDetailsResponse {
        branch,
        media,
        news,
    }))
}

pub(crate) async fn create_branch(
    State(state): State<AppState>,
    RequireAdmin(ctx): RequireAdmin,
    Json(payload): Json<CreateBranchInput>,
) -> ApiResult<FamilyBranchRecord> {
    Ok(Json(state.family.create_branch(payload, &ctx)?))
}

pub(crate) async fn delete_branch(
    State(state): State<AppState>,
    RequireAdmin(ctx): RequireAdmin,
    Path(branch_id): Path<String>,
) -> ApiResult<serde_json::Value> {
    state.family.delete_branch(&branch_id, &ctx)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub(crate) async fn list_members(
    State(state): State<AppState>,
    RequireUser(_ctx): RequireUser,
) -> ApiResult<Vec<FamilyMemberRecord>> {
    Ok(Json(state.family.list_members()?))
}

pub(crate) async fn get_member(
    State(state): State<AppState>,
    RequireUser(_ctx): RequireUser,
    Path(member_id): Path<String>,
) -> ApiResult<FamilyMemberRecord> {
    Ok(Json(state.family.get_member(&member_id)?))
}

pub(crate) async fn create_member(
    State(state): State<AppState>,
    RequireAdmin(ctx): RequireAdmin,
    Json(payload): Json<CreateMemberInput>,
) -> ApiResult<FamilyMemberRecord> {
    Ok(Json(state.family.create_member(payload, &ctx)?))
}

pub(crate) async fn delete_member(
    State(state): State<AppState>,
    RequireAdmin(ctx): RequireAdmin,
    Path(member_id): Path<String>,
) -> ApiResult<serde_json::Value> {
    state.family.delete_member(&member_id, &ctx)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub(crate) async fn list_news(
    State(state): State<AppState>,
    RequireUser(_ctx): RequireUser,
    Query(query): Query<NewsQuery>,
) -> ApiResult<Vec<FamilyNewsRecord>> {
    Ok(Json(state.family.list_news(query.branch_id.as_deref())?))
}

pub(crate) async fn create_news(
    State(state): State<AppState>,
    RequireAdmin(ctx): RequireAdmin,
    Json(payload): Json<CreateNewsInput>,
) -> ApiResult<FamilyNewsRecord> {
    Ok(Json(state.family.create_news(payload, &ctx)?))
}

pub(crate) async fn delete_news(
    State(state): State<AppState>,
    RequireAdmin(ctx): RequireAdmin,
    Path(news_id): Path<String>,
) -> ApiResult<serde_json::Value> {
    state.family.delete_news(&news_id, &ctx)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
