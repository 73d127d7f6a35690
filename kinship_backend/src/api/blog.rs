use super::{ApiResult, AppState, RequireAdmin, RequireUser};
use crate::blog::{
    CommentView, CreatePostInput, LikeStatus, PostDetails, PostSummary, UpdatePostInput,
};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct ListPostsQuery {
    category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AddCommentRequest {
    content: String,
}

pub(crate) async fn list_posts(
    State(state): State<AppState>,
    RequireUser(_ctx): RequireUser,
    Query(query): Query<ListPostsQuery>,
) -> ApiResult<Vec<PostSummary>> {
    let posts = state.blog.list_posts(query.category.as_deref())?;
    Ok(Json(posts))
}

pub(crate) async fn list_all_posts(
    State(state): State<AppState>,
    RequireAdmin(ctx): RequireAdmin,
) -> ApiResult<Vec<PostSummary>> {
    Ok(Json(state.blog.list_all_posts(&ctx)?))
}

pub(crate) async fn get_post(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    Path(post_id): Path<String>,
) -> ApiResult<PostDetails> {
    Ok(Json(state.blog.get_post(&post_id, Some(&ctx))?))
}

pub(crate) async fn create_post(
    State(state): State<AppState>,
    RequireAdmin(ctx): RequireAdmin,
    Json(payload): Json<CreatePostInput>,
) -> ApiResult<PostDetails> {
    Ok(Json(state.blog.create_post(payload, &ctx)?))
}

pub(crate) async fn update_post(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    Path(post_id): Path<String>,
    Json(payload): Json<UpdatePostInput>,
) -> ApiResult<PostDetails> {
    Ok(Json(state.blog.update_post(&post_id, payload, &ctx)?))
}

pub(crate) async fn delete_post(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    Path(post_id): Path<String>,
) -> ApiResult<serde_json::Value> {
    state.blog.delete_post(&post_id, &ctx)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub(crate) async fn list_comments(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    Path(post_id): Path<String>,
) -> ApiResult<Vec<CommentView>> {
    let details = state.blog.get_post(&post_id, Some(&ctx))?;
    Ok(Json(details.comments))
}

pub(crate) async fn add_comment(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    Path(post_id): Path<String>,
    Json(payload): Json<AddCommentRequest>,
) -> ApiResult<CommentView> {
    Ok(Json(state.blog.add_comment(&post_id, &payload.content, &ctx)?))
}

pub(crate) async fn delete_comment(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    Path(comment_id): Path<String>,
) -> ApiResult<serde_json::Value> {
    state.blog.delete_comment(&comment_id, &ctx)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

pub(crate) async fn like_post(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    Path(post_id): Path<String>,
) -> ApiResult<LikeStatus> {
    Ok(Json(state.blog.set_like(&post_id, &ctx, true)?))
}

pub(crate) async fn unlike_post(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    Path(post_id): Path<String>,
) -> ApiResult<LikeStatus> {
    Ok(Json(state.blog.set_like(&post_id, &ctx, false)?))
}
