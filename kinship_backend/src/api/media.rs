use super::{ApiError, ApiResult, AppState, RequireAdmin, RequireUser};
use crate::media::{MediaView, SaveMediaInput};
use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::Response;
use axum::Json;
use serde::Deserialize;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

#[derive(Debug, Deserialize)]
pub(crate) struct ListMediaQuery {
    media_type: Option<String>,
}

pub(crate) async fn list_media(
    State(state): State<AppState>,
    RequireUser(_ctx): RequireUser,
    Query(query): Query<ListMediaQuery>,
) -> ApiResult<Vec<MediaView>> {
    Ok(Json(state.media.list_media(query.media_type.as_deref())?))
}

pub(crate) async fn upload_media(
    State(state): State<AppState>,
    RequireAdmin(ctx): RequireAdmin,
    mut multipart: Multipart,
) -> ApiResult<MediaView> {
    let mut title = None;
    let mut description = None;
    let mut media_type = None;
    let mut branch_id = None;
    let mut member_id = None;
    let mut original_name = None;
    let mut mime = None;
    let mut data = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(format!("malformed multipart body: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => title = Some(read_text(field).await?),
            "description" => description = Some(read_text(field).await?),
            "media_type" => media_type = Some(read_text(field).await?),
            "branch_id" => branch_id = Some(read_text(field).await?),
            "member_id" => member_id = Some(read_text(field).await?),
            "file" => {
                original_name = field.file_name().map(str::to_string);
                mime = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(|err| {
                    ApiError::BadRequest(format!("failed to read file field: {err}"))
                })?;
                data = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    let title = title.ok_or_else(|| ApiError::BadRequest("title field is required".into()))?;
    let media_type =
        media_type.ok_or_else(|| ApiError::BadRequest("media_type field is required".into()))?;
    let data = data.ok_or_else(|| ApiError::BadRequest("file field is required".into()))?;

    if let Some(limit) = state.config.file.max_upload_bytes {
        if data.len() as u64 > limit {
            return Err(ApiError::BadRequest(format!(
                "file exceeds the {limit} byte upload limit"
            )));
        }
    }

    let view = state
        .media
        .save_media(
            SaveMediaInput {
                title,
                description,
                media_type,
                branch_id: branch_id.filter(|id| !id.is_empty()),
                member_id: member_id.filter(|id| !id.is_empty()),
                original_name,
                mime,
                data,
            },
            &ctx,
        )
        .await?;
    Ok(Json(view))
}

pub(crate) async fn download_media(
    State(state): State<AppState>,
    RequireUser(_ctx): RequireUser,
    Path(media_id): Path<String>,
) -> Result<Response, ApiError> {
    let Some(download) = state.media.prepare_download(&media_id).await? else {
        return Err(ApiError::NotFound("media not found".into()));
    };
    let file = File::open(&download.absolute_path)
        .await
        .map_err(|err| ApiError::Internal(err.into()))?;
    let stream = ReaderStream::new(file);
    let response = Response::builder()
        .header(header::CONTENT_TYPE, download.mime)
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", download.metadata.id),
        )
        .body(Body::from_stream(stream))
        .map_err(|err| ApiError::Internal(err.into()))?;
    Ok(response)
}

pub(crate) async fn delete_media(
    State(state): State<AppState>,
    RequireUser(ctx): RequireUser,
    Path(media_id): Path<String>,
) -> ApiResult<serde_json::Value> {
    state.media.delete_media(&media_id, &ctx).await?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ApiError> {
    field
        .text()
        .await
        .map_err(|err| ApiError::BadRequest(format!("malformed multipart field: {err}")))
}
