use super::{ApiResult, AppState, RequireAdmin, RequireUser};
use crate::database::models::EventRecord;
use crate::events::CreateEventInput;
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub(crate) struct ListEventsQuery {
    #[serde(default)]
    upcoming: bool,
}

pub(crate) async fn list_events(
    State(state): State<AppState>,
    RequireUser(_ctx): RequireUser,
    Query(query): Query<ListEventsQuery>,
) -> ApiResult<Vec<EventRecord>> {
    let events = if query.upcoming {
        state.events.list_upcoming()?
    } else {
        state.events.list_events()?
    };
    Ok(Json(events))
}

pub(crate) async fn get_event(
    State(state): State<AppState>,
    RequireUser(_ctx): RequireUser,
    Path(event_id): Path<String>,
) -> ApiResult<EventRecord> {
    Ok(Json(state.events.get_event(&event_id)?))
}

pub(crate) async fn create_event(
    State(state): State<AppState>,
    RequireAdmin(ctx): RequireAdmin,
    Json(payload): Json<CreateEventInput>,
) -> ApiResult<EventRecord> {
    Ok(Json(state.events.create_event(payload, &ctx)?))
}

pub(crate) async fn delete_event(
    State(state): State<AppState>,
    RequireAdmin(ctx): RequireAdmin,
    Path(event_id): Path<String>,
) -> ApiResult<serde_json::Value> {
    state.events.delete_event(&event_id, &ctx)?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}
