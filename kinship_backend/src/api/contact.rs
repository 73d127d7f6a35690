use super::{ApiResult, AppState, RequireAdmin, RequireUser};
use crate::contact::ContactInput;
use crate::database::models::ContactMessageRecord;
use axum::extract::State;
use axum::Json;

pub(crate) async fn submit_message(
    State(state): State<AppState>,
    RequireUser(_ctx): RequireUser,
    Json(payload): Json<ContactInput>,
) -> ApiResult<ContactMessageRecord> {
    Ok(Json(state.contact.submit(payload)?))
}

pub(crate) async fn list_messages(
    State(state): State<AppState>,
    RequireAdmin(ctx): RequireAdmin,
) -> ApiResult<Vec<ContactMessageRecord>> {
    Ok(Json(state.contact.list_messages(&ctx)?))
}
