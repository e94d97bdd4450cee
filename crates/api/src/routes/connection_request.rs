use axum::{
    Json,
    extract::{Path, State},
};
use bson::oid::ObjectId;
use serde::Deserialize;
use validator::Validate;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateConnectionRequest {
    pub to_user_id: String,
    #[validate(length(max = 500))]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub approve: bool,
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateConnectionRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let to_user_id = ObjectId::parse_str(&body.to_user_id)
        .map_err(|_| ApiError::BadRequest("Invalid to_user_id".to_string()))?;
    if to_user_id == auth.user_id {
        return Err(ApiError::BadRequest(
            "Cannot send a connection request to yourself".to_string(),
        ));
    }

    let from = state.users.find_by_id(auth.user_id).await?;
    // Target must exist before anything is written.
    state.users.find_by_id(to_user_id).await?;

    let request = state
        .connections
        .create(&from, to_user_id, body.message)
        .await?;

    Ok(Json(serde_json::json!({
        "id": request.id.map(|id| id.to_hex()),
        "status": request.status.as_str(),
    })))
}

/// Direct response path (from the requests screen rather than a
/// notification). One pending→terminal transition, target user only.
pub async fn respond(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(request_id): Path<String>,
    Json(body): Json<RespondRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = ObjectId::parse_str(&request_id)
        .map_err(|_| ApiError::BadRequest("Invalid request_id".to_string()))?;
    let status = state.connections.respond(id, auth.user_id, body.approve).await?;
    Ok(Json(serde_json::json!({ "status": status.as_str() })))
}
