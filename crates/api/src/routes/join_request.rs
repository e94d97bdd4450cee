use axum::{
    Json,
    extract::{Path, State},
};
use bson::oid::ObjectId;
use serde::Deserialize;
use validator::Validate;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateJoinRequest {
    pub idea_id: String,
    #[validate(length(max = 100))]
    pub role: Option<String>,
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
    Json(body): Json<CreateJoinRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    body.validate()
        .map_err(|e| ApiError::Validation(e.to_string()))?;

    let idea_id = ObjectId::parse_str(&body.idea_id)
        .map_err(|_| ApiError::BadRequest("Invalid idea_id".to_string()))?;
    let idea = state.ideas.find_by_id(idea_id).await?;
    if idea.founder_id == auth.user_id {
        return Err(ApiError::BadRequest(
            "Cannot request to join your own idea".to_string(),
        ));
    }

    let from = state.users.find_by_id(auth.user_id).await?;
    let request = state
        .joins
        .create(&idea, &from, body.role, body.message)
        .await?;

    Ok(Json(serde_json::json!({
        "id": request.id.map(|id| id.to_hex()),
        "status": request.status.as_str(),
    })))
}

/// Direct response path. One pending→terminal transition, idea founder
/// only; the requester is notified through their own feed.
pub async fn respond(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(request_id): Path<String>,
    Json(body): Json<RespondRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = ObjectId::parse_str(&request_id)
        .map_err(|_| ApiError::BadRequest("Invalid request_id".to_string()))?;
    let status = state.joins.respond(id, auth.user_id, body.approve).await?;
    Ok(Json(serde_json::json!({ "status": status.as_str() })))
}
