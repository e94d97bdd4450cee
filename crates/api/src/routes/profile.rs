use axum::{
    Json,
    extract::{Path, State},
};
use bson::oid::ObjectId;
use serde::Serialize;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub avatar: Option<String>,
    pub headline: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IdeaResponse {
    pub id: String,
    pub founder_id: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub target_investment: Option<f64>,
    pub equity_offered: Option<f64>,
    pub status: String,
    pub created_at: String,
}

/// Point lookup backing profile cards.
pub async fn get_user(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(user_id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = ObjectId::parse_str(&user_id)
        .map_err(|_| ApiError::BadRequest("Invalid user_id".to_string()))?;
    let user = state.users.find_by_id(id).await?;
    Ok(Json(UserResponse {
        id: user.id.map(|id| id.to_hex()).unwrap_or_default(),
        username: user.username,
        display_name: user.display_name,
        avatar: user.avatar,
        headline: user.headline,
    }))
}

/// Point lookup backing idea cards and negotiation seeding.
pub async fn get_idea(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(idea_id): Path<String>,
) -> Result<Json<IdeaResponse>, ApiError> {
    let id = ObjectId::parse_str(&idea_id)
        .map_err(|_| ApiError::BadRequest("Invalid idea_id".to_string()))?;
    let idea = state.ideas.find_by_id(id).await?;
    Ok(Json(IdeaResponse {
        id: idea.id.map(|id| id.to_hex()).unwrap_or_default(),
        founder_id: idea.founder_id.to_hex(),
        title: idea.title,
        description: idea.description,
        tags: idea.tags,
        target_investment: idea
            .investment_details
            .as_ref()
            .map(|d| d.target_investment),
        equity_offered: idea.investment_details.as_ref().map(|d| d.equity_offered),
        status: format!("{:?}", idea.status).to_lowercase(),
        created_at: idea.created_at.try_to_rfc3339_string().unwrap_or_default(),
    }))
}
