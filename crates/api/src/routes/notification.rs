use std::time::Duration;

use axum::{
    Json,
    extract::{Path, Query, State},
};
use bson::oid::ObjectId;
use cofoundry_db::models::Notification;
use cofoundry_services::dao::PaginationParams;
use cofoundry_services::relay::{
    Section, ingest, respond_to_connection_request, respond_to_join_request,
};
use serde::{Deserialize, Serialize};

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub section: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub request_type: String,
    pub request_id: String,
    pub approve: bool,
}

#[derive(Debug, Serialize)]
pub struct NotificationResponse {
    pub id: String,
    pub notification_type: String,
    pub title: String,
    pub body: String,
    pub data: serde_json::Value,
    pub is_read: bool,
    /// Dedicated display section; absent for types that render only
    /// under "all".
    pub section: Option<String>,
    pub timestamp: String,
    pub created_at: String,
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<ListParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let section = parse_section(params.section.as_deref())?;
    let mut pagination = PaginationParams::default();
    if let Some(page) = params.page {
        pagination.page = page;
    }
    if let Some(per_page) = params.per_page {
        pagination.per_page = per_page;
    }
    let result = state
        .notifications
        .find_for_user(auth.user_id, &pagination)
        .await?;

    let items: Vec<NotificationResponse> = result
        .items
        .into_iter()
        .filter(|n| section.includes(n.notification_type))
        .map(to_response)
        .collect();

    Ok(Json(serde_json::json!({
        "items": items,
        "total": result.total,
        "page": result.page,
        "per_page": result.per_page,
        "total_pages": result.total_pages,
    })))
}

pub async fn unread_count(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let count = state.notifications.unread_count(auth.user_id).await?;
    Ok(Json(serde_json::json!({ "count": count })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(notification_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let id = load_owned(&state, &auth, &notification_id).await?.0;
    state.notifications.mark_read(id).await?;
    Ok(Json(serde_json::json!({ "read": true })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<serde_json::Value>, ApiError> {
    let updated = state.notifications.mark_all_read(auth.user_id).await?;
    Ok(Json(serde_json::json!({ "updated": updated })))
}

/// Resolves the request behind an actionable notification: the owning
/// mutation (one automatic retry on a store failure), the response
/// marker onto this same notification, then mark it read.
pub async fn respond(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(notification_id): Path<String>,
    Json(body): Json<RespondRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let (notification_id, _) = load_owned(&state, &auth, &notification_id).await?;
    let request_id = ObjectId::parse_str(&body.request_id)
        .map_err(|_| ApiError::BadRequest("Invalid request_id".to_string()))?;
    let retry_delay = Duration::from_secs(state.settings.relay.respond_retry_delay_secs);

    let outcome = match body.request_type.as_str() {
        "connection" => {
            respond_to_connection_request(
                &state.connections,
                &state.notifications,
                notification_id,
                request_id,
                auth.user_id,
                body.approve,
                retry_delay,
            )
            .await?
        }
        "join" => {
            respond_to_join_request(
                &state.joins,
                &state.notifications,
                notification_id,
                request_id,
                auth.user_id,
                body.approve,
                retry_delay,
            )
            .await?
        }
        _ => return Err(ApiError::BadRequest("Invalid request_type".to_string())),
    };

    Ok(Json(serde_json::json!({
        "status": outcome.status.as_str(),
        "retried": outcome.retried,
    })))
}

fn parse_section(section: Option<&str>) -> Result<Section, ApiError> {
    match section {
        None | Some("all") => Ok(Section::All),
        Some("connections") => Ok(Section::Connections),
        Some("messages") => Ok(Section::Messages),
        Some("negotiations") => Ok(Section::Negotiations),
        Some("join_requests") => Ok(Section::JoinRequests),
        Some(_) => Err(ApiError::BadRequest("Invalid section".to_string())),
    }
}

async fn load_owned(
    state: &AppState,
    auth: &AuthUser,
    notification_id: &str,
) -> Result<(ObjectId, Notification), ApiError> {
    let id = ObjectId::parse_str(notification_id)
        .map_err(|_| ApiError::BadRequest("Invalid notification_id".to_string()))?;
    let doc = state
        .store
        .get_one(Notification::COLLECTION, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Notification not found".to_string()))?;
    let notification = ingest::normalize(doc)
        .ok_or_else(|| ApiError::NotFound("Notification not found".to_string()))?;
    if notification.user_id != auth.user_id {
        return Err(ApiError::Forbidden("Not your notification".to_string()));
    }
    Ok((id, notification))
}

fn to_response(n: Notification) -> NotificationResponse {
    NotificationResponse {
        id: n.id.map(|id| id.to_hex()).unwrap_or_default(),
        notification_type: n.notification_type.as_str().to_string(),
        title: n.title,
        body: n.body,
        data: serde_json::to_value(&n.data).unwrap_or(serde_json::Value::Null),
        is_read: n.is_read,
        section: Section::home_of(n.notification_type).map(|s| s.as_str().to_string()),
        timestamp: n.timestamp.try_to_rfc3339_string().unwrap_or_default(),
        created_at: n.created_at.try_to_rfc3339_string().unwrap_or_default(),
    }
}
