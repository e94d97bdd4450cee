use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

use super::connection_request::RequestStatus;

/// A request to join an idea's founding team. Owned by the idea's
/// founder, who may resolve it exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdeaJoinRequest {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub idea_id: ObjectId,
    pub founder_id: ObjectId,
    pub user_id: ObjectId,
    pub role: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub status: RequestStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub responded_at: Option<DateTime>,
}

impl IdeaJoinRequest {
    pub const COLLECTION: &'static str = "idea_join_requests";
}
