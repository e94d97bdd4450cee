use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// A request from one user to connect with another. The target user is
/// the only party who may resolve it, exactly once, from `pending` to a
/// terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionRequest {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub from_user_id: ObjectId,
    pub to_user_id: ObjectId,
    pub message: Option<String>,
    #[serde(default)]
    pub status: RequestStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    pub responded_at: Option<DateTime>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl ConnectionRequest {
    pub const COLLECTION: &'static str = "connection_requests";
}
