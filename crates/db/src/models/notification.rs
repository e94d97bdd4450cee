use bson::{DateTime, Document, oid::ObjectId};
use serde::{Deserialize, Serialize};

/// One event requiring a user's attention. Unlike the negotiation
/// ledger, a notification is mutable after creation: responding to an
/// actionable one records the outcome into its own `data` document
/// (`response_status`, `responded_at`) instead of creating a new record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub notification_type: NotificationType,
    pub title: String,
    pub body: String,
    /// Free-form payload keyed by type: request ids, negotiation ids,
    /// response markers.
    #[serde(default)]
    pub data: Document,
    #[serde(default)]
    pub is_read: bool,
    pub timestamp: DateTime,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    ConnectionRequest,
    Message,
    NegotiationUpdate,
    NewNegotiation,
    JoinRequest,
    JoinRequestResponse,
    MatchAlert,
}

impl NotificationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConnectionRequest => "connection_request",
            Self::Message => "message",
            Self::NegotiationUpdate => "negotiation_update",
            Self::NewNegotiation => "new_negotiation",
            Self::JoinRequest => "join_request",
            Self::JoinRequestResponse => "join_request_response",
            Self::MatchAlert => "match_alert",
        }
    }
}

impl Notification {
    pub const COLLECTION: &'static str = "notifications";
}
