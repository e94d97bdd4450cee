use std::sync::Arc;

use bson::{DateTime, oid::ObjectId};
use cofoundry_db::models::{ConnectionRequest, RequestStatus};

use super::base::{DaoError, DaoResult, from_document, to_document};
use crate::store::RealtimeStore;

#[derive(Clone)]
pub struct ConnectionRequestDao {
    store: Arc<dyn RealtimeStore>,
}

impl ConnectionRequestDao {
    pub fn new(store: Arc<dyn RealtimeStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        from_user_id: ObjectId,
        to_user_id: ObjectId,
        message: Option<String>,
    ) -> DaoResult<ConnectionRequest> {
        let now = DateTime::now();
        let request = ConnectionRequest {
            id: None,
            from_user_id,
            to_user_id,
            message,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
            responded_at: None,
        };
        let id = self
            .store
            .insert(ConnectionRequest::COLLECTION, to_document(&request)?)
            .await?;
        self.find_by_id(id).await
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<ConnectionRequest> {
        let doc = self
            .store
            .get_one(ConnectionRequest::COLLECTION, id)
            .await?
            .ok_or(DaoError::NotFound)?;
        from_document(doc)
    }

    /// Single pending→terminal transition, owned by the target user.
    /// The conditional write is the guard: zero matches means the
    /// request was missing, already resolved, or not ours to resolve.
    pub async fn respond(
        &self,
        id: ObjectId,
        approver_id: ObjectId,
        approve: bool,
    ) -> DaoResult<RequestStatus> {
        let status = if approve {
            RequestStatus::Approved
        } else {
            RequestStatus::Rejected
        };

        let now = DateTime::now();
        let changed = self
            .store
            .write_where(
                ConnectionRequest::COLLECTION,
                bson::doc! { "_id": id, "to_user_id": approver_id, "status": "pending" },
                bson::doc! {
                    "status": status.as_str(),
                    "responded_at": now,
                    "updated_at": now,
                },
            )
            .await?;

        if changed > 0 {
            return Ok(status);
        }

        let existing = self.find_by_id(id).await?;
        if existing.to_user_id != approver_id {
            Err(DaoError::Forbidden(
                "Only the request's target may respond".to_string(),
            ))
        } else {
            Err(DaoError::Conflict("Request already resolved".to_string()))
        }
    }
}
