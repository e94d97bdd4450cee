use std::sync::Arc;

use bson::{DateTime, oid::ObjectId};
use cofoundry_db::models::{IdeaJoinRequest, RequestStatus};

use super::base::{DaoError, DaoResult, from_document, to_document};
use crate::store::RealtimeStore;

#[derive(Clone)]
pub struct IdeaJoinRequestDao {
    store: Arc<dyn RealtimeStore>,
}

impl IdeaJoinRequestDao {
    pub fn new(store: Arc<dyn RealtimeStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        idea_id: ObjectId,
        founder_id: ObjectId,
        user_id: ObjectId,
        role: Option<String>,
        message: Option<String>,
    ) -> DaoResult<IdeaJoinRequest> {
        let now = DateTime::now();
        let request = IdeaJoinRequest {
            id: None,
            idea_id,
            founder_id,
            user_id,
            role,
            message,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
            responded_at: None,
        };
        let id = self
            .store
            .insert(IdeaJoinRequest::COLLECTION, to_document(&request)?)
            .await?;
        self.find_by_id(id).await
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<IdeaJoinRequest> {
        let doc = self
            .store
            .get_one(IdeaJoinRequest::COLLECTION, id)
            .await?
            .ok_or(DaoError::NotFound)?;
        from_document(doc)
    }

    /// Single pending→terminal transition, owned by the idea's founder.
    pub async fn respond(
        &self,
        id: ObjectId,
        founder_id: ObjectId,
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
                IdeaJoinRequest::COLLECTION,
                bson::doc! { "_id": id, "founder_id": founder_id, "status": "pending" },
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
        if existing.founder_id != founder_id {
            Err(DaoError::Forbidden(
                "Only the idea's founder may respond".to_string(),
            ))
        } else {
            Err(DaoError::Conflict("Request already resolved".to_string()))
        }
    }
}
