use std::sync::Arc;

use bson::{DateTime, Document, oid::ObjectId};
use cofoundry_db::models::{Notification, NotificationType, RequestStatus};

use super::base::{DaoResult, PaginatedResult, PaginationParams, paginate, to_document};
use crate::relay::ingest;
use crate::store::{Query, RealtimeStore};

#[derive(Clone)]
pub struct NotificationDao {
    store: Arc<dyn RealtimeStore>,
}

impl NotificationDao {
    pub fn new(store: Arc<dyn RealtimeStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        user_id: ObjectId,
        notification_type: NotificationType,
        title: String,
        body: String,
        data: Document,
    ) -> DaoResult<ObjectId> {
        let now = DateTime::now();
        let notification = Notification {
            id: None,
            user_id,
            notification_type,
            title,
            body,
            data,
            is_read: false,
            timestamp: now,
            created_at: now,
        };
        Ok(self
            .store
            .insert(Notification::COLLECTION, to_document(&notification)?)
            .await?)
    }

    /// Full history for a user, newest first, normalized at ingestion:
    /// repairable records are repaired, unidentifiable ones dropped.
    pub async fn find_for_user(
        &self,
        user_id: ObjectId,
        params: &PaginationParams,
    ) -> DaoResult<PaginatedResult<Notification>> {
        let docs = self
            .store
            .find(&Query::NotificationsByUser(user_id))
            .await?;
        let items: Vec<Notification> = docs.into_iter().filter_map(ingest::normalize).collect();
        Ok(paginate(items, params))
    }

    pub async fn unread_count(&self, user_id: ObjectId) -> DaoResult<u64> {
        let docs = self
            .store
            .find(&Query::NotificationsByUser(user_id))
            .await?;
        Ok(docs
            .iter()
            .filter(|d| !d.get_bool("is_read").unwrap_or(false))
            .count() as u64)
    }

    /// Idempotent: marking an already-read notification is a no-op.
    pub async fn mark_read(&self, id: ObjectId) -> DaoResult<()> {
        self.store
            .write(
                Notification::COLLECTION,
                id,
                bson::doc! { "is_read": true },
            )
            .await?;
        Ok(())
    }

    /// One bulk write for everything unread. No optimistic mirror; the
    /// live subscription reflects the change.
    pub async fn mark_all_read(&self, user_id: ObjectId) -> DaoResult<u64> {
        Ok(self
            .store
            .write_where(
                Notification::COLLECTION,
                bson::doc! { "user_id": user_id, "is_read": false },
                bson::doc! { "is_read": true },
            )
            .await?)
    }

    /// Records the outcome of an actionable notification into the same
    /// record's data payload.
    pub async fn record_response(&self, id: ObjectId, status: RequestStatus) -> DaoResult<()> {
        self.store
            .write(
                Notification::COLLECTION,
                id,
                bson::doc! {
                    "data.response_status": status.as_str(),
                    "data.responded_at": DateTime::now(),
                },
            )
            .await?;
        Ok(())
    }
}
