//! Connection and idea-join requests: request records plus the
//! actionable notifications that surface them. Each request has exactly
//! one owner who may resolve it exactly once; the request write and its
//! notification write are separate records, never one transaction.

use std::sync::Arc;

use bson::oid::ObjectId;
use cofoundry_db::models::{
    ConnectionRequest, Idea, IdeaJoinRequest, NotificationType, RequestStatus, User,
};
use tracing::warn;

use crate::dao::{ConnectionRequestDao, DaoError, DaoResult, IdeaJoinRequestDao, NotificationDao};
use crate::store::RealtimeStore;

#[derive(Clone)]
pub struct ConnectionRequestService {
    requests: ConnectionRequestDao,
    notifications: NotificationDao,
}

impl ConnectionRequestService {
    pub fn new(store: Arc<dyn RealtimeStore>) -> Self {
        Self {
            requests: ConnectionRequestDao::new(store.clone()),
            notifications: NotificationDao::new(store),
        }
    }

    pub async fn create(
        &self,
        from: &User,
        to_user_id: ObjectId,
        message: Option<String>,
    ) -> DaoResult<ConnectionRequest> {
        let from_id = from.id.ok_or(DaoError::NotFound)?;
        let request = self.requests.create(from_id, to_user_id, message).await?;

        if let Err(e) = self
            .notifications
            .create(
                to_user_id,
                NotificationType::ConnectionRequest,
                "New connection request".to_string(),
                format!("{} wants to connect with you", from.display_name),
                bson::doc! {
                    "request_id": request.id,
                    "from_user_id": from_id,
                },
            )
            .await
        {
            warn!(%e, "connection request notification failed");
        }
        Ok(request)
    }

    /// The owning mutation for a connection-request response.
    pub async fn respond(
        &self,
        id: ObjectId,
        approver_id: ObjectId,
        approve: bool,
    ) -> DaoResult<RequestStatus> {
        self.requests.respond(id, approver_id, approve).await
    }
}

#[derive(Clone)]
pub struct JoinRequestService {
    requests: IdeaJoinRequestDao,
    notifications: NotificationDao,
}

impl JoinRequestService {
    pub fn new(store: Arc<dyn RealtimeStore>) -> Self {
        Self {
            requests: IdeaJoinRequestDao::new(store.clone()),
            notifications: NotificationDao::new(store),
        }
    }

    pub async fn create(
        &self,
        idea: &Idea,
        from: &User,
        role: Option<String>,
        message: Option<String>,
    ) -> DaoResult<IdeaJoinRequest> {
        let idea_id = idea.id.ok_or(DaoError::NotFound)?;
        let from_id = from.id.ok_or(DaoError::NotFound)?;
        let request = self
            .requests
            .create(idea_id, idea.founder_id, from_id, role, message)
            .await?;

        if let Err(e) = self
            .notifications
            .create(
                idea.founder_id,
                NotificationType::JoinRequest,
                "New join request".to_string(),
                format!("{} wants to join \"{}\"", from.display_name, idea.title),
                bson::doc! {
                    "request_id": request.id,
                    "idea_id": idea_id,
                    "from_user_id": from_id,
                },
            )
            .await
        {
            warn!(%e, "join request notification failed");
        }
        Ok(request)
    }

    /// The owning mutation for a join-request response. The requester
    /// hears back through their own notification feed.
    pub async fn respond(
        &self,
        id: ObjectId,
        founder_id: ObjectId,
        approve: bool,
    ) -> DaoResult<RequestStatus> {
        let status = self.requests.respond(id, founder_id, approve).await?;

        match self.requests.find_by_id(id).await {
            Ok(request) => {
                let outcome = match status {
                    RequestStatus::Approved => "was approved",
                    _ => "was declined",
                };
                if let Err(e) = self
                    .notifications
                    .create(
                        request.user_id,
                        NotificationType::JoinRequestResponse,
                        "Join request update".to_string(),
                        format!("Your request to join the team {outcome}"),
                        bson::doc! { "request_id": request.id, "idea_id": request.idea_id },
                    )
                    .await
                {
                    warn!(%e, "join response notification failed");
                }
            }
            Err(e) => warn!(%e, "resolved join request vanished before notify"),
        }
        Ok(status)
    }
}
