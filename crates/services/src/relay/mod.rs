//! Notification relay: the independent read path that surfaces
//! "needs your attention" events, plus the write-side flows a user
//! triggers from a notification (respond, mark read).

pub mod ingest;

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bson::oid::ObjectId;
use cofoundry_config::RelaySettings;
use cofoundry_db::models::{Notification, NotificationType, RequestStatus};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, warn};

use crate::dao::{DaoError, DaoResult, NotificationDao};
use crate::requests::{ConnectionRequestService, JoinRequestService};
use crate::store::{Query, RealtimeStore, Snapshot};

/// Display sections of the notification center. The taxonomy is fixed;
/// `MatchAlert` has no dedicated section and renders only under `All`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    All,
    Connections,
    Messages,
    Negotiations,
    JoinRequests,
}

impl Section {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Connections => "connections",
            Self::Messages => "messages",
            Self::Negotiations => "negotiations",
            Self::JoinRequests => "join_requests",
        }
    }

    /// The dedicated section for a type, if it has one. `MatchAlert`
    /// deliberately has none.
    pub fn home_of(notification_type: NotificationType) -> Option<Section> {
        match notification_type {
            NotificationType::ConnectionRequest => Some(Self::Connections),
            NotificationType::Message => Some(Self::Messages),
            NotificationType::NegotiationUpdate | NotificationType::NewNegotiation => {
                Some(Self::Negotiations)
            }
            NotificationType::JoinRequest | NotificationType::JoinRequestResponse => {
                Some(Self::JoinRequests)
            }
            NotificationType::MatchAlert => None,
        }
    }

    pub fn includes(self, notification_type: NotificationType) -> bool {
        match self {
            Self::All => true,
            section => Section::home_of(notification_type) == Some(section),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RelayState {
    pub notifications: Vec<Notification>,
    pub unread: u64,
    /// Set only by a subscription setup failure; cleared by `retry`.
    /// A feed that is merely slow never sets this.
    pub error: Option<String>,
}

impl RelayState {
    pub fn section(&self, section: Section) -> Vec<&Notification> {
        self.notifications
            .iter()
            .filter(|n| section.includes(n.notification_type))
            .collect()
    }
}

pub struct RespondOutcome {
    pub status: RequestStatus,
    pub retried: bool,
}

/// Runs the owning module's mutation with exactly one retry after a
/// fixed delay. Only transport failures retry; domain outcomes
/// (conflict, forbidden, missing) are final on the first attempt.
async fn mutate_with_retry<F, Fut>(delay: Duration, mut op: F) -> DaoResult<(RequestStatus, bool)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DaoResult<RequestStatus>>,
{
    match op().await {
        Ok(status) => Ok((status, false)),
        Err(DaoError::Store(e)) => {
            warn!(%e, "request mutation failed; retrying once");
            tokio::time::sleep(delay).await;
            Ok((op().await?, true))
        }
        Err(other) => Err(other),
    }
}

/// Resolves a connection request from its notification: the owning
/// mutation (with its single retry), then the response marker onto the
/// same notification record, then mark it read. Three sequential,
/// non-atomic steps.
pub async fn respond_to_connection_request(
    connections: &ConnectionRequestService,
    notifications: &NotificationDao,
    notification_id: ObjectId,
    request_id: ObjectId,
    approver_id: ObjectId,
    approve: bool,
    retry_delay: Duration,
) -> DaoResult<RespondOutcome> {
    let (status, retried) = mutate_with_retry(retry_delay, || {
        connections.respond(request_id, approver_id, approve)
    })
    .await?;
    notifications.record_response(notification_id, status).await?;
    notifications.mark_read(notification_id).await?;
    Ok(RespondOutcome { status, retried })
}

/// Join-request variant of the same three-step flow.
pub async fn respond_to_join_request(
    joins: &JoinRequestService,
    notifications: &NotificationDao,
    notification_id: ObjectId,
    request_id: ObjectId,
    founder_id: ObjectId,
    approve: bool,
    retry_delay: Duration,
) -> DaoResult<RespondOutcome> {
    let (status, retried) =
        mutate_with_retry(retry_delay, || joins.respond(request_id, founder_id, approve)).await?;
    notifications.record_response(notification_id, status).await?;
    notifications.mark_read(notification_id).await?;
    Ok(RespondOutcome { status, retried })
}

/// Live notification center for one user: the full history feed and
/// the unread-count feed, each its own subscription.
pub struct NotificationRelay {
    store: Arc<dyn RealtimeStore>,
    user_id: ObjectId,
    settings: RelaySettings,
    state_tx: Arc<watch::Sender<RelayState>>,
    state_rx: watch::Receiver<RelayState>,
    tasks: Vec<JoinHandle<()>>,
}

impl NotificationRelay {
    /// Opens the relay. A subscribe failure does not abort construction;
    /// it surfaces as a visible error state with `retry` available.
    pub async fn open(
        store: Arc<dyn RealtimeStore>,
        user_id: ObjectId,
        settings: RelaySettings,
    ) -> Self {
        let (state_tx, state_rx) = watch::channel(RelayState::default());
        let mut relay = Self {
            store,
            user_id,
            settings,
            state_tx: Arc::new(state_tx),
            state_rx,
            tasks: Vec::new(),
        };
        relay.connect().await;
        relay
    }

    async fn connect(&mut self) {
        let feed = self
            .store
            .subscribe(Query::NotificationsByUser(self.user_id))
            .await;
        let count = self
            .store
            .subscribe(Query::UnreadCountByUser(self.user_id))
            .await;

        let (mut feed, mut count) = match (feed, count) {
            (Ok(feed), Ok(count)) => (feed, count),
            (Err(e), _) | (_, Err(e)) => {
                error!(%e, "notification feed setup failed");
                self.state_tx
                    .send_modify(|s| s.error = Some(e.to_string()));
                return;
            }
        };
        self.state_tx.send_modify(|s| s.error = None);

        let received = Arc::new(AtomicBool::new(false));

        {
            let state_tx = self.state_tx.clone();
            let received = received.clone();
            self.tasks.push(tokio::spawn(async move {
                while let Some(snapshot) = feed.next().await {
                    let Snapshot::Records(docs) = snapshot else {
                        continue;
                    };
                    if !docs.is_empty() {
                        received.store(true, Ordering::SeqCst);
                    }
                    let notifications: Vec<Notification> =
                        docs.into_iter().filter_map(ingest::normalize).collect();
                    state_tx.send_modify(|s| s.notifications = notifications);
                }
            }));
        }

        {
            let state_tx = self.state_tx.clone();
            self.tasks.push(tokio::spawn(async move {
                while let Some(snapshot) = count.next().await {
                    let Snapshot::Count(unread) = snapshot else {
                        continue;
                    };
                    state_tx.send_modify(|s| s.unread = unread);
                }
            }));
        }

        // Watchdog for a feed that stays empty: log a diagnostic after
        // the bounded wait, then keep waiting. This is not an error
        // state and never becomes one.
        {
            let received = received.clone();
            let wait = Duration::from_secs(self.settings.empty_feed_warn_secs);
            let user_id = self.user_id;
            self.tasks.push(tokio::spawn(async move {
                tokio::time::sleep(wait).await;
                if !received.load(Ordering::SeqCst) {
                    warn!(
                        %user_id,
                        waited_secs = wait.as_secs(),
                        "notification feed still empty; continuing to wait"
                    );
                }
            }));
        }
    }

    /// The user-facing retry action: tears the dead feeds down and
    /// re-runs subscription setup.
    pub async fn retry(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.connect().await;
    }

    pub fn state(&self) -> watch::Receiver<RelayState> {
        self.state_rx.clone()
    }

    pub async fn mark_read(&self, notification_id: ObjectId) -> DaoResult<()> {
        NotificationDao::new(self.store.clone())
            .mark_read(notification_id)
            .await
    }

    pub async fn mark_all_read(&self) -> DaoResult<u64> {
        NotificationDao::new(self.store.clone())
            .mark_all_read(self.user_id)
            .await
    }

    pub async fn respond_to_connection(
        &self,
        notification_id: ObjectId,
        request_id: ObjectId,
        approve: bool,
    ) -> DaoResult<RespondOutcome> {
        respond_to_connection_request(
            &ConnectionRequestService::new(self.store.clone()),
            &NotificationDao::new(self.store.clone()),
            notification_id,
            request_id,
            self.user_id,
            approve,
            Duration::from_secs(self.settings.respond_retry_delay_secs),
        )
        .await
    }

    pub async fn respond_to_join(
        &self,
        notification_id: ObjectId,
        request_id: ObjectId,
        approve: bool,
    ) -> DaoResult<RespondOutcome> {
        respond_to_join_request(
            &JoinRequestService::new(self.store.clone()),
            &NotificationDao::new(self.store.clone()),
            notification_id,
            request_id,
            self.user_id,
            approve,
            Duration::from_secs(self.settings.respond_retry_delay_secs),
        )
        .await
    }

    pub fn close(self) {}
}

impl Drop for NotificationRelay {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
