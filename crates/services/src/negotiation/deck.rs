//! Single-negotiation controller. Holds the last authoritative
//! snapshot plus the viewer's optimistic, not-yet-confirmed mutations,
//! and publishes the merged view over a watch channel.
//!
//! Snapshot discipline: every delivered snapshot replaces local derived
//! state wholesale. Optimistic entries are confirmed (and dropped from
//! the pending set) by content equality against the snapshot, so a
//! write echoed back by the store never duplicates in the merged view.

use std::sync::Arc;

use bson::{DateTime, oid::ObjectId};
use cofoundry_db::models::{Negotiation, NegotiationStatus, NotificationType, Offer, Party};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use super::machine::{self, Phase};
use crate::dao::NotificationDao;
use crate::store::{Query, RealtimeStore, Snapshot, StoreError};

#[derive(Debug, Error)]
pub enum DeckError {
    #[error("Negotiation has not been saved yet")]
    Unsaved,
    #[error("Not a participant in this negotiation")]
    NotParticipant,
    #[error("Not your turn")]
    NotYourTurn,
    #[error("Negotiation is awaiting founder approval")]
    AwaitingApproval,
    #[error("Negotiation already resolved")]
    AlreadyResolved,
    #[error("Only the founder may resolve a pending negotiation")]
    FounderOnly,
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("BSON serialization error: {0}")]
    Bson(#[from] bson::ser::Error),
}

#[derive(Debug, Clone, PartialEq)]
enum LocalChange {
    Offer(Offer),
    Status(NegotiationStatus),
}

#[derive(Debug, Clone)]
struct PendingChange {
    change: LocalChange,
    /// Set when the write-through was rejected; the optimistic state
    /// stands unreconciled until a manual retry or a snapshot.
    failed: bool,
}

/// The merged view handed to consumers on every change.
#[derive(Debug, Clone, Serialize)]
pub struct DeckState {
    pub negotiation: Negotiation,
    pub phase: Phase,
    pub role: Party,
    pub my_turn: bool,
    /// Local mutations not yet confirmed by a snapshot.
    pub unsynced: usize,
    /// Subset of `unsynced` whose write was rejected.
    pub failed: usize,
}

struct DeckInner {
    snapshot: Negotiation,
    pending: Vec<PendingChange>,
}

impl DeckInner {
    fn merged(&self) -> Negotiation {
        let mut view = self.snapshot.clone();
        for p in &self.pending {
            match &p.change {
                LocalChange::Offer(offer) => view.offers.push(offer.clone()),
                LocalChange::Status(status) => view.status = *status,
            }
        }
        view
    }

    fn reconcile(&mut self) {
        let snapshot = &self.snapshot;
        self.pending.retain(|p| match &p.change {
            LocalChange::Offer(offer) => !snapshot.offers.contains(offer),
            LocalChange::Status(status) => snapshot.status != *status,
        });
    }

    fn state(&self, role: Party) -> DeckState {
        let negotiation = self.merged();
        DeckState {
            phase: machine::phase(negotiation.status),
            my_turn: machine::is_my_turn(&negotiation, role),
            role,
            unsynced: self.pending.len(),
            failed: self.pending.iter().filter(|p| p.failed).count(),
            negotiation,
        }
    }
}

pub struct NegotiationDeck {
    store: Arc<dyn RealtimeStore>,
    notifications: NotificationDao,
    negotiation_id: ObjectId,
    role: Party,
    inner: Arc<Mutex<DeckInner>>,
    state_tx: Arc<watch::Sender<DeckState>>,
    state_rx: watch::Receiver<DeckState>,
    task: JoinHandle<()>,
}

impl NegotiationDeck {
    /// Opens a deck over a selected negotiation snapshot. Subscribes to
    /// the single record (independent of any list subscription), then
    /// performs the ledger bootstrap when the ledger is still empty and
    /// the idea carried an ask.
    pub async fn open(
        store: Arc<dyn RealtimeStore>,
        user_id: ObjectId,
        negotiation: Negotiation,
    ) -> Result<Self, DeckError> {
        let negotiation_id = negotiation.id.ok_or(DeckError::Unsaved)?;
        let role = machine::role_of(&negotiation, user_id).ok_or(DeckError::NotParticipant)?;
        let notifications = NotificationDao::new(store.clone());

        // Subscribe before any bootstrap write so the confirming
        // snapshot cannot be missed.
        let mut sub = store
            .subscribe(Query::NegotiationById(negotiation_id))
            .await?;

        let inner = Arc::new(Mutex::new(DeckInner {
            snapshot: negotiation.clone(),
            pending: Vec::new(),
        }));
        let (state_tx, state_rx) = watch::channel(inner.lock().state(role));
        let state_tx = Arc::new(state_tx);

        let task = {
            let inner = inner.clone();
            let state_tx = state_tx.clone();
            tokio::spawn(async move {
                while let Some(snapshot) = sub.next().await {
                    let Snapshot::Records(docs) = snapshot else {
                        continue;
                    };
                    let Some(doc) = docs.into_iter().next() else {
                        continue;
                    };
                    let fresh: Negotiation = match bson::from_document(doc) {
                        Ok(n) => n,
                        Err(e) => {
                            warn!(%e, "skipping malformed negotiation snapshot");
                            continue;
                        }
                    };
                    let state = {
                        let mut guard = inner.lock();
                        guard.snapshot = fresh;
                        guard.reconcile();
                        guard.state(role)
                    };
                    state_tx.send_replace(state);
                }
            })
        };

        let deck = Self {
            store,
            notifications,
            negotiation_id,
            role,
            inner,
            state_tx,
            state_rx,
            task,
        };

        if let Some(opening) = machine::bootstrap_offer(&negotiation) {
            deck.bootstrap(opening).await;
        }

        Ok(deck)
    }

    /// Synthesizes the founder opening offer exactly once. Applied
    /// optimistically for every viewer; the conditional append lets one
    /// writer win and everyone converge on the same content-equal entry.
    async fn bootstrap(&self, opening: Offer) {
        {
            let mut guard = self.inner.lock();
            guard.pending.push(PendingChange {
                change: LocalChange::Offer(opening.clone()),
                failed: false,
            });
        }
        self.publish();

        let value = match bson::to_bson(&opening) {
            Ok(v) => v,
            Err(e) => {
                warn!(%e, "opening offer does not serialize");
                return;
            }
        };
        match self
            .store
            .append_if_empty(Negotiation::COLLECTION, self.negotiation_id, "offers", value)
            .await
        {
            Ok(_) => {} // false just means another viewer won the race
            Err(e) => {
                warn!(%e, "opening offer write failed; left unsynced");
                self.mark_failed(&LocalChange::Offer(opening));
            }
        }
    }

    pub fn state(&self) -> watch::Receiver<DeckState> {
        self.state_rx.clone()
    }

    pub fn role(&self) -> Party {
        self.role
    }

    /// Submits a counter-offer. Returns `Ok(false)` without touching
    /// the ledger when the amounts fail the validation gate; that path
    /// is deliberately silent.
    pub async fn submit_offer(&self, investment: f64, equity: f64) -> Result<bool, DeckError> {
        let offer = {
            let mut guard = self.inner.lock();
            let view = guard.merged();
            self.ensure_ongoing(&view)?;
            if !machine::is_my_turn(&view, self.role) {
                return Err(DeckError::NotYourTurn);
            }
            if !machine::offer_in_bounds(investment, equity) {
                return Ok(false);
            }
            let offer = Offer {
                investment,
                equity,
                by: self.role,
                created_at: DateTime::now(),
            };
            guard.pending.push(PendingChange {
                change: LocalChange::Offer(offer.clone()),
                failed: false,
            });
            offer
        };
        self.publish();

        let value = bson::to_bson(&offer)?;
        if let Err(e) = self
            .store
            .append(Negotiation::COLLECTION, self.negotiation_id, "offers", value)
            .await
        {
            warn!(%e, "offer write failed; left unsynced");
            self.mark_failed(&LocalChange::Offer(offer));
            return Ok(true);
        }

        self.notify_counterparty(NotificationType::NegotiationUpdate, "made a new offer")
            .await;
        Ok(true)
    }

    /// Accepts the counterparty's latest offer. Terminal.
    pub async fn accept(&self) -> Result<(), DeckError> {
        self.respond(NegotiationStatus::Accepted, "accepted your offer")
            .await
    }

    /// Declines the negotiation. Terminal.
    pub async fn decline(&self) -> Result<(), DeckError> {
        self.respond(NegotiationStatus::Declined, "declined the negotiation")
            .await
    }

    async fn respond(&self, status: NegotiationStatus, action: &str) -> Result<(), DeckError> {
        {
            let mut guard = self.inner.lock();
            let view = guard.merged();
            self.ensure_ongoing(&view)?;
            if !machine::can_respond(&view, self.role) {
                return Err(DeckError::NotYourTurn);
            }
            guard.pending.push(PendingChange {
                change: LocalChange::Status(status),
                failed: false,
            });
        }
        self.publish();
        self.write_status(status, action).await
    }

    /// Founder approval of an incoming negotiation request.
    pub async fn approve(&self) -> Result<(), DeckError> {
        self.resolve_pending(NegotiationStatus::Active, "accepted your negotiation request")
            .await
    }

    /// Founder rejection of an incoming negotiation request. Terminal.
    pub async fn reject(&self) -> Result<(), DeckError> {
        self.resolve_pending(NegotiationStatus::Declined, "declined your negotiation request")
            .await
    }

    async fn resolve_pending(
        &self,
        status: NegotiationStatus,
        action: &str,
    ) -> Result<(), DeckError> {
        {
            let mut guard = self.inner.lock();
            let view = guard.merged();
            match machine::phase(view.status) {
                Phase::Pending => {}
                Phase::Ongoing => return Err(DeckError::AlreadyResolved),
                Phase::Accepted | Phase::Declined => return Err(DeckError::AlreadyResolved),
            }
            if self.role != Party::Founder {
                return Err(DeckError::FounderOnly);
            }
            guard.pending.push(PendingChange {
                change: LocalChange::Status(status),
                failed: false,
            });
        }
        self.publish();
        self.write_status(status, action).await
    }

    /// Re-issues every mutation whose write was rejected. Writes that
    /// merely have not been confirmed yet are left alone; re-appending
    /// them could duplicate ledger entries.
    pub async fn retry_pending(&self) -> Result<(), DeckError> {
        let failed: Vec<LocalChange> = {
            let guard = self.inner.lock();
            guard
                .pending
                .iter()
                .filter(|p| p.failed)
                .map(|p| p.change.clone())
                .collect()
        };

        for change in failed {
            let written = match &change {
                LocalChange::Offer(offer) => {
                    let value = bson::to_bson(offer)?;
                    self.store
                        .append(Negotiation::COLLECTION, self.negotiation_id, "offers", value)
                        .await
                        .is_ok()
                }
                LocalChange::Status(status) => {
                    let value = bson::to_bson(status)?;
                    self.store
                        .write(
                            Negotiation::COLLECTION,
                            self.negotiation_id,
                            bson::doc! { "status": value, "updated_at": DateTime::now() },
                        )
                        .await
                        .is_ok()
                }
            };
            if written {
                let mut guard = self.inner.lock();
                if let Some(p) = guard.pending.iter_mut().find(|p| p.change == change) {
                    p.failed = false;
                }
            }
        }
        self.publish();
        Ok(())
    }

    pub fn close(self) {}

    fn ensure_ongoing(&self, view: &Negotiation) -> Result<(), DeckError> {
        match machine::phase(view.status) {
            Phase::Ongoing => Ok(()),
            Phase::Pending => Err(DeckError::AwaitingApproval),
            Phase::Accepted | Phase::Declined => Err(DeckError::AlreadyResolved),
        }
    }

    fn publish(&self) {
        let state = self.inner.lock().state(self.role);
        self.state_tx.send_replace(state);
    }

    fn mark_failed(&self, change: &LocalChange) {
        {
            let mut guard = self.inner.lock();
            if let Some(p) = guard.pending.iter_mut().find(|p| p.change == *change) {
                p.failed = true;
            }
        }
        self.publish();
    }

    async fn write_status(&self, status: NegotiationStatus, action: &str) -> Result<(), DeckError> {
        let value = bson::to_bson(&status)?;
        if let Err(e) = self
            .store
            .write(
                Negotiation::COLLECTION,
                self.negotiation_id,
                bson::doc! { "status": value, "updated_at": DateTime::now() },
            )
            .await
        {
            warn!(%e, "status write failed; left unsynced");
            self.mark_failed(&LocalChange::Status(status));
            return Ok(());
        }
        self.notify_counterparty(NotificationType::NegotiationUpdate, action)
            .await;
        Ok(())
    }

    async fn notify_counterparty(&self, notification_type: NotificationType, action: &str) {
        let snapshot = self.inner.lock().snapshot.clone();
        notify_counterparty(
            &self.notifications,
            &snapshot,
            self.role,
            notification_type,
            action,
        )
        .await;
    }
}

/// Best-effort side channel alerting the other side of the table. The
/// negotiation write and its notification are two separate records,
/// never one transaction; a failure here is logged and swallowed.
pub async fn notify_counterparty(
    notifications: &NotificationDao,
    negotiation: &Negotiation,
    actor: Party,
    notification_type: NotificationType,
    action: &str,
) {
    let (recipient, actor_name) = match actor {
        Party::Founder => (negotiation.investor_id, negotiation.founder_name.clone()),
        Party::Investor => (negotiation.founder_id, negotiation.investor_name.clone()),
    };
    let data = match negotiation.id {
        Some(id) => bson::doc! { "negotiation_id": id },
        None => bson::doc! {},
    };
    if let Err(e) = notifications
        .create(
            recipient,
            notification_type,
            negotiation.idea_title.clone(),
            format!("{actor_name} {action}"),
            data,
        )
        .await
    {
        warn!(%e, "counterparty notification failed");
    }
}

impl Drop for NegotiationDeck {
    fn drop(&mut self) {
        self.task.abort();
    }
}
