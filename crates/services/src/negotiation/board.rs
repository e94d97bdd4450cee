//! List controllers over a user's negotiations: one subscription per
//! viewer (founder-side or investor-side, never both), partitioned into
//! buckets by one shared engine with a per-call-site sort strategy.

use bson::{DateTime, oid::ObjectId};
use cofoundry_db::models::{Negotiation, NegotiationStatus, Party};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::store::{Query, RealtimeStore, Snapshot, StoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoardSide {
    Founder,
    Investor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortStrategy {
    /// Three status buckets, each sorted by most recent activity.
    Recency,
    /// A pending bucket in insertion order plus one merged bucket in
    /// fixed status-priority order, recency ignored.
    StatusPriority,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Buckets {
    Recency {
        ongoing: Vec<Negotiation>,
        accepted: Vec<Negotiation>,
        declined: Vec<Negotiation>,
    },
    StatusPriority {
        pending: Vec<Negotiation>,
        resolved: Vec<Negotiation>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardState {
    pub buckets: Buckets,
    /// Founder side only: active negotiations whose latest offer came
    /// from the investor, i.e. the ball is in the founder's court.
    pub needs_attention: Vec<Negotiation>,
}

impl BoardState {
    fn empty(strategy: SortStrategy) -> Self {
        Self {
            buckets: partition(Vec::new(), strategy),
            needs_attention: Vec::new(),
        }
    }

    pub fn build(items: Vec<Negotiation>, side: BoardSide, strategy: SortStrategy) -> Self {
        let needs_attention = match side {
            BoardSide::Founder => needs_attention(&items),
            BoardSide::Investor => Vec::new(),
        };
        Self {
            buckets: partition(items, strategy),
            needs_attention,
        }
    }
}

/// Most recent activity on a negotiation: its latest offer, or its own
/// creation time when the ledger is empty.
pub fn last_activity(negotiation: &Negotiation) -> DateTime {
    negotiation
        .latest_offer()
        .map_or(negotiation.created_at, |offer| {
            offer.created_at.max(negotiation.created_at)
        })
}

fn status_priority(status: NegotiationStatus) -> u8 {
    match status {
        NegotiationStatus::Active => 0,
        NegotiationStatus::Accepted => 1,
        NegotiationStatus::Declined => 2,
        NegotiationStatus::Pending => 3,
    }
}

/// Splits a result set into display buckets. Every non-pending
/// negotiation lands in exactly one bucket; pending ones appear only in
/// the `StatusPriority` pending bucket.
pub fn partition(items: Vec<Negotiation>, strategy: SortStrategy) -> Buckets {
    match strategy {
        SortStrategy::Recency => {
            let mut ongoing = Vec::new();
            let mut accepted = Vec::new();
            let mut declined = Vec::new();
            for negotiation in items {
                match negotiation.status {
                    NegotiationStatus::Active => ongoing.push(negotiation),
                    NegotiationStatus::Accepted => accepted.push(negotiation),
                    NegotiationStatus::Declined => declined.push(negotiation),
                    NegotiationStatus::Pending => {}
                }
            }
            for bucket in [&mut ongoing, &mut accepted, &mut declined] {
                bucket.sort_by(|a, b| last_activity(b).cmp(&last_activity(a)));
            }
            Buckets::Recency {
                ongoing,
                accepted,
                declined,
            }
        }
        SortStrategy::StatusPriority => {
            let mut pending = Vec::new();
            let mut resolved = Vec::new();
            for negotiation in items {
                if negotiation.status == NegotiationStatus::Pending {
                    pending.push(negotiation);
                } else {
                    resolved.push(negotiation);
                }
            }
            // Stable sort: equal-priority entries keep insertion order.
            resolved.sort_by_key(|n| status_priority(n.status));
            Buckets::StatusPriority { pending, resolved }
        }
    }
}

pub fn needs_attention(items: &[Negotiation]) -> Vec<Negotiation> {
    items
        .iter()
        .filter(|n| {
            n.status == NegotiationStatus::Active
                && n.latest_offer()
                    .map_or(false, |offer| offer.by == Party::Investor)
        })
        .cloned()
        .collect()
}

/// Live board over one side's negotiations. Owns its subscription; the
/// delivery task ends (and the store-side listener is released) when
/// the board is dropped or closed.
pub struct NegotiationBoard {
    state_rx: watch::Receiver<BoardState>,
    task: JoinHandle<()>,
}

impl NegotiationBoard {
    pub async fn open(
        store: &dyn RealtimeStore,
        user_id: ObjectId,
        side: BoardSide,
        strategy: SortStrategy,
    ) -> StoreResult<Self> {
        let query = match side {
            BoardSide::Founder => Query::NegotiationsByFounder(user_id),
            BoardSide::Investor => Query::NegotiationsByInvestor(user_id),
        };
        let mut sub = store.subscribe(query).await?;

        let (tx, state_rx) = watch::channel(BoardState::empty(strategy));
        let task = tokio::spawn(async move {
            while let Some(snapshot) = sub.next().await {
                let Snapshot::Records(docs) = snapshot else {
                    continue;
                };
                let items: Vec<Negotiation> = docs
                    .into_iter()
                    .filter_map(|doc| match bson::from_document(doc) {
                        Ok(n) => Some(n),
                        Err(e) => {
                            warn!(%e, "skipping malformed negotiation record");
                            None
                        }
                    })
                    .collect();
                tx.send_replace(BoardState::build(items, side, strategy));
            }
        });

        Ok(Self { state_rx, task })
    }

    pub fn state(&self) -> watch::Receiver<BoardState> {
        self.state_rx.clone()
    }

    pub fn close(self) {}
}

impl Drop for NegotiationBoard {
    fn drop(&mut self) {
        self.task.abort();
    }
}
