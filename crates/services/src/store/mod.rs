use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use thiserror::Error;
use tokio::sync::mpsc;

pub mod memory;
pub mod mongo;

pub use memory::MemoryStore;
pub use mongo::MongoStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("MongoDB error: {0}")]
    Mongo(#[from] mongodb::error::Error),
    #[error("BSON serialization error: {0}")]
    BsonSer(#[from] bson::ser::Error),
    #[error("Entity not found")]
    NotFound,
    #[error("Write failed: {0}")]
    WriteFailed(String),
    #[error("Subscribe failed: {0}")]
    SubscribeFailed(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// The query descriptors components may read or subscribe to. Keeping
/// the vocabulary closed lets every store implementation answer the
/// same questions with the same snapshot semantics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    NegotiationsByFounder(ObjectId),
    NegotiationsByInvestor(ObjectId),
    NegotiationById(ObjectId),
    NotificationsByUser(ObjectId),
    UnreadCountByUser(ObjectId),
}

impl Query {
    pub fn collection(&self) -> &'static str {
        match self {
            Self::NegotiationsByFounder(_)
            | Self::NegotiationsByInvestor(_)
            | Self::NegotiationById(_) => "negotiations",
            Self::NotificationsByUser(_) | Self::UnreadCountByUser(_) => "notifications",
        }
    }

    pub fn filter(&self) -> Document {
        match self {
            Self::NegotiationsByFounder(id) => bson::doc! { "founder_id": id },
            Self::NegotiationsByInvestor(id) => bson::doc! { "investor_id": id },
            Self::NegotiationById(id) => bson::doc! { "_id": id },
            Self::NotificationsByUser(id) => bson::doc! { "user_id": id },
            Self::UnreadCountByUser(id) => bson::doc! { "user_id": id, "is_read": false },
        }
    }

    pub fn sort(&self) -> Document {
        match self {
            Self::NotificationsByUser(_) | Self::UnreadCountByUser(_) => {
                bson::doc! { "timestamp": -1 }
            }
            _ => bson::doc! { "created_at": 1 },
        }
    }

    pub fn is_count(&self) -> bool {
        matches!(self, Self::UnreadCountByUser(_))
    }
}

/// One full-state push. Subscribers replace their derived state with
/// the delivered set wholesale; snapshots are never deltas.
#[derive(Debug, Clone)]
pub enum Snapshot {
    Records(Vec<Document>),
    Count(u64),
}

/// Live feed for one query. `next` yields snapshots until the feed is
/// cancelled; calling `unsubscribe` (or dropping the handle) stops
/// delivery permanently.
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Snapshot>,
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(
        rx: mpsc::UnboundedReceiver<Snapshot>,
        cancel: impl FnOnce() + Send + 'static,
    ) -> Self {
        Self {
            rx,
            cancel: Some(Box::new(cancel)),
        }
    }

    pub async fn next(&mut self) -> Option<Snapshot> {
        self.rx.recv().await
    }

    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
        self.rx.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

/// Real-time document store collaborator. All durable state flows
/// through this interface; components are read-through/write-through
/// caches over it.
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Opens a live feed. The full matching result set is delivered
    /// immediately and again after every relevant change.
    async fn subscribe(&self, query: Query) -> StoreResult<Subscription>;

    /// One-shot evaluation of a record query.
    async fn find(&self, query: &Query) -> StoreResult<Vec<Document>>;

    /// Point read.
    async fn get_one(&self, collection: &str, id: ObjectId) -> StoreResult<Option<Document>>;

    async fn insert(&self, collection: &str, doc: Document) -> StoreResult<ObjectId>;

    /// Merge-style partial update of one record. Keys may use dotted
    /// paths into nested documents.
    async fn write(&self, collection: &str, id: ObjectId, partial: Document) -> StoreResult<()>;

    /// Merge-style update of every record matching `filter`; returns
    /// the number of records changed.
    async fn write_where(
        &self,
        collection: &str,
        filter: Document,
        partial: Document,
    ) -> StoreResult<u64>;

    /// Appends one element to an array field.
    async fn append(
        &self,
        collection: &str,
        id: ObjectId,
        field: &str,
        value: Bson,
    ) -> StoreResult<()>;

    /// Appends only when the array is still empty (or absent). Returns
    /// `false` when another writer got there first.
    async fn append_if_empty(
        &self,
        collection: &str,
        id: ObjectId,
        field: &str,
        value: Bson,
    ) -> StoreResult<bool>;
}
