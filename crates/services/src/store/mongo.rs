use bson::{Bson, Document, oid::ObjectId};
use futures::{StreamExt, TryStreamExt};
use mongodb::Database;
use tokio::sync::mpsc;
use tracing::warn;

use super::{Query, RealtimeStore, Snapshot, StoreResult, Subscription};
use async_trait::async_trait;

/// MongoDB-backed store. Subscriptions are driven by change streams:
/// any change in the queried collection re-runs the query and pushes
/// the full result set, so subscribers always see complete snapshots,
/// never deltas.
pub struct MongoStore {
    db: Database,
}

impl MongoStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

async fn run_query(db: &Database, query: &Query) -> StoreResult<Snapshot> {
    let coll = db.collection::<Document>(query.collection());
    if query.is_count() {
        let count = coll.count_documents(query.filter()).await?;
        return Ok(Snapshot::Count(count));
    }

    let docs: Vec<Document> = coll
        .find(query.filter())
        .sort(query.sort())
        .await?
        .try_collect()
        .await?;
    Ok(Snapshot::Records(docs))
}

#[async_trait]
impl RealtimeStore for MongoStore {
    async fn subscribe(&self, query: Query) -> StoreResult<Subscription> {
        let (tx, rx) = mpsc::unbounded_channel();

        // Seed the feed before the change stream is live, so the
        // subscriber renders current state without waiting for a write.
        let _ = tx.send(run_query(&self.db, &query).await?);

        let mut stream = self
            .db
            .collection::<Document>(query.collection())
            .watch()
            .await?;

        let db = self.db.clone();
        let handle = tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                if let Err(e) = event {
                    warn!(%e, "change stream closed");
                    break;
                }
                match run_query(&db, &query).await {
                    Ok(snapshot) => {
                        if tx.send(snapshot).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(%e, "snapshot query failed"),
                }
            }
        });

        Ok(Subscription::new(rx, move || handle.abort()))
    }

    async fn find(&self, query: &Query) -> StoreResult<Vec<Document>> {
        match run_query(&self.db, query).await? {
            Snapshot::Records(docs) => Ok(docs),
            Snapshot::Count(_) => Ok(Vec::new()),
        }
    }

    async fn get_one(&self, collection: &str, id: ObjectId) -> StoreResult<Option<Document>> {
        Ok(self
            .db
            .collection::<Document>(collection)
            .find_one(bson::doc! { "_id": id })
            .await?)
    }

    async fn insert(&self, collection: &str, doc: Document) -> StoreResult<ObjectId> {
        let result = self
            .db
            .collection::<Document>(collection)
            .insert_one(doc)
            .await?;
        Ok(result
            .inserted_id
            .as_object_id()
            .unwrap_or_else(ObjectId::new))
    }

    async fn write(&self, collection: &str, id: ObjectId, partial: Document) -> StoreResult<()> {
        self.db
            .collection::<Document>(collection)
            .update_one(bson::doc! { "_id": id }, bson::doc! { "$set": partial })
            .await?;
        Ok(())
    }

    async fn write_where(
        &self,
        collection: &str,
        filter: Document,
        partial: Document,
    ) -> StoreResult<u64> {
        let result = self
            .db
            .collection::<Document>(collection)
            .update_many(filter, bson::doc! { "$set": partial })
            .await?;
        Ok(result.modified_count)
    }

    async fn append(
        &self,
        collection: &str,
        id: ObjectId,
        field: &str,
        value: Bson,
    ) -> StoreResult<()> {
        let mut push = Document::new();
        push.insert(field, value);
        self.db
            .collection::<Document>(collection)
            .update_one(bson::doc! { "_id": id }, bson::doc! { "$push": push })
            .await?;
        Ok(())
    }

    async fn append_if_empty(
        &self,
        collection: &str,
        id: ObjectId,
        field: &str,
        value: Bson,
    ) -> StoreResult<bool> {
        // Conditional push: only when the array is still empty or was
        // never written. Concurrent racers see modified_count == 0.
        let mut empty = Document::new();
        empty.insert(field, bson::doc! { "$size": 0 });
        let mut absent = Document::new();
        absent.insert(field, bson::doc! { "$exists": false });
        let filter = bson::doc! { "_id": id, "$or": [empty, absent] };

        let mut push = Document::new();
        push.insert(field, value);
        let result = self
            .db
            .collection::<Document>(collection)
            .update_one(filter, bson::doc! { "$push": push })
            .await?;
        Ok(result.modified_count > 0)
    }
}
