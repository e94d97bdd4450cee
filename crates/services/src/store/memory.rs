use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering as AtomicOrdering};

use bson::{Bson, Document, oid::ObjectId};
use dashmap::DashMap;
use tokio::sync::mpsc;

use super::{Query, RealtimeStore, Snapshot, StoreError, StoreResult, Subscription};
use async_trait::async_trait;

/// In-memory store with the same snapshot semantics as the MongoDB
/// implementation. Used by unit and integration tests; also supports
/// injecting write/subscribe failures to exercise retry paths.
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, Vec<Document>>,
    subscribers: Arc<DashMap<u64, Subscriber>>,
    next_sub_id: AtomicU64,
    fail_writes: AtomicU32,
    fail_subscribes: AtomicU32,
}

struct Subscriber {
    query: Query,
    tx: mpsc::UnboundedSender<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` mutating calls fail with `StoreError::WriteFailed`.
    pub fn fail_next_writes(&self, n: u32) {
        self.fail_writes.store(n, AtomicOrdering::SeqCst);
    }

    /// The next `n` subscribe calls fail with `StoreError::SubscribeFailed`.
    pub fn fail_next_subscribes(&self, n: u32) {
        self.fail_subscribes.store(n, AtomicOrdering::SeqCst);
    }

    fn take_injected_failure(&self, counter: &AtomicU32) -> bool {
        counter
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| {
                n.checked_sub(1)
            })
            .is_ok()
    }

    fn check_write(&self) -> StoreResult<()> {
        if self.take_injected_failure(&self.fail_writes) {
            return Err(StoreError::WriteFailed("injected failure".to_string()));
        }
        Ok(())
    }

    fn run_query(&self, query: &Query) -> Snapshot {
        let filter = query.filter();
        let mut matched: Vec<Document> = self
            .collections
            .get(query.collection())
            .map(|c| c.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|doc| matches_filter(doc, &filter))
            .collect();

        if query.is_count() {
            Snapshot::Count(matched.len() as u64)
        } else {
            sort_docs(&mut matched, &query.sort());
            Snapshot::Records(matched)
        }
    }

    /// Re-runs every registered query over the changed collection and
    /// pushes the fresh full snapshot to its subscriber.
    fn notify(&self, collection: &str) {
        let mut dead = Vec::new();
        for entry in self.subscribers.iter() {
            if entry.query.collection() != collection {
                continue;
            }
            let snapshot = self.run_query(&entry.query);
            if entry.tx.send(snapshot).is_err() {
                dead.push(*entry.key());
            }
        }
        for id in dead {
            self.subscribers.remove(&id);
        }
    }

    fn with_doc<R>(
        &self,
        collection: &str,
        id: ObjectId,
        f: impl FnOnce(&mut Document) -> R,
    ) -> StoreResult<R> {
        let mut coll = self
            .collections
            .entry(collection.to_string())
            .or_default();
        let doc = coll
            .iter_mut()
            .find(|d| d.get_object_id("_id").map(|oid| oid == id).unwrap_or(false))
            .ok_or(StoreError::NotFound)?;
        Ok(f(doc))
    }
}

#[async_trait]
impl RealtimeStore for MemoryStore {
    async fn subscribe(&self, query: Query) -> StoreResult<Subscription> {
        if self.take_injected_failure(&self.fail_subscribes) {
            return Err(StoreError::SubscribeFailed("injected failure".to_string()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(self.run_query(&query));

        let id = self.next_sub_id.fetch_add(1, AtomicOrdering::SeqCst);
        self.subscribers.insert(id, Subscriber { query, tx });

        let subscribers = self.subscribers.clone();
        Ok(Subscription::new(rx, move || {
            subscribers.remove(&id);
        }))
    }

    async fn find(&self, query: &Query) -> StoreResult<Vec<Document>> {
        match self.run_query(query) {
            Snapshot::Records(docs) => Ok(docs),
            Snapshot::Count(_) => Ok(Vec::new()),
        }
    }

    async fn get_one(&self, collection: &str, id: ObjectId) -> StoreResult<Option<Document>> {
        Ok(self.collections.get(collection).and_then(|coll| {
            coll.iter()
                .find(|d| d.get_object_id("_id").map(|oid| oid == id).unwrap_or(false))
                .cloned()
        }))
    }

    async fn insert(&self, collection: &str, mut doc: Document) -> StoreResult<ObjectId> {
        self.check_write()?;
        // A present `_id` is kept verbatim, even a malformed one, so
        // tests can seed legacy records; the returned id is meaningful
        // only when the stored `_id` is an ObjectId.
        let id = match doc.get("_id") {
            Some(Bson::ObjectId(id)) => *id,
            Some(_) => ObjectId::new(),
            None => {
                let id = ObjectId::new();
                doc.insert("_id", id);
                id
            }
        };
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        self.notify(collection);
        Ok(id)
    }

    async fn write(&self, collection: &str, id: ObjectId, partial: Document) -> StoreResult<()> {
        self.check_write()?;
        self.with_doc(collection, id, |doc| merge_set(doc, &partial))?;
        self.notify(collection);
        Ok(())
    }

    async fn write_where(
        &self,
        collection: &str,
        filter: Document,
        partial: Document,
    ) -> StoreResult<u64> {
        self.check_write()?;
        let mut changed = 0;
        if let Some(mut coll) = self.collections.get_mut(collection) {
            for doc in coll.iter_mut() {
                if matches_filter(doc, &filter) {
                    merge_set(doc, &partial);
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            self.notify(collection);
        }
        Ok(changed)
    }

    async fn append(
        &self,
        collection: &str,
        id: ObjectId,
        field: &str,
        value: Bson,
    ) -> StoreResult<()> {
        self.check_write()?;
        self.with_doc(collection, id, |doc| {
            match doc.get_array_mut(field) {
                Ok(array) => array.push(value),
                Err(_) => {
                    doc.insert(field, Bson::Array(vec![value]));
                }
            }
        })?;
        self.notify(collection);
        Ok(())
    }

    async fn append_if_empty(
        &self,
        collection: &str,
        id: ObjectId,
        field: &str,
        value: Bson,
    ) -> StoreResult<bool> {
        self.check_write()?;
        let appended = self.with_doc(collection, id, |doc| {
            match doc.get_array_mut(field) {
                Ok(array) if !array.is_empty() => false,
                Ok(array) => {
                    array.push(value);
                    true
                }
                Err(_) => {
                    doc.insert(field, Bson::Array(vec![value]));
                    true
                }
            }
        })?;
        if appended {
            self.notify(collection);
        }
        Ok(appended)
    }
}

/// Top-level equality match. A filter of `false` also matches a missing
/// boolean field, mirroring the serde default on read.
fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, expected)| match doc.get(key) {
        Some(actual) => actual == expected,
        None => *expected == Bson::Boolean(false),
    })
}

/// Applies a merge-style `$set`: top-level keys replace, dotted paths
/// descend into (or create) nested documents.
fn merge_set(target: &mut Document, partial: &Document) {
    for (key, value) in partial {
        match key.split_once('.') {
            Some((head, rest)) => {
                if !matches!(target.get(head), Some(Bson::Document(_))) {
                    target.insert(head, Document::new());
                }
                if let Some(Bson::Document(nested)) = target.get_mut(head) {
                    let mut sub = Document::new();
                    sub.insert(rest, value.clone());
                    merge_set(nested, &sub);
                }
            }
            None => {
                target.insert(key, value.clone());
            }
        }
    }
}

fn sort_docs(docs: &mut [Document], sort: &Document) {
    let Some((key, direction)) = sort.iter().next() else {
        return;
    };
    let descending = matches!(direction, Bson::Int32(d) if *d < 0)
        || matches!(direction, Bson::Int64(d) if *d < 0);
    docs.sort_by(|a, b| {
        let ord = cmp_bson(a.get(key.as_str()), b.get(key.as_str()));
        if descending { ord.reverse() } else { ord }
    });
}

fn cmp_bson(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a, b) {
        (Some(Bson::DateTime(a)), Some(Bson::DateTime(b))) => a.cmp(b),
        (Some(Bson::Int32(a)), Some(Bson::Int32(b))) => a.cmp(b),
        (Some(Bson::Int64(a)), Some(Bson::Int64(b))) => a.cmp(b),
        (Some(Bson::Double(a)), Some(Bson::Double(b))) => {
            a.partial_cmp(b).unwrap_or(Ordering::Equal)
        }
        (Some(Bson::String(a)), Some(Bson::String(b))) => a.cmp(b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}
