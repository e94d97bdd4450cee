use std::sync::Arc;

use bson::{DateTime, oid::ObjectId};
use cofoundry_db::models::{Idea, Negotiation, NegotiationStatus, Offer, User};
use tracing::warn;

use super::base::{DaoError, DaoResult, from_document, to_document};
use crate::store::{Query, RealtimeStore};

#[derive(Clone)]
pub struct NegotiationDao {
    store: Arc<dyn RealtimeStore>,
}

impl NegotiationDao {
    pub fn new(store: Arc<dyn RealtimeStore>) -> Self {
        Self { store }
    }

    /// Opens a negotiation for an investor interested in an idea. The
    /// idea's ask and both parties' display data are snapshotted onto
    /// the record so list screens render without extra lookups.
    pub async fn create(
        &self,
        idea: &Idea,
        founder: &User,
        investor: &User,
    ) -> DaoResult<Negotiation> {
        let now = DateTime::now();
        let negotiation = Negotiation {
            id: None,
            idea_id: idea.id.ok_or(DaoError::NotFound)?,
            founder_id: founder.id.ok_or(DaoError::NotFound)?,
            investor_id: investor.id.ok_or(DaoError::NotFound)?,
            idea_title: idea.title.clone(),
            founder_name: founder.display_name.clone(),
            founder_username: Some(founder.username.clone()),
            investor_name: investor.display_name.clone(),
            investor_username: Some(investor.username.clone()),
            avatar: investor.avatar.clone(),
            status: NegotiationStatus::Pending,
            offers: Vec::new(),
            idea_investment_details: idea.investment_details.clone(),
            created_at: now,
            updated_at: now,
        };

        let id = self
            .store
            .insert(Negotiation::COLLECTION, to_document(&negotiation)?)
            .await?;
        self.find_by_id(id).await
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<Negotiation> {
        let doc = self
            .store
            .get_one(Negotiation::COLLECTION, id)
            .await?
            .ok_or(DaoError::NotFound)?;
        from_document(doc)
    }

    pub async fn find_for_founder(&self, founder_id: ObjectId) -> DaoResult<Vec<Negotiation>> {
        self.find_all(&Query::NegotiationsByFounder(founder_id)).await
    }

    pub async fn find_for_investor(&self, investor_id: ObjectId) -> DaoResult<Vec<Negotiation>> {
        self.find_all(&Query::NegotiationsByInvestor(investor_id)).await
    }

    async fn find_all(&self, query: &Query) -> DaoResult<Vec<Negotiation>> {
        let docs = self.store.find(query).await?;
        // A record that fails to decode is skipped, not fatal: one bad
        // row must not take down a whole list screen.
        Ok(docs
            .into_iter()
            .filter_map(|doc| match from_document::<Negotiation>(doc) {
                Ok(n) => Some(n),
                Err(e) => {
                    warn!(%e, "skipping malformed negotiation record");
                    None
                }
            })
            .collect())
    }

    pub async fn set_status(&self, id: ObjectId, status: NegotiationStatus) -> DaoResult<()> {
        let status = bson::to_bson(&status)?;
        self.store
            .write(
                Negotiation::COLLECTION,
                id,
                bson::doc! { "status": status, "updated_at": DateTime::now() },
            )
            .await?;
        Ok(())
    }

    pub async fn push_offer(&self, id: ObjectId, offer: &Offer) -> DaoResult<()> {
        self.store
            .append(Negotiation::COLLECTION, id, "offers", bson::to_bson(offer)?)
            .await?;
        Ok(())
    }

    /// Writes the synthesized opening offer, but only when the ledger
    /// is still empty. Returns `false` when a concurrent viewer won the
    /// race; the caller's optimistic copy converges via the snapshot.
    pub async fn push_opening_offer(&self, id: ObjectId, offer: &Offer) -> DaoResult<bool> {
        Ok(self
            .store
            .append_if_empty(Negotiation::COLLECTION, id, "offers", bson::to_bson(offer)?)
            .await?)
    }
}
