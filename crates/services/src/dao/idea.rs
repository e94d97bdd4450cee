use std::sync::Arc;

use bson::{DateTime, oid::ObjectId};
use cofoundry_db::models::{Idea, IdeaInvestmentDetails, IdeaStatus};

use super::base::{DaoError, DaoResult, from_document, to_document};
use crate::store::RealtimeStore;

#[derive(Clone)]
pub struct IdeaDao {
    store: Arc<dyn RealtimeStore>,
}

impl IdeaDao {
    pub fn new(store: Arc<dyn RealtimeStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        founder_id: ObjectId,
        title: String,
        description: String,
        investment_details: Option<IdeaInvestmentDetails>,
    ) -> DaoResult<Idea> {
        let now = DateTime::now();
        let idea = Idea {
            id: None,
            founder_id,
            title,
            description,
            tags: Vec::new(),
            investment_details,
            status: IdeaStatus::Open,
            created_at: now,
            updated_at: now,
        };
        let id = self
            .store
            .insert(Idea::COLLECTION, to_document(&idea)?)
            .await?;
        self.find_by_id(id).await
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<Idea> {
        let doc = self
            .store
            .get_one(Idea::COLLECTION, id)
            .await?
            .ok_or(DaoError::NotFound)?;
        from_document(doc)
    }
}
