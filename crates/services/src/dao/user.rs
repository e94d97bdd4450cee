use std::sync::Arc;

use bson::{DateTime, oid::ObjectId};
use cofoundry_db::models::User;

use super::base::{DaoError, DaoResult, from_document, to_document};
use crate::store::RealtimeStore;

#[derive(Clone)]
pub struct UserDao {
    store: Arc<dyn RealtimeStore>,
}

impl UserDao {
    pub fn new(store: Arc<dyn RealtimeStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        email: String,
        username: String,
        display_name: String,
    ) -> DaoResult<User> {
        let now = DateTime::now();
        let user = User {
            id: None,
            email,
            username,
            display_name,
            avatar: None,
            headline: None,
            created_at: now,
            updated_at: now,
        };
        let id = self
            .store
            .insert(User::COLLECTION, to_document(&user)?)
            .await?;
        self.find_by_id(id).await
    }

    pub async fn find_by_id(&self, id: ObjectId) -> DaoResult<User> {
        let doc = self
            .store
            .get_one(User::COLLECTION, id)
            .await?
            .ok_or(DaoError::NotFound)?;
        from_document(doc)
    }
}
