use bson::Document;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum DaoError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("BSON serialization error: {0}")]
    BsonSer(#[from] bson::ser::Error),
    #[error("BSON deserialization error: {0}")]
    BsonDe(#[from] bson::de::Error),
    #[error("Entity not found")]
    NotFound,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Validation: {0}")]
    Validation(String),
}

pub type DaoResult<T> = Result<T, DaoError>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationParams {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            per_page: default_per_page(),
        }
    }
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    25
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

/// Slices an already-filtered result set into one page. Result sets
/// here are per-user, so paging in memory after the store read keeps
/// every store implementation on the same code path.
pub fn paginate<T>(items: Vec<T>, params: &PaginationParams) -> PaginatedResult<T> {
    let total = items.len() as u64;
    let per_page = params.per_page.max(1);
    let page = params.page.max(1);
    let total_pages = total.div_ceil(per_page);

    let start = ((page - 1) * per_page) as usize;
    let items: Vec<T> = items
        .into_iter()
        .skip(start)
        .take(per_page as usize)
        .collect();

    PaginatedResult {
        items,
        total,
        page,
        per_page,
        total_pages,
    }
}

pub fn to_document<T: Serialize>(value: &T) -> DaoResult<Document> {
    match bson::to_bson(value)? {
        bson::Bson::Document(doc) => Ok(doc),
        other => Err(DaoError::Validation(format!(
            "expected document, got {:?}",
            other.element_type()
        ))),
    }
}

pub fn from_document<T: DeserializeOwned>(doc: Document) -> DaoResult<T> {
    Ok(bson::from_document(doc)?)
}
