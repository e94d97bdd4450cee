use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Idea {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub founder_id: ObjectId,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub investment_details: Option<IdeaInvestmentDetails>,
    #[serde(default)]
    pub status: IdeaStatus,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// The ask attached to an idea: how much capital for how much equity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IdeaInvestmentDetails {
    pub target_investment: f64,
    pub equity_offered: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdeaStatus {
    #[default]
    Open,
    Archived,
}

impl Idea {
    pub const COLLECTION: &'static str = "ideas";
}
