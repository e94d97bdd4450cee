use bson::{DateTime, oid::ObjectId};
use serde::{Deserialize, Serialize};

use super::idea::IdeaInvestmentDetails;

/// One deal under discussion between the founder of an idea and an
/// investor. The `offers` ledger is append-only; insertion order is
/// chronological order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Negotiation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub idea_id: ObjectId,
    pub founder_id: ObjectId,
    pub investor_id: ObjectId,
    pub idea_title: String,
    pub founder_name: String,
    pub founder_username: Option<String>,
    pub investor_name: String,
    pub investor_username: Option<String>,
    pub avatar: Option<String>,
    #[serde(default)]
    pub status: NegotiationStatus,
    #[serde(default)]
    pub offers: Vec<Offer>,
    /// Snapshot of the idea's original ask, taken at creation. Seeds the
    /// opening offer when the ledger is still empty.
    pub idea_investment_details: Option<IdeaInvestmentDetails>,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

/// Canonical status vocabulary. Older records carry `closed` for an
/// accepted deal and `rejected` for a declined one; both deserialize
/// into the canonical variant and are never written back.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStatus {
    #[default]
    Pending,
    Active,
    #[serde(alias = "closed")]
    Accepted,
    #[serde(alias = "rejected")]
    Declined,
}

impl NegotiationStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Declined)
    }
}

/// One entry in a negotiation's ledger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Offer {
    pub investment: f64,
    pub equity: f64,
    pub by: Party,
    pub created_at: DateTime,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Founder,
    Investor,
}

impl Party {
    pub fn other(self) -> Self {
        match self {
            Self::Founder => Self::Investor,
            Self::Investor => Self::Founder,
        }
    }
}

impl Negotiation {
    pub const COLLECTION: &'static str = "negotiations";

    pub fn latest_offer(&self) -> Option<&Offer> {
        self.offers.last()
    }
}
