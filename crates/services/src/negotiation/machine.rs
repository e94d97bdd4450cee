//! Pure derivation of a negotiation's phase, turn, and permitted
//! actions. Everything here is side-effect free; the deck and the API
//! layer both consult these functions before accepting a write.

use bson::oid::ObjectId;
use cofoundry_db::models::{Negotiation, NegotiationStatus, Offer, Party};
use serde::Serialize;

/// Display phase, normalized from the stored status vocabulary.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Pending,
    Ongoing,
    Accepted,
    Declined,
}

pub fn phase(status: NegotiationStatus) -> Phase {
    match status {
        NegotiationStatus::Pending => Phase::Pending,
        NegotiationStatus::Active => Phase::Ongoing,
        NegotiationStatus::Accepted => Phase::Accepted,
        NegotiationStatus::Declined => Phase::Declined,
    }
}

/// Which side of the table a user sits on, if any.
pub fn role_of(negotiation: &Negotiation, user_id: ObjectId) -> Option<Party> {
    if negotiation.founder_id == user_id {
        Some(Party::Founder)
    } else if negotiation.investor_id == user_id {
        Some(Party::Investor)
    } else {
        None
    }
}

/// The turn invariant: an empty ledger is open to either party, a
/// non-empty one belongs to whoever did not author the latest offer.
pub fn is_my_turn(negotiation: &Negotiation, role: Party) -> bool {
    negotiation
        .latest_offer()
        .map_or(true, |offer| offer.by != role)
}

/// Client-side validation gate for new offers. Out-of-range values are
/// rejected silently: no offer, no error. This is the authoritative
/// bound check; nothing re-validates downstream.
pub fn offer_in_bounds(investment: f64, equity: f64) -> bool {
    investment > 0.0 && equity > 0.0 && equity < 100.0
}

/// The synthesized founder opening offer, derived from the idea's ask.
/// Only meaningful while the ledger is empty.
pub fn bootstrap_offer(negotiation: &Negotiation) -> Option<Offer> {
    if !negotiation.offers.is_empty() {
        return None;
    }
    let details = negotiation.idea_investment_details.as_ref()?;
    Some(Offer {
        investment: details.target_investment,
        equity: details.equity_offered,
        by: Party::Founder,
        created_at: negotiation.created_at,
    })
}

pub fn can_submit(negotiation: &Negotiation, role: Party) -> bool {
    phase(negotiation.status) == Phase::Ongoing && is_my_turn(negotiation, role)
}

/// Accepting (or declining) answers the latest offer, so both require
/// one authored by the counterparty.
pub fn can_respond(negotiation: &Negotiation, role: Party) -> bool {
    phase(negotiation.status) == Phase::Ongoing
        && negotiation
            .latest_offer()
            .map_or(false, |offer| offer.by == role.other())
}

pub fn can_resolve_pending(negotiation: &Negotiation, role: Party) -> bool {
    phase(negotiation.status) == Phase::Pending && role == Party::Founder
}
