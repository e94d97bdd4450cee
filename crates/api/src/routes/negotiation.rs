use axum::{
    Json,
    extract::{Path, Query, State},
};
use bson::{DateTime, oid::ObjectId};
use cofoundry_db::models::{Negotiation, NegotiationStatus, NotificationType, Offer, Party};
use cofoundry_services::negotiation::{
    board::{BoardSide, BoardState, Buckets, SortStrategy},
    machine::{self, Phase},
    notify_counterparty,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{error::ApiError, extractors::auth::AuthUser, state::AppState};

#[derive(Debug, Deserialize)]
pub struct CreateNegotiationRequest {
    pub idea_id: String,
}

#[derive(Debug, Deserialize)]
pub struct OfferRequest {
    pub investment: f64,
    pub equity: f64,
}

#[derive(Debug, Deserialize)]
pub struct BoardQuery {
    pub side: String,
    pub strategy: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OfferResponse {
    pub investment: f64,
    pub equity: f64,
    pub by: String,
    pub created_at: String,
}

#[derive(Debug, Serialize)]
pub struct InvestmentDetailsResponse {
    pub target_investment: f64,
    pub equity_offered: f64,
}

#[derive(Debug, Serialize)]
pub struct NegotiationResponse {
    pub id: String,
    pub idea_id: String,
    pub founder_id: String,
    pub investor_id: String,
    pub idea_title: String,
    pub founder_name: String,
    pub founder_username: Option<String>,
    pub investor_name: String,
    pub investor_username: Option<String>,
    pub avatar: Option<String>,
    pub status: String,
    pub phase: String,
    pub my_role: Option<String>,
    pub my_turn: Option<bool>,
    pub offers: Vec<OfferResponse>,
    pub idea_investment_details: Option<InvestmentDetailsResponse>,
    pub created_at: String,
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateNegotiationRequest>,
) -> Result<Json<NegotiationResponse>, ApiError> {
    let idea_id = ObjectId::parse_str(&body.idea_id)
        .map_err(|_| ApiError::BadRequest("Invalid idea_id".to_string()))?;

    let idea = state.ideas.find_by_id(idea_id).await?;
    if idea.founder_id == auth.user_id {
        return Err(ApiError::BadRequest(
            "Cannot open a negotiation on your own idea".to_string(),
        ));
    }

    let founder = state.users.find_by_id(idea.founder_id).await?;
    let investor = state.users.find_by_id(auth.user_id).await?;
    let negotiation = state
        .negotiations
        .create(&idea, &founder, &investor)
        .await?;

    // Alert the founder; separate record, best effort.
    if let Err(e) = state
        .notifications
        .create(
            idea.founder_id,
            NotificationType::NewNegotiation,
            idea.title.clone(),
            format!("{} wants to invest in your idea", investor.display_name),
            bson::doc! { "negotiation_id": negotiation.id },
        )
        .await
    {
        warn!(%e, "new negotiation notification failed");
    }

    Ok(Json(to_response(negotiation, Some(auth.user_id))))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(negotiation_id): Path<String>,
) -> Result<Json<NegotiationResponse>, ApiError> {
    let (negotiation, _) = load_for_participant(&state, &auth, &negotiation_id).await?;
    Ok(Json(to_response(negotiation, Some(auth.user_id))))
}

/// Partitioned list for one side of the table. Exactly one of the two
/// subscriptions backs a viewer; the strategy is chosen per screen
/// (`recency` for the unified board, `status_priority` for the founder
/// dashboard).
pub async fn board(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(params): Query<BoardQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let side = match params.side.as_str() {
        "founder" => BoardSide::Founder,
        "investor" => BoardSide::Investor,
        _ => return Err(ApiError::BadRequest("Invalid side".to_string())),
    };
    let strategy = match params.strategy.as_deref() {
        None | Some("recency") => SortStrategy::Recency,
        Some("status_priority") => SortStrategy::StatusPriority,
        Some(_) => return Err(ApiError::BadRequest("Invalid strategy".to_string())),
    };

    let items = match side {
        BoardSide::Founder => state.negotiations.find_for_founder(auth.user_id).await?,
        BoardSide::Investor => state.negotiations.find_for_investor(auth.user_id).await?,
    };

    let viewer = Some(auth.user_id);
    let board = BoardState::build(items, side, strategy);
    let needs_attention: Vec<NegotiationResponse> = board
        .needs_attention
        .into_iter()
        .map(|n| to_response(n, viewer))
        .collect();

    let buckets = match board.buckets {
        Buckets::Recency {
            ongoing,
            accepted,
            declined,
        } => serde_json::json!({
            "ongoing": map_responses(ongoing, viewer),
            "accepted": map_responses(accepted, viewer),
            "declined": map_responses(declined, viewer),
        }),
        Buckets::StatusPriority { pending, resolved } => serde_json::json!({
            "pending": map_responses(pending, viewer),
            "resolved": map_responses(resolved, viewer),
        }),
    };

    Ok(Json(serde_json::json!({
        "buckets": buckets,
        "needs_attention": needs_attention,
    })))
}

/// Founder approval: pending → ongoing.
pub async fn approve(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(negotiation_id): Path<String>,
) -> Result<Json<NegotiationResponse>, ApiError> {
    resolve_pending(
        state,
        auth,
        negotiation_id,
        NegotiationStatus::Active,
        "accepted your negotiation request",
    )
    .await
}

/// Founder rejection: pending → declined. Terminal.
pub async fn reject(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(negotiation_id): Path<String>,
) -> Result<Json<NegotiationResponse>, ApiError> {
    resolve_pending(
        state,
        auth,
        negotiation_id,
        NegotiationStatus::Declined,
        "declined your negotiation request",
    )
    .await
}

/// Appends a counter-offer. The turn and phase checks here are the
/// authoritative ones; the client-side gate only hides controls.
/// Out-of-range amounts are a silent no-op: the unchanged record comes
/// back with 200.
pub async fn submit_offer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(negotiation_id): Path<String>,
    Json(body): Json<OfferRequest>,
) -> Result<Json<NegotiationResponse>, ApiError> {
    let (negotiation, role) =
        load_bootstrapped(&state, &auth, &negotiation_id).await?;
    let id = negotiation.id.ok_or_else(|| {
        ApiError::Internal("Stored negotiation lost its id".to_string())
    })?;

    ensure_ongoing(&negotiation)?;
    if !machine::is_my_turn(&negotiation, role) {
        return Err(ApiError::Forbidden("Not your turn".to_string()));
    }

    if machine::offer_in_bounds(body.investment, body.equity) {
        let offer = Offer {
            investment: body.investment,
            equity: body.equity,
            by: role,
            created_at: DateTime::now(),
        };
        state.negotiations.push_offer(id, &offer).await?;
        notify_counterparty(
            &state.notifications,
            &negotiation,
            role,
            NotificationType::NegotiationUpdate,
            "made a new offer",
        )
        .await;
    }

    let negotiation = state.negotiations.find_by_id(id).await?;
    Ok(Json(to_response(negotiation, Some(auth.user_id))))
}

/// Accepts the counterparty's latest offer. Terminal.
pub async fn accept(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(negotiation_id): Path<String>,
) -> Result<Json<NegotiationResponse>, ApiError> {
    respond(
        state,
        auth,
        negotiation_id,
        NegotiationStatus::Accepted,
        "accepted your offer",
    )
    .await
}

/// Declines the negotiation. Terminal.
pub async fn decline(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(negotiation_id): Path<String>,
) -> Result<Json<NegotiationResponse>, ApiError> {
    respond(
        state,
        auth,
        negotiation_id,
        NegotiationStatus::Declined,
        "declined the negotiation",
    )
    .await
}

async fn resolve_pending(
    state: AppState,
    auth: AuthUser,
    negotiation_id: String,
    status: NegotiationStatus,
    action: &str,
) -> Result<Json<NegotiationResponse>, ApiError> {
    let (negotiation, role) = load_for_participant(&state, &auth, &negotiation_id).await?;
    let id = negotiation.id.ok_or_else(|| {
        ApiError::Internal("Stored negotiation lost its id".to_string())
    })?;

    if machine::phase(negotiation.status) != Phase::Pending {
        return Err(ApiError::Conflict(
            "Negotiation is no longer awaiting approval".to_string(),
        ));
    }
    if role != Party::Founder {
        return Err(ApiError::Forbidden(
            "Only the founder may resolve a pending negotiation".to_string(),
        ));
    }

    state.negotiations.set_status(id, status).await?;
    notify_counterparty(
        &state.notifications,
        &negotiation,
        role,
        NotificationType::NegotiationUpdate,
        action,
    )
    .await;

    let negotiation = state.negotiations.find_by_id(id).await?;
    Ok(Json(to_response(negotiation, Some(auth.user_id))))
}

async fn respond(
    state: AppState,
    auth: AuthUser,
    negotiation_id: String,
    status: NegotiationStatus,
    action: &str,
) -> Result<Json<NegotiationResponse>, ApiError> {
    let (negotiation, role) =
        load_bootstrapped(&state, &auth, &negotiation_id).await?;
    let id = negotiation.id.ok_or_else(|| {
        ApiError::Internal("Stored negotiation lost its id".to_string())
    })?;

    ensure_ongoing(&negotiation)?;
    if !machine::can_respond(&negotiation, role) {
        return Err(ApiError::Forbidden("Not your turn".to_string()));
    }

    state.negotiations.set_status(id, status).await?;
    notify_counterparty(
        &state.notifications,
        &negotiation,
        role,
        NotificationType::NegotiationUpdate,
        action,
    )
    .await;

    let negotiation = state.negotiations.find_by_id(id).await?;
    Ok(Json(to_response(negotiation, Some(auth.user_id))))
}

async fn load_for_participant(
    state: &AppState,
    auth: &AuthUser,
    negotiation_id: &str,
) -> Result<(Negotiation, Party), ApiError> {
    let id = ObjectId::parse_str(negotiation_id)
        .map_err(|_| ApiError::BadRequest("Invalid negotiation_id".to_string()))?;
    let negotiation = state.negotiations.find_by_id(id).await?;
    let role = machine::role_of(&negotiation, auth.user_id)
        .ok_or_else(|| ApiError::Forbidden("Not a participant".to_string()))?;
    Ok((negotiation, role))
}

/// Loads the record and, when the ledger is still empty but the idea
/// carried an ask, synthesizes the founder opening offer first. No
/// party can act on a seeded negotiation before that entry exists.
async fn load_bootstrapped(
    state: &AppState,
    auth: &AuthUser,
    negotiation_id: &str,
) -> Result<(Negotiation, Party), ApiError> {
    let (negotiation, role) = load_for_participant(state, auth, negotiation_id).await?;
    let Some(opening) = machine::bootstrap_offer(&negotiation) else {
        return Ok((negotiation, role));
    };
    let id = negotiation.id.ok_or_else(|| {
        ApiError::Internal("Stored negotiation lost its id".to_string())
    })?;
    state.negotiations.push_opening_offer(id, &opening).await?;
    let negotiation = state.negotiations.find_by_id(id).await?;
    Ok((negotiation, role))
}

fn ensure_ongoing(negotiation: &Negotiation) -> Result<(), ApiError> {
    match machine::phase(negotiation.status) {
        Phase::Ongoing => Ok(()),
        Phase::Pending => Err(ApiError::Conflict(
            "Negotiation is awaiting founder approval".to_string(),
        )),
        Phase::Accepted | Phase::Declined => Err(ApiError::Conflict(
            "Negotiation already resolved".to_string(),
        )),
    }
}

fn map_responses(items: Vec<Negotiation>, viewer: Option<ObjectId>) -> Vec<NegotiationResponse> {
    items.into_iter().map(|n| to_response(n, viewer)).collect()
}

fn party_str(party: Party) -> String {
    format!("{:?}", party).to_lowercase()
}

fn to_response(n: Negotiation, viewer: Option<ObjectId>) -> NegotiationResponse {
    let my_role = viewer.and_then(|id| machine::role_of(&n, id));
    let my_turn = my_role.map(|role| machine::is_my_turn(&n, role));
    NegotiationResponse {
        id: n.id.map(|id| id.to_hex()).unwrap_or_default(),
        idea_id: n.idea_id.to_hex(),
        founder_id: n.founder_id.to_hex(),
        investor_id: n.investor_id.to_hex(),
        idea_title: n.idea_title,
        founder_name: n.founder_name,
        founder_username: n.founder_username,
        investor_name: n.investor_name,
        investor_username: n.investor_username,
        avatar: n.avatar,
        status: format!("{:?}", n.status).to_lowercase(),
        phase: format!("{:?}", machine::phase(n.status)).to_lowercase(),
        my_role: my_role.map(party_str),
        my_turn,
        offers: n
            .offers
            .iter()
            .map(|o| OfferResponse {
                investment: o.investment,
                equity: o.equity,
                by: party_str(o.by),
                created_at: o.created_at.try_to_rfc3339_string().unwrap_or_default(),
            })
            .collect(),
        idea_investment_details: n.idea_investment_details.map(|d| InvestmentDetailsResponse {
            target_investment: d.target_investment,
            equity_offered: d.equity_offered,
        }),
        created_at: n.created_at.try_to_rfc3339_string().unwrap_or_default(),
    }
}
