pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod ws;

use axum::{
    Router,
    routing::{get, post},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Negotiation routes
    let negotiation_routes = Router::new()
        .route("/", post(routes::negotiation::create))
        .route("/board", get(routes::negotiation::board))
        .route("/{negotiation_id}", get(routes::negotiation::get))
        .route("/{negotiation_id}/approve", post(routes::negotiation::approve))
        .route("/{negotiation_id}/reject", post(routes::negotiation::reject))
        .route("/{negotiation_id}/offer", post(routes::negotiation::submit_offer))
        .route("/{negotiation_id}/accept", post(routes::negotiation::accept))
        .route("/{negotiation_id}/decline", post(routes::negotiation::decline));

    // Notification routes
    let notification_routes = Router::new()
        .route("/", get(routes::notification::list))
        .route("/unread", get(routes::notification::unread_count))
        .route("/read-all", post(routes::notification::mark_all_read))
        .route("/{notification_id}/read", post(routes::notification::mark_read))
        .route("/{notification_id}/respond", post(routes::notification::respond));

    // Connection request routes
    let connection_routes = Router::new()
        .route("/", post(routes::connection_request::create))
        .route("/{request_id}/respond", post(routes::connection_request::respond));

    // Idea join request routes
    let join_routes = Router::new()
        .route("/", post(routes::join_request::create))
        .route("/{request_id}/respond", post(routes::join_request::respond));

    // Profile lookups
    let profile_routes = Router::new()
        .route("/user/{user_id}", get(routes::profile::get_user))
        .route("/idea/{idea_id}", get(routes::profile::get_idea));

    let api = Router::new()
        .nest("/negotiation", negotiation_routes)
        .nest("/notification", notification_routes)
        .nest("/connection", connection_routes)
        .nest("/join-request", join_routes)
        .merge(profile_routes);

    // Health check
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api)
        .merge(health)
        .route("/ws", get(ws::handler::ws_upgrade))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
