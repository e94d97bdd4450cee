//! Authenticated WebSocket feed. Each connection owns its own store
//! subscriptions, wrapped in the relay/board/deck controllers, and
//! forwards every published state as a JSON event. Closing the socket
//! tears all of them down; a listener must never outlive its screen.

use axum::{
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use bson::oid::ObjectId;
use futures::{SinkExt, StreamExt, stream::SplitSink};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use cofoundry_services::negotiation::{BoardSide, NegotiationBoard, NegotiationDeck, SortStrategy};
use cofoundry_services::relay::NotificationRelay;

use crate::state::AppState;

pub type WsSender = Arc<Mutex<SplitSink<WebSocket, Message>>>;

#[derive(Debug, Deserialize)]
pub struct WsParams {
    pub token: String,
}

pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsParams>,
    ws: WebSocketUpgrade,
) -> Response {
    // Verify the token before accepting the WebSocket
    let claims = match state.auth.verify_access_token(&params.token) {
        Ok(c) => c,
        Err(_) => {
            return Response::builder()
                .status(401)
                .body("Unauthorized".into())
                .unwrap();
        }
    };

    let user_id = match ObjectId::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => {
            return Response::builder()
                .status(400)
                .body("Invalid user ID".into())
                .unwrap();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, user_id: ObjectId) {
    let connection_id = Uuid::new_v4().to_string();
    info!(?user_id, %connection_id, "WebSocket connected");

    let (sender, mut receiver) = socket.split();
    let sender: WsSender = Arc::new(Mutex::new(sender));

    // The notification feeds are always on for a connected user.
    let relay =
        NotificationRelay::open(state.store.clone(), user_id, state.settings.relay.clone()).await;
    let relay_forward = spawn_forward(sender.clone(), relay.state(), "relay:state");

    let mut board: Option<(NegotiationBoard, JoinHandle<()>)> = None;
    let mut deck: Option<(NegotiationDeck, JoinHandle<()>)> = None;

    send_event(
        &sender,
        "connected",
        serde_json::json!({ "user_id": user_id.to_hex() }),
    )
    .await;

    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                handle_client_message(&state, user_id, &sender, &text, &mut board, &mut deck)
                    .await;
            }
            Ok(Message::Ping(data)) => {
                let mut guard = sender.lock().await;
                let _ = guard.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) => {
                break;
            }
            Err(e) => {
                warn!(?user_id, %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    // Teardown: every subscription this socket opened stops here.
    relay_forward.abort();
    relay.close();
    if let Some((controller, forward)) = board.take() {
        forward.abort();
        controller.close();
    }
    if let Some((controller, forward)) = deck.take() {
        forward.abort();
        controller.close();
    }

    info!(?user_id, %connection_id, "WebSocket disconnected");
}

async fn handle_client_message(
    state: &AppState,
    user_id: ObjectId,
    sender: &WsSender,
    text: &str,
    board: &mut Option<(NegotiationBoard, JoinHandle<()>)>,
    deck: &mut Option<(NegotiationDeck, JoinHandle<()>)>,
) {
    let parsed: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(_) => return,
    };

    let msg_type = parsed.get("type").and_then(|t| t.as_str()).unwrap_or("");
    let data = parsed.get("data");

    debug!(?user_id, msg_type, "WS message received");

    match msg_type {
        "ping" => {
            send_event(sender, "pong", serde_json::Value::Null).await;
        }
        "board:open" => {
            let side = match data.and_then(|d| d.get("side")).and_then(|s| s.as_str()) {
                Some("founder") => BoardSide::Founder,
                Some("investor") => BoardSide::Investor,
                _ => {
                    send_error(sender, "Invalid board side").await;
                    return;
                }
            };
            let strategy = match data
                .and_then(|d| d.get("strategy"))
                .and_then(|s| s.as_str())
            {
                None | Some("recency") => SortStrategy::Recency,
                Some("status_priority") => SortStrategy::StatusPriority,
                Some(_) => {
                    send_error(sender, "Invalid sort strategy").await;
                    return;
                }
            };

            close_slot(board);
            match NegotiationBoard::open(state.store.as_ref(), user_id, side, strategy).await {
                Ok(controller) => {
                    let forward = spawn_forward(sender.clone(), controller.state(), "board:state");
                    *board = Some((controller, forward));
                }
                Err(e) => send_error(sender, &format!("Board subscription failed: {e}")).await,
            }
        }
        "board:close" => {
            close_slot(board);
        }
        "deck:open" => {
            let negotiation_id = match data
                .and_then(|d| d.get("negotiation_id"))
                .and_then(|s| s.as_str())
                .and_then(|s| ObjectId::parse_str(s).ok())
            {
                Some(id) => id,
                None => {
                    send_error(sender, "Invalid negotiation_id").await;
                    return;
                }
            };

            let negotiation = match state.negotiations.find_by_id(negotiation_id).await {
                Ok(n) => n,
                Err(e) => {
                    send_error(sender, &format!("Negotiation lookup failed: {e}")).await;
                    return;
                }
            };

            close_slot(deck);
            match NegotiationDeck::open(state.store.clone(), user_id, negotiation).await {
                Ok(controller) => {
                    let forward = spawn_forward(sender.clone(), controller.state(), "deck:state");
                    *deck = Some((controller, forward));
                }
                Err(e) => send_error(sender, &format!("Deck open failed: {e}")).await,
            }
        }
        "deck:close" => {
            close_slot(deck);
        }
        _ => {
            debug!(?user_id, msg_type, "Unknown WS message type");
        }
    }
}

/// Forwards every published state of a watch channel as one JSON event,
/// starting with the current value.
fn spawn_forward<T>(
    sender: WsSender,
    mut rx: watch::Receiver<T>,
    event: &'static str,
) -> JoinHandle<()>
where
    T: serde::Serialize + Send + Sync + 'static,
{
    tokio::spawn(async move {
        loop {
            let payload = {
                let current = rx.borrow_and_update();
                serde_json::to_value(&*current).unwrap_or(serde_json::Value::Null)
            };
            let msg = serde_json::json!({ "type": event, "data": payload });
            let text = match serde_json::to_string(&msg) {
                Ok(t) => t,
                Err(_) => break,
            };
            {
                let mut guard = sender.lock().await;
                if guard.send(Message::text(text)).await.is_err() {
                    break;
                }
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
    })
}

fn close_slot<C>(slot: &mut Option<(C, JoinHandle<()>)>) {
    if let Some((controller, forward)) = slot.take() {
        forward.abort();
        drop(controller);
    }
}

async fn send_event(sender: &WsSender, event: &str, data: serde_json::Value) {
    let msg = serde_json::json!({ "type": event, "data": data });
    if let Ok(text) = serde_json::to_string(&msg) {
        let mut guard = sender.lock().await;
        let _ = guard.send(Message::text(text)).await;
    }
}

async fn send_error(sender: &WsSender, message: &str) {
    send_event(sender, "error", serde_json::json!({ "message": message })).await;
}
