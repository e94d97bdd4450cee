use std::time::Duration;

use crate::fixtures::test_app::TestApp;
use cofoundry_db::models::NegotiationStatus;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message,
};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

async fn connect(app: &TestApp, token: &str) -> WsStream {
    let (stream, _) = connect_async(app.ws_url(token))
        .await
        .expect("WebSocket connect failed");
    stream
}

async fn send_json(stream: &mut WsStream, value: Value) {
    stream
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("WS send failed");
}

/// Reads events until one of `event` satisfies `pred`, or the deadline
/// passes. Unrelated event types are skipped.
async fn wait_for(
    stream: &mut WsStream,
    event: &str,
    timeout: Duration,
    pred: impl Fn(&Value) -> bool,
) -> Option<Value> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if remaining.is_zero() {
            return None;
        }
        let msg = match tokio::time::timeout(remaining, stream.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => text,
            Ok(Some(Ok(_))) => continue,
            _ => return None,
        };
        let parsed: Value = match serde_json::from_str(&msg) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if parsed["type"] == event && pred(&parsed["data"]) {
            return Some(parsed["data"].clone());
        }
    }
}

#[tokio::test]
async fn board_feed_pushes_snapshots_until_closed() {
    let app = TestApp::spawn().await;
    let fx = app.seed_negotiation("wsboard", NegotiationStatus::Active).await;

    let mut ws = connect(&app, &fx.founder.access_token).await;
    assert!(
        wait_for(&mut ws, "connected", Duration::from_secs(2), |_| true)
            .await
            .is_some()
    );

    send_json(
        &mut ws,
        serde_json::json!({ "type": "board:open", "data": { "side": "founder" } }),
    )
    .await;

    // Initial snapshot: one ongoing negotiation.
    let board = wait_for(&mut ws, "board:state", Duration::from_secs(2), |data| {
        data["buckets"]["recency"]["ongoing"]
            .as_array()
            .map(|b| b.len() == 1)
            .unwrap_or(false)
    })
    .await;
    assert!(board.is_some(), "no initial board snapshot");

    // A write from the other side pushes a fresh snapshot: the
    // bootstrap entry plus the investor's counter.
    let nid = fx.negotiation.id.unwrap().to_hex();
    let resp = app
        .auth_post(
            &format!("/api/negotiation/{nid}/offer"),
            &fx.investor.access_token,
        )
        .json(&serde_json::json!({ "investment": 420_000.0, "equity": 11.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    // Both feeds react: a fresh board snapshot and the counterparty
    // notification. Their relative order over the socket is not fixed,
    // so collect until both were seen.
    let mut saw_board = false;
    let mut saw_relay = false;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !(saw_board && saw_relay) {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        assert!(!remaining.is_zero(), "feeds never converged after the offer");
        let Ok(Some(Ok(Message::Text(text)))) =
            tokio::time::timeout(remaining, ws.next()).await
        else {
            continue;
        };
        let Ok(parsed) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        if parsed["type"] == "board:state"
            && parsed["data"]["buckets"]["recency"]["ongoing"][0]["offers"]
                .as_array()
                .map(|o| o.len() == 2)
                .unwrap_or(false)
        {
            saw_board = true;
        }
        if parsed["type"] == "relay:state"
            && parsed["data"]["unread"].as_u64().map(|n| n >= 1).unwrap_or(false)
        {
            saw_relay = true;
        }
    }

    // After board:close, further writes must not reach this screen.
    send_json(&mut ws, serde_json::json!({ "type": "board:close" })).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let resp = app
        .auth_post(
            &format!("/api/negotiation/{nid}/offer"),
            &fx.founder.access_token,
        )
        .json(&serde_json::json!({ "investment": 460_000.0, "equity": 10.5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let late = wait_for(&mut ws, "board:state", Duration::from_millis(400), |_| true).await;
    assert!(late.is_none(), "board feed leaked past close");

    ws.close(None).await.ok();
}

#[tokio::test]
async fn deck_feed_bootstraps_and_tracks_resolution() {
    let app = TestApp::spawn().await;
    let fx = app.seed_negotiation("wsdeck", NegotiationStatus::Active).await;
    let nid = fx.negotiation.id.unwrap().to_hex();

    let mut ws = connect(&app, &fx.investor.access_token).await;
    assert!(
        wait_for(&mut ws, "connected", Duration::from_secs(2), |_| true)
            .await
            .is_some()
    );

    send_json(
        &mut ws,
        serde_json::json!({ "type": "deck:open", "data": { "negotiation_id": nid } }),
    )
    .await;

    // The opening offer is synthesized from the idea's ask as soon as
    // the deck opens over the empty ledger.
    let deck = wait_for(&mut ws, "deck:state", Duration::from_secs(2), |data| {
        data["negotiation"]["offers"]
            .as_array()
            .map(|o| o.len() == 1)
            .unwrap_or(false)
    })
    .await;
    let deck = deck.expect("no bootstrap deck snapshot");
    assert_eq!(deck["phase"], "ongoing");
    assert_eq!(deck["my_turn"], true);

    // Resolution through the HTTP surface converges on the deck feed.
    let resp = app
        .auth_post(
            &format!("/api/negotiation/{nid}/accept"),
            &fx.investor.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let resolved = wait_for(&mut ws, "deck:state", Duration::from_secs(2), |data| {
        data["phase"] == "accepted"
    })
    .await;
    assert!(resolved.is_some(), "deck never converged on acceptance");

    // Closing the deck stops its feed; the negotiation record is
    // terminal anyway, but the listener must be gone.
    send_json(&mut ws, serde_json::json!({ "type": "deck:close" })).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let late = wait_for(&mut ws, "deck:state", Duration::from_millis(300), |_| true).await;
    assert!(late.is_none(), "deck feed leaked past close");

    ws.close(None).await.ok();
}
