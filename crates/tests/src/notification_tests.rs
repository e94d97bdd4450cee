use crate::fixtures::test_app::TestApp;
use cofoundry_services::RealtimeStore;
use bson::DateTime;
use bson::oid::ObjectId;
use serde_json::Value;

fn feed_doc(user_id: ObjectId, notification_type: &str) -> bson::Document {
    bson::doc! {
        "user_id": user_id,
        "notification_type": notification_type,
        "title": "Title",
        "body": "Body",
        "data": {},
        "is_read": false,
        "timestamp": DateTime::now(),
        "created_at": DateTime::now(),
    }
}

#[tokio::test]
async fn ingestion_drops_broken_records_and_repairs_coercible_ones() {
    let app = TestApp::spawn().await;
    let user = app.seed_user("nina@example.com", "nina", "Nina").await;

    // Healthy record.
    app.store
        .insert("notifications", feed_doc(user.id, "message"))
        .await
        .unwrap();

    // Legacy string id: no usable identity, must be dropped.
    let mut doc = feed_doc(user.id, "message");
    doc.insert("_id", "legacy-key-123");
    app.store.insert("notifications", doc).await.unwrap();

    // Unusable primary timestamp: dropped.
    let mut doc = feed_doc(user.id, "message");
    doc.insert("timestamp", "yesterday-ish");
    app.store.insert("notifications", doc).await.unwrap();

    // Epoch-millis timestamp and garbage responded_at: repaired, kept.
    let mut doc = feed_doc(user.id, "connection_request");
    doc.insert("timestamp", 1_700_000_000_000i64);
    doc.insert(
        "data",
        bson::doc! { "request_id": ObjectId::new(), "responded_at": "garbage" },
    );
    app.store.insert("notifications", doc).await.unwrap();

    let resp = app
        .auth_get("/api/notification", &user.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let body: Value = resp.json().await.unwrap();
    let items = body["items"].as_array().unwrap();

    assert_eq!(items.len(), 2);
    let repaired = items
        .iter()
        .find(|n| n["notification_type"] == "connection_request")
        .expect("repaired record survives");
    assert!(repaired["data"].get("responded_at").is_none());
    assert!(!repaired["id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn respond_retries_once_after_injected_failure() {
    let app = TestApp::spawn().await;
    let from = app.seed_user("from@example.com", "from_user", "From").await;
    let to = app.seed_user("to@example.com", "to_user", "To").await;

    let request = app
        .state
        .connections
        .create(&from.user, to.id, Some("hello".to_string()))
        .await
        .unwrap();
    let request_id = request.id.unwrap();

    // The actionable notification created for the target.
    let resp = app
        .auth_get("/api/notification", &to.access_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let notification_id = body["items"][0]["id"].as_str().unwrap().to_string();

    // First mutation attempt fails; the flow retries exactly once.
    app.store.fail_next_writes(1);
    let resp = app
        .auth_post(
            &format!("/api/notification/{notification_id}/respond"),
            &to.access_token,
        )
        .json(&serde_json::json!({
            "request_type": "connection",
            "request_id": request_id.to_hex(),
            "approve": true,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let outcome: Value = resp.json().await.unwrap();
    assert_eq!(outcome["status"], "approved");
    assert_eq!(outcome["retried"], true);

    // Terminal state: request approved, notification patched and read.
    let request = app
        .state
        .connections
        .respond(request_id, to.id, true)
        .await;
    assert!(request.is_err(), "second resolution must conflict");

    let resp = app
        .auth_get("/api/notification", &to.access_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let patched = &body["items"][0];
    assert_eq!(patched["data"]["response_status"], "approved");
    assert!(patched["data"].get("responded_at").is_some());
    assert_eq!(patched["is_read"], true);
}

#[tokio::test]
async fn respond_surfaces_error_after_second_failure() {
    let app = TestApp::spawn().await;
    let from = app.seed_user("from2@example.com", "from2", "From2").await;
    let to = app.seed_user("to2@example.com", "to2", "To2").await;

    let request = app
        .state
        .connections
        .create(&from.user, to.id, None)
        .await
        .unwrap();

    let resp = app
        .auth_get("/api/notification", &to.access_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let notification_id = body["items"][0]["id"].as_str().unwrap().to_string();

    // Both the attempt and its single retry fail.
    app.store.fail_next_writes(2);
    let resp = app
        .auth_post(
            &format!("/api/notification/{notification_id}/respond"),
            &to.access_token,
        )
        .json(&serde_json::json!({
            "request_type": "connection",
            "request_id": request.id.unwrap().to_hex(),
            "approve": true,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 500);

    // Nothing was patched; the request is still pending.
    let resp = app
        .auth_get("/api/notification", &to.access_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    let untouched = &body["items"][0];
    assert!(untouched["data"].get("response_status").is_none());
    assert_eq!(untouched["is_read"], false);
}

#[tokio::test]
async fn mark_read_is_idempotent_and_scoped_to_the_owner() {
    let app = TestApp::spawn().await;
    let owner = app.seed_user("owner@example.com", "owner", "Owner").await;
    let stranger = app.seed_user("str@example.com", "stranger", "Str").await;

    let id = app
        .store
        .insert("notifications", feed_doc(owner.id, "message"))
        .await
        .unwrap();

    for _ in 0..2 {
        let resp = app
            .auth_post(
                &format!("/api/notification/{}/read", id.to_hex()),
                &owner.access_token,
            )
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 200);
    }

    let resp = app
        .auth_post(
            &format!("/api/notification/{}/read", id.to_hex()),
            &stranger.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn mark_all_read_is_one_bulk_operation() {
    let app = TestApp::spawn().await;
    let user = app.seed_user("bulk@example.com", "bulk", "Bulk").await;

    for _ in 0..3 {
        app.store
            .insert("notifications", feed_doc(user.id, "message"))
            .await
            .unwrap();
    }

    let resp = app
        .auth_get("/api/notification/unread", &user.access_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 3);

    let resp = app
        .auth_post("/api/notification/read-all", &user.access_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["updated"], 3);

    let resp = app
        .auth_get("/api/notification/unread", &user.access_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn match_alerts_render_only_under_all() {
    let app = TestApp::spawn().await;
    let user = app.seed_user("sections@example.com", "sections", "Sec").await;

    app.store
        .insert("notifications", feed_doc(user.id, "match_alert"))
        .await
        .unwrap();
    app.store
        .insert("notifications", feed_doc(user.id, "connection_request"))
        .await
        .unwrap();

    let resp = app
        .auth_get("/api/notification?section=all", &user.access_token)
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["items"].as_array().unwrap().len(), 2);

    let match_alert = body["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["notification_type"] == "match_alert")
        .unwrap();
    assert!(match_alert["section"].is_null());

    for section in ["connections", "messages", "negotiations", "join_requests"] {
        let resp = app
            .auth_get(
                &format!("/api/notification?section={section}"),
                &user.access_token,
            )
            .send()
            .await
            .unwrap();
        let body: Value = resp.json().await.unwrap();
        let items = body["items"].as_array().unwrap();
        assert!(
            items.iter().all(|n| n["notification_type"] != "match_alert"),
            "match_alert leaked into {section}"
        );
    }
}
