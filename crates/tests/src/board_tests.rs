use crate::fixtures::{seed::SeededUser, test_app::TestApp};
use bson::DateTime;
use cofoundry_db::models::{NegotiationStatus, Offer, Party};
use serde_json::Value;

/// Seeds one founder with `statuses.len()` negotiations (distinct ideas,
/// one investor), applied in order. Returns hex ids in creation order.
async fn seed_many(
    app: &TestApp,
    founder: &SeededUser,
    investor: &SeededUser,
    statuses: &[NegotiationStatus],
) -> Vec<String> {
    let mut ids = Vec::new();
    for (i, status) in statuses.iter().enumerate() {
        let idea = app
            .seed_idea(founder, &format!("Idea {i}"), 100_000.0, 8.0)
            .await;
        let negotiation = app
            .state
            .negotiations
            .create(&idea, &founder.user, &investor.user)
            .await
            .unwrap();
        let id = negotiation.id.unwrap();
        if *status != NegotiationStatus::Pending {
            app.state.negotiations.set_status(id, *status).await.unwrap();
        }
        ids.push(id.to_hex());
    }
    ids
}

fn bucket_ids(board: &Value, bucket: &str) -> Vec<String> {
    board["buckets"][bucket]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn recency_board_is_a_total_non_overlapping_split() {
    let app = TestApp::spawn().await;
    let founder = app.seed_user("f1@example.com", "f1", "Founder One").await;
    let investor = app.seed_user("i1@example.com", "i1", "Investor One").await;

    let ids = seed_many(
        &app,
        &founder,
        &investor,
        &[
            NegotiationStatus::Active,
            NegotiationStatus::Accepted,
            NegotiationStatus::Declined,
            NegotiationStatus::Pending,
            NegotiationStatus::Active,
        ],
    )
    .await;

    let resp = app
        .auth_get("/api/negotiation/board?side=founder", &founder.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let board: Value = resp.json().await.unwrap();

    let ongoing = bucket_ids(&board, "ongoing");
    let accepted = bucket_ids(&board, "accepted");
    let declined = bucket_ids(&board, "declined");

    assert_eq!(ongoing.len(), 2);
    assert_eq!(accepted.len(), 1);
    assert_eq!(declined.len(), 1);

    // Every non-pending negotiation appears in exactly one bucket; the
    // pending one in none.
    let mut all: Vec<String> = ongoing
        .iter()
        .chain(accepted.iter())
        .chain(declined.iter())
        .cloned()
        .collect();
    all.sort();
    all.dedup();
    assert_eq!(all.len(), 4);
    assert!(!all.contains(&ids[3]));
}

#[tokio::test]
async fn recency_ordering_follows_latest_offer() {
    let app = TestApp::spawn().await;
    let founder = app.seed_user("f2@example.com", "f2", "Founder Two").await;
    let investor = app.seed_user("i2@example.com", "i2", "Investor Two").await;

    let ids = seed_many(
        &app,
        &founder,
        &investor,
        &[NegotiationStatus::Active, NegotiationStatus::Active],
    )
    .await;

    // A fresh offer on the older negotiation bumps it to the top.
    let future = DateTime::from_millis(DateTime::now().timestamp_millis() + 60_000);
    app.state
        .negotiations
        .push_offer(
            bson::oid::ObjectId::parse_str(&ids[0]).unwrap(),
            &Offer {
                investment: 120_000.0,
                equity: 7.0,
                by: Party::Investor,
                created_at: future,
            },
        )
        .await
        .unwrap();

    let resp = app
        .auth_get("/api/negotiation/board?side=founder", &founder.access_token)
        .send()
        .await
        .unwrap();
    let board: Value = resp.json().await.unwrap();
    let ongoing = bucket_ids(&board, "ongoing");
    assert_eq!(ongoing[0], ids[0]);
    assert_eq!(ongoing[1], ids[1]);
}

#[tokio::test]
async fn founder_view_orders_by_status_priority_not_recency() {
    let app = TestApp::spawn().await;
    let founder = app.seed_user("f3@example.com", "f3", "Founder Three").await;
    let investor = app.seed_user("i3@example.com", "i3", "Investor Three").await;

    // Created as declined, active, accepted; must render as active,
    // accepted, declined.
    let ids = seed_many(
        &app,
        &founder,
        &investor,
        &[
            NegotiationStatus::Declined,
            NegotiationStatus::Active,
            NegotiationStatus::Accepted,
        ],
    )
    .await;

    let resp = app
        .auth_get(
            "/api/negotiation/board?side=founder&strategy=status_priority",
            &founder.access_token,
        )
        .send()
        .await
        .unwrap();
    let board: Value = resp.json().await.unwrap();

    let resolved = bucket_ids(&board, "resolved");
    assert_eq!(resolved, vec![ids[1].clone(), ids[2].clone(), ids[0].clone()]);

    let statuses: Vec<&str> = board["buckets"]["resolved"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["status"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["active", "accepted", "declined"]);
}

#[tokio::test]
async fn pending_bucket_keeps_insertion_order() {
    let app = TestApp::spawn().await;
    let founder = app.seed_user("f4@example.com", "f4", "Founder Four").await;
    let investor = app.seed_user("i4@example.com", "i4", "Investor Four").await;

    let ids = seed_many(
        &app,
        &founder,
        &investor,
        &[NegotiationStatus::Pending, NegotiationStatus::Pending],
    )
    .await;

    let resp = app
        .auth_get(
            "/api/negotiation/board?side=founder&strategy=status_priority",
            &founder.access_token,
        )
        .send()
        .await
        .unwrap();
    let board: Value = resp.json().await.unwrap();
    assert_eq!(bucket_ids(&board, "pending"), ids);
}

#[tokio::test]
async fn attention_banner_lists_investor_latest_offers_only() {
    let app = TestApp::spawn().await;
    let founder = app.seed_user("f5@example.com", "f5", "Founder Five").await;
    let investor = app.seed_user("i5@example.com", "i5", "Investor Five").await;

    let ids = seed_many(
        &app,
        &founder,
        &investor,
        &[NegotiationStatus::Active, NegotiationStatus::Active],
    )
    .await;

    let now = DateTime::now();
    // First negotiation: ball in the founder's court.
    app.state
        .negotiations
        .push_offer(
            bson::oid::ObjectId::parse_str(&ids[0]).unwrap(),
            &Offer {
                investment: 90_000.0,
                equity: 6.0,
                by: Party::Investor,
                created_at: now,
            },
        )
        .await
        .unwrap();
    // Second: founder already replied.
    app.state
        .negotiations
        .push_offer(
            bson::oid::ObjectId::parse_str(&ids[1]).unwrap(),
            &Offer {
                investment: 95_000.0,
                equity: 6.5,
                by: Party::Founder,
                created_at: now,
            },
        )
        .await
        .unwrap();

    let resp = app
        .auth_get("/api/negotiation/board?side=founder", &founder.access_token)
        .send()
        .await
        .unwrap();
    let board: Value = resp.json().await.unwrap();

    let attention: Vec<&str> = board["needs_attention"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["id"].as_str().unwrap())
        .collect();
    assert_eq!(attention, vec![ids[0].as_str()]);
}

#[tokio::test]
async fn investor_side_sees_only_their_negotiations() {
    let app = TestApp::spawn().await;
    let fx = app.seed_negotiation("mine", NegotiationStatus::Active).await;
    let other = app.seed_negotiation("other", NegotiationStatus::Active).await;

    let resp = app
        .auth_get(
            "/api/negotiation/board?side=investor",
            &fx.investor.access_token,
        )
        .send()
        .await
        .unwrap();
    let board: Value = resp.json().await.unwrap();
    let ongoing = bucket_ids(&board, "ongoing");

    assert_eq!(ongoing, vec![fx.negotiation.id.unwrap().to_hex()]);
    assert!(!ongoing.contains(&other.negotiation.id.unwrap().to_hex()));
}
