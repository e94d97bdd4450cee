use crate::fixtures::test_app::TestApp;
use cofoundry_db::models::NegotiationStatus;
use serde_json::Value;

#[tokio::test]
async fn full_negotiation_lifecycle() {
    let app = TestApp::spawn().await;
    let founder = app.seed_user("mara@example.com", "mara", "Mara").await;
    let investor = app.seed_user("jonas@example.com", "jonas", "Jonas").await;
    let idea = app.seed_idea(&founder, "AI beekeeping", 500_000.0, 10.0).await;

    // Investor opens a negotiation on the idea.
    let resp = app
        .auth_post("/api/negotiation", &investor.access_token)
        .json(&serde_json::json!({ "idea_id": idea.id.unwrap().to_hex() }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let negotiation: Value = resp.json().await.unwrap();
    assert_eq!(negotiation["phase"], "pending");
    let nid = negotiation["id"].as_str().unwrap().to_string();

    // Founder approves.
    let resp = app
        .auth_post(
            &format!("/api/negotiation/{nid}/approve"),
            &founder.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let approved: Value = resp.json().await.unwrap();
    assert_eq!(approved["phase"], "ongoing");

    // Investor counters. The founder opening offer is synthesized from
    // the idea's ask before the investor's entry lands.
    let resp = app
        .auth_post(
            &format!("/api/negotiation/{nid}/offer"),
            &investor.access_token,
        )
        .json(&serde_json::json!({ "investment": 400_000.0, "equity": 12.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let countered: Value = resp.json().await.unwrap();
    let offers = countered["offers"].as_array().unwrap();
    assert_eq!(offers.len(), 2);
    assert_eq!(offers[0]["by"], "founder");
    assert_eq!(offers[0]["investment"], 500_000.0);
    assert_eq!(offers[0]["equity"], 10.0);
    assert_eq!(offers[1]["by"], "investor");
    assert_eq!(countered["my_turn"], false);

    // Founder accepts the investor's counter.
    let resp = app
        .auth_post(
            &format!("/api/negotiation/{nid}/accept"),
            &founder.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let accepted: Value = resp.json().await.unwrap();
    assert_eq!(accepted["phase"], "accepted");
    assert_eq!(accepted["status"], "accepted");
}

#[tokio::test]
async fn opening_offer_exists_before_any_investor_action() {
    let app = TestApp::spawn().await;
    let fx = app.seed_negotiation("bootstrap", NegotiationStatus::Active).await;
    let nid = fx.negotiation.id.unwrap().to_hex();

    // The investor's very first possible action is accepting the
    // synthesized founder ask.
    let resp = app
        .auth_post(
            &format!("/api/negotiation/{nid}/accept"),
            &fx.investor.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
    let accepted: Value = resp.json().await.unwrap();

    let offers = accepted["offers"].as_array().unwrap();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0]["by"], "founder");
    assert_eq!(offers[0]["investment"], 500_000.0);
    assert_eq!(offers[0]["equity"], 10.0);
    assert_eq!(accepted["phase"], "accepted");
}

#[tokio::test]
async fn out_of_turn_submission_returns_403() {
    let app = TestApp::spawn().await;
    let fx = app.seed_negotiation("turns", NegotiationStatus::Active).await;
    let nid = fx.negotiation.id.unwrap().to_hex();

    // First investor offer lands (after the synthesized opening).
    let resp = app
        .auth_post(
            &format!("/api/negotiation/{nid}/offer"),
            &fx.investor.access_token,
        )
        .json(&serde_json::json!({ "investment": 450_000.0, "equity": 11.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    // Submitting again without a founder reply is out of turn.
    let resp = app
        .auth_post(
            &format!("/api/negotiation/{nid}/offer"),
            &fx.investor.access_token,
        )
        .json(&serde_json::json!({ "investment": 440_000.0, "equity": 11.5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    // The founder replies fine.
    let resp = app
        .auth_post(
            &format!("/api/negotiation/{nid}/offer"),
            &fx.founder.access_token,
        )
        .json(&serde_json::json!({ "investment": 480_000.0, "equity": 10.5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);
}

#[tokio::test]
async fn out_of_range_offers_change_nothing() {
    let app = TestApp::spawn().await;
    let fx = app.seed_negotiation("bounds", NegotiationStatus::Active).await;
    let nid = fx.negotiation.id.unwrap().to_hex();

    for (investment, equity) in [(500_000.0, 0.0), (500_000.0, 100.0), (0.0, 15.0)] {
        let resp = app
            .auth_post(
                &format!("/api/negotiation/{nid}/offer"),
                &fx.investor.access_token,
            )
            .json(&serde_json::json!({ "investment": investment, "equity": equity }))
            .send()
            .await
            .unwrap();
        // Deliberately not an error: the unchanged record comes back.
        assert_eq!(resp.status().as_u16(), 200);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["offers"].as_array().unwrap().len(), 1);
    }

    let resp = app
        .auth_post(
            &format!("/api/negotiation/{nid}/offer"),
            &fx.investor.access_token,
        )
        .json(&serde_json::json!({ "investment": 500_000.0, "equity": 15.0 }))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["offers"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn terminal_states_are_monotonic() {
    let app = TestApp::spawn().await;
    let fx = app.seed_negotiation("terminal", NegotiationStatus::Active).await;
    let nid = fx.negotiation.id.unwrap().to_hex();

    let resp = app
        .auth_post(
            &format!("/api/negotiation/{nid}/accept"),
            &fx.investor.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    // No further offers from either side, turn state irrelevant.
    for token in [&fx.founder.access_token, &fx.investor.access_token] {
        let resp = app
            .auth_post(&format!("/api/negotiation/{nid}/offer"), token)
            .json(&serde_json::json!({ "investment": 100_000.0, "equity": 5.0 }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 409);
    }

    // Nor a second resolution.
    let resp = app
        .auth_post(
            &format!("/api/negotiation/{nid}/decline"),
            &fx.founder.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);
}

#[tokio::test]
async fn pending_negotiations_are_founder_gated() {
    let app = TestApp::spawn().await;
    let fx = app.seed_negotiation("gate", NegotiationStatus::Pending).await;
    let nid = fx.negotiation.id.unwrap().to_hex();

    // The investor may not approve their own request.
    let resp = app
        .auth_post(
            &format!("/api/negotiation/{nid}/approve"),
            &fx.investor.access_token,
        )
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    // Offers are locked until approval.
    let resp = app
        .auth_post(
            &format!("/api/negotiation/{nid}/offer"),
            &fx.investor.access_token,
        )
        .json(&serde_json::json!({ "investment": 400_000.0, "equity": 12.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 409);

    // Founder rejects; the record is terminal.
    let resp = app
        .auth_post(
            &format!("/api/negotiation/{nid}/reject"),
            &fx.founder.access_token,
        )
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["phase"], "declined");
}

#[tokio::test]
async fn outsiders_get_403() {
    let app = TestApp::spawn().await;
    let fx = app.seed_negotiation("outsider", NegotiationStatus::Active).await;
    let outsider = app.seed_user("sam@example.com", "sam", "Sam").await;
    let nid = fx.negotiation.id.unwrap().to_hex();

    let resp = app
        .auth_get(&format!("/api/negotiation/{nid}"), &outsider.access_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);

    let resp = app
        .auth_post(
            &format!("/api/negotiation/{nid}/offer"),
            &outsider.access_token,
        )
        .json(&serde_json::json!({ "investment": 100_000.0, "equity": 5.0 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 403);
}

#[tokio::test]
async fn founders_cannot_invest_in_their_own_idea() {
    let app = TestApp::spawn().await;
    let founder = app.seed_user("ada@example.com", "ada", "Ada").await;
    let idea = app.seed_idea(&founder, "Robots", 100_000.0, 5.0).await;

    let resp = app
        .auth_post("/api/negotiation", &founder.access_token)
        .json(&serde_json::json!({ "idea_id": idea.id.unwrap().to_hex() }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}
