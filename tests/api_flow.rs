//! Project API over a real socket.

use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{json, Value};

use collab_gateway::config::ExistenceCheck;

mod common;

#[tokio::test]
async fn create_lock_unlock_scenario() {
    let gw = common::spawn_gateway(ExistenceCheck::Strict).await;
    let client = reqwest::Client::new();
    let (token, key) = gw.create_project().await;

    let res = client
        .post(gw.http(&format!("/projects/{token}/lock")))
        .json(&json!({ "ownerKey": key }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "ok": true }));

    let view: Value = client
        .get(gw.http(&format!("/projects/{token}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["token"], json!(token));
    assert_eq!(view["locked"], json!(true));
    assert!(view["lastActivityAt"].as_u64().unwrap() > 0);
    assert!(view.get("ownerKey").is_none());

    let res = client
        .post(gw.http(&format!("/projects/{token}/unlock")))
        .json(&json!({ "ownerKey": "zz" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "error": "forbidden" }));

    let view: Value = client
        .get(gw.http(&format!("/projects/{token}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["locked"], json!(true));

    let res = client
        .post(gw.http(&format!("/projects/{token}/unlock")))
        .json(&json!({ "ownerKey": key }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let view: Value = client
        .get(gw.http(&format!("/projects/{token}")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["locked"], json!(false));
}

#[tokio::test]
async fn lock_with_wrong_key_is_forbidden_and_changes_nothing() {
    let gw = common::spawn_gateway(ExistenceCheck::Strict).await;
    let client = reqwest::Client::new();
    let (token, _key) = gw.create_project().await;

    for body in [json!({ "ownerKey": "not-the-key" }), json!({})] {
        let res = client
            .post(gw.http(&format!("/projects/{token}/lock")))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(res.json::<Value>().await.unwrap(), json!({ "error": "forbidden" }));
    }

    let view = common::project(&gw, &token).await.unwrap();
    assert_eq!(view["locked"], json!(false));
}

#[tokio::test]
async fn tokens_are_unique_and_keys_differ() {
    let gw = common::spawn_gateway(ExistenceCheck::Strict).await;
    let (t1, k1) = gw.create_project().await;
    let (t2, k2) = gw.create_project().await;
    assert_ne!(t1, t2);
    assert_ne!(k1, k2);
    assert!(k1.len() >= 22, "owner key must carry at least 128 bits");
}

#[tokio::test]
async fn unknown_project_is_404_everywhere() {
    let gw = common::spawn_gateway(ExistenceCheck::Strict).await;
    let client = reqwest::Client::new();

    let res = client.get(gw.http("/projects/missing")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    for action in ["lock", "unlock"] {
        let res = client
            .post(gw.http(&format!("/projects/missing/{action}")))
            .json(&json!({ "ownerKey": "whatever" }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND, "{action}");
    }
}

#[tokio::test]
async fn concurrent_lock_requests_with_valid_key_all_succeed() {
    let gw = common::spawn_gateway(ExistenceCheck::Strict).await;
    let (token, key) = gw.create_project().await;
    let client = reqwest::Client::new();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        let url = gw.http(&format!("/projects/{token}/lock"));
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            client
                .post(url)
                .json(&json!({ "ownerKey": key }))
                .send()
                .await
                .unwrap()
                .status()
        }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap(), StatusCode::OK);
    }
}

#[tokio::test]
async fn store_outage_is_a_bare_server_error() {
    let config = common::test_config(ExistenceCheck::Strict);
    let gw = common::spawn_gateway_with(config, Arc::new(common::UnreachableStore)).await;

    let res = reqwest::Client::new()
        .post(gw.http("/projects"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = res.text().await.unwrap();
    assert_eq!(body, r#"{"error":"internal"}"#);

    // Liveness probing does not depend on the store.
    let res = reqwest::get(gw.http("/healthz")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.json::<Value>().await.unwrap(), json!({ "status": "ok" }));
}

#[tokio::test]
async fn responses_carry_request_id_and_nosniff() {
    let gw = common::spawn_gateway(ExistenceCheck::Strict).await;
    let res = reqwest::get(gw.http("/healthz")).await.unwrap();
    assert!(res.headers().contains_key("x-request-id"));
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
}
