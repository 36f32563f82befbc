//! Telegram sink against a mock Bot API.

mod common;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vmclaim_provisioner::config::TelegramConfig;
use vmclaim_provisioner::{NotificationSink, TelegramNotifier};

fn notifier_at(api_base: &str) -> TelegramNotifier {
    TelegramNotifier::new(&TelegramConfig {
        bot_token: "test-token".to_string(),
        chat_id: "42".to_string(),
        api_base: api_base.to_string(),
    })
}

#[tokio::test]
async fn test_notify_posts_html_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottest-token/sendMessage"))
        .and(body_partial_json(json!({
            "chat_id": "42",
            "text": "hello <b>world</b>",
            "parse_mode": "HTML"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    assert!(notifier_at(&server.uri()).notify("hello <b>world</b>").await);
}

#[tokio::test]
async fn test_success_message_carries_instance_details() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottest-token/sendMessage"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&server)
        .await;

    let notifier = notifier_at(&server.uri());
    assert!(notifier.notify_success(&common::sample_instance()).await);

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let text = body["text"].as_str().unwrap();
    assert!(text.contains("Instance Created Successfully"));
    assert!(text.contains("203.0.113.7"));
    assert!(text.contains("ocid1.instance.oc1..new"));
}

#[tokio::test]
async fn test_rejected_message_returns_false() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottest-token/sendMessage"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "description": "Bad Request: chat not found"
        })))
        .mount(&server)
        .await;

    assert!(!notifier_at(&server.uri()).notify("hello").await);
}

#[tokio::test]
async fn test_unreachable_api_returns_false() {
    assert!(!notifier_at("http://127.0.0.1:1").notify("hello").await);
}
