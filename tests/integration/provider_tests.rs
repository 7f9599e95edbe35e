//! Provider adapter tests against mocked chat backends

use openllms_gateway::config::{ProviderConfig, ProviderKind, ResolutionConfig};
use openllms_gateway::error::AppError;
use openllms_gateway::provider::adapters::{DecagonProvider, DecagonTenant, ScoutlyProvider};
use openllms_gateway::provider::{
    create_provider, HttpTransport, PollConfig, PromptDecoration, Provider, SessionLifecycle,
};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_resolution() -> ResolutionConfig {
    ResolutionConfig {
        request_timeout_ms: 2000,
        poll_interval_ms: 10,
        poll_timeout_ms: 1000,
        stream_timeout_ms: 2000,
    }
}

fn substack(server: &MockServer, poll: PollConfig) -> DecagonProvider {
    DecagonProvider::new(
        "substack",
        PromptDecoration::default(),
        HttpTransport::new(server.uri(), Duration::from_secs(2)).unwrap(),
        DecagonTenant {
            team_id: "14".to_string(),
            flow_id: "substack".to_string(),
            metadata_url: "https://substack.com/support".to_string(),
            timezone: "America/New_York".to_string(),
        },
        poll,
    )
    .unwrap()
}

async fn requests_to(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == route)
        .count()
}

#[tokio::test]
async fn test_scoutly_direct_reply() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat2"))
        .and(body_string_contains("How do I earn Eagle?"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "answer": "Complete 21 merit badges.",
            "sources": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = ScoutlyProvider::new(
        "scoutly",
        PromptDecoration::default(),
        HttpTransport::new(server.uri(), Duration::from_secs(2)).unwrap(),
        "en-US",
        Some("fixed-session".to_string()),
        "",
    );

    let response = provider.query("How do I earn Eagle?").await.unwrap();
    assert_eq!(response.message, "Complete 21 merit badges.");
    assert_eq!(response.raw["sources"], json!([]));

    let history = provider.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].answer, "Complete 21 merit badges.");
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_att_query_parameters() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search/v2/answerextraction"))
        .and(query_param("searchTerm", "reset my router"))
        .and(query_param("app-id", "idpSupport"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "response": {"docs": [{"answer": "{\"answer\": \"Hold reset for 10s\", \"score\": 0.8}"}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new("att", ProviderKind::Att).with_base_url(server.uri());
    let provider = create_provider(&config, &fast_resolution()).unwrap();

    let response = provider.query("reset my router").await.unwrap();
    assert_eq!(response.message, "Hold reset for 10s");
    assert_eq!(response.extra("citations"), Some(&json!([])));
}

#[tokio::test]
async fn test_chatwith_plain_text_reply() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_string_contains("\"chatbotId\":\"bot-1\""))
        .respond_with(ResponseTemplate::new(200).set_body_string("Sure, here you go."))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = ProviderConfig::new(
        "puzzles",
        ProviderKind::ChatWith {
            chatbot_id: "bot-1".to_string(),
            session_id: None,
        },
    )
    .with_base_url(server.uri());
    config.prepend_prompt = "Be brief. ".to_string();
    let provider = create_provider(&config, &fast_resolution()).unwrap();

    let first = provider.query("hi").await.unwrap();
    provider.query("again").await.unwrap();
    assert_eq!(first.message, "Sure, here you go.");
    assert_eq!(first.raw, json!({"message": "Sure, here you go."}));

    // Both queries reuse one session id
    let requests = server.received_requests().await.unwrap();
    let ids: Vec<String> = requests
        .iter()
        .map(|r| {
            let body: serde_json::Value = serde_json::from_slice(&r.body).unwrap();
            assert!(body["messages"][0]["content"]
                .as_str()
                .unwrap()
                .starts_with("Be brief. "));
            body["id"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(ids[0], ids[1]);
}

#[tokio::test]
async fn test_chatwith_resumes_configured_session() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat"))
        .and(body_string_contains("\"id\":\"s-resume\""))
        .respond_with(ResponseTemplate::new(200).set_body_string("Welcome back."))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new(
        "puzzles",
        ProviderKind::ChatWith {
            chatbot_id: "bot-1".to_string(),
            session_id: Some("s-resume".to_string()),
        },
    )
    .with_base_url(server.uri());
    let provider = create_provider(&config, &fast_resolution()).unwrap();

    let response = provider.query("hi").await.unwrap();
    assert_eq!(response.message, "Welcome back.");
}

#[tokio::test]
async fn test_decagon_configured_session_skips_conversation_creation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/conversation/new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"conversation_id": "c-new"})))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/c-preset/message"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/conversation/history"))
        .and(query_param("conversation_id", "c-preset"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{"role": "USER"}, {"role": "AI", "text": "Resumed."}]
        })))
        .mount(&server)
        .await;

    let config = ProviderConfig::new(
        "substack",
        ProviderKind::Decagon {
            team_id: "14".to_string(),
            flow_id: "substack".to_string(),
            metadata_url: String::new(),
            timezone: "America/New_York".to_string(),
            session_id: Some("c-preset".to_string()),
        },
    )
    .with_base_url(server.uri());
    let provider = create_provider(&config, &fast_resolution()).unwrap();

    let response = provider.query("still there?").await.unwrap();
    assert_eq!(response.message, "Resumed.");
}

#[tokio::test]
async fn test_decagon_polls_until_reply() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/conversation/new"))
        .and(header("x-decagon-auth-team-id", "14"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"conversation_id": "c-1"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/chat/c-1/message"))
        .and(body_string_contains("\"type\":\"chat_message\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    // Three snapshots without the reply, then the answered one
    Mock::given(method("GET"))
        .and(path("/conversation/history"))
        .and(query_param("conversation_id", "c-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{"role": "USER", "text": "How do I cancel?"}]
        })))
        .up_to_n_times(3)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/conversation/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [
                {"role": "USER", "text": "How do I cancel?"},
                {"role": "AI", "text": "Open Settings and choose Cancel.", "id": 7}
            ]
        })))
        .mount(&server)
        .await;

    let provider = substack(&server, PollConfig::from_millis(10, 2000));
    let response = provider.query("How do I cancel?").await.unwrap();

    assert_eq!(response.message, "Open Settings and choose Cancel.");
    assert_eq!(response.extra("role"), Some(&json!("AI")));
    assert_eq!(requests_to(&server, "/conversation/history").await, 4);
}

#[tokio::test]
async fn test_decagon_times_out_without_reply() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/conversation/new"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"conversation_id": "c-2"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/c-2/message"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/conversation/history"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"messages": []})))
        .mount(&server)
        .await;

    let provider = substack(&server, PollConfig::from_millis(10, 1000));
    let err = provider
        .query_with("anyone there?", PollConfig::from_millis(10, 100))
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(requests_to(&server, "/conversation/history").await > 1);
}

#[tokio::test]
async fn test_authenticate_fetches_session_once() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/conversation/new"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"conversation_id": "c-3"}))
                .set_delay(Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let provider = substack(&server, PollConfig::from_millis(10, 100));

    let (a, b) = tokio::join!(provider.authenticate(), provider.authenticate());
    let c = provider.authenticate().await.unwrap();
    assert_eq!(a.unwrap(), "c-3");
    assert_eq!(b.unwrap(), "c-3");
    assert_eq!(c, "c-3");
    assert_eq!(requests_to(&server, "/conversation/new").await, 1);
}

#[tokio::test]
async fn test_failed_session_aborts_query() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/conversation/new"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .mount(&server)
        .await;

    let provider = substack(&server, PollConfig::from_millis(10, 100));
    let err = provider.query("hello").await.unwrap_err();

    assert!(matches!(err, AppError::Authentication { .. }));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_shopify_conversation_from_redirect() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/anonymous_user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"identifier": "anon-1"})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/en/search/What"))
        .and(header("x-anonymous-user-id", "anon-1"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("x-remix-redirect", "/en/search/What.conv-9?q=What"),
        )
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/messages"))
        .and(header("x-anonymous-user-id", "anon-1"))
        .and(body_string_contains("\"conversation_id\":\"conv-9\""))
        .respond_with(ResponseTemplate::new(200).set_body_string("data: {}\n\n"))
        .expect(1)
        .mount(&server)
        .await;

    // History as it stood before the message was sent
    Mock::given(method("GET"))
        .and(path("/api/conversations/conv-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "conversation": {"messages": [
                {"role": "user", "content": "Earlier question"},
                {"role": "assistant", "content": "Earlier answer"}
            ]}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/conversations/conv-9"))
        .and(query_param("features[]", "help/search/default"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "conversation": {"messages": [
                {"role": "user", "content": "Earlier question"},
                {"role": "assistant", "content": "Earlier answer"},
                {"role": "user", "content": "How do I add a domain?"},
                {"role": "assistant", "id": "m-4", "turn_number": 2,
                 "content": [{"markdown": "Go to **Settings > Domains**."}]}
            ]}
        })))
        .mount(&server)
        .await;

    let config = ProviderConfig::new("shopify", ProviderKind::Shopify).with_base_url(server.uri());
    let provider = create_provider(&config, &fast_resolution()).unwrap();

    let response = provider.query("How do I add a domain?").await.unwrap();
    assert_eq!(response.message, "Go to **Settings > Domains**.");
    assert_eq!(response.extra("id"), Some(&json!("m-4")));
    assert_eq!(response.extra("turn_number"), Some(&json!(2)));
}

#[tokio::test]
async fn test_shopify_repeated_question_waits_for_new_reply() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/anonymous_user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"identifier": "anon-1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/en/search/What"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("x-remix-redirect", "/en/search/What.conv-3"),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_string("data: {}\n\n"))
        .mount(&server)
        .await;

    // Before sending and on the first poll only the earlier exchange exists
    Mock::given(method("GET"))
        .and(path("/api/conversations/conv-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "conversation": {"messages": [
                {"role": "user", "content": "Is it down?"},
                {"role": "assistant", "content": "No outages."}
            ]}
        })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/conversations/conv-3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "conversation": {"messages": [
                {"role": "user", "content": "Is it down?"},
                {"role": "assistant", "content": "No outages."},
                {"role": "user", "content": "Is it down?"},
                {"role": "assistant", "content": "Checkout is degraded."}
            ]}
        })))
        .mount(&server)
        .await;

    let config = ProviderConfig::new("shopify", ProviderKind::Shopify).with_base_url(server.uri());
    let provider = create_provider(&config, &fast_resolution()).unwrap();

    let response = provider.query("Is it down?").await.unwrap();
    assert_eq!(response.message, "Checkout is degraded.");
    assert_eq!(requests_to(&server, "/api/conversations/conv-3").await, 3);
}

#[tokio::test]
async fn test_shopify_missing_redirect_fails_authentication() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/anonymous_user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"identifier": "anon-1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/en/search/What"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let config = ProviderConfig::new("shopify", ProviderKind::Shopify).with_base_url(server.uri());
    let provider = create_provider(&config, &fast_resolution()).unwrap();

    let err = provider.query("hi").await.unwrap_err();
    assert!(matches!(err, AppError::Authentication { .. }));
    assert_eq!(requests_to(&server, "/api/messages").await, 0);
}

#[tokio::test]
async fn test_mycity_stream_returns_final_record() {
    let server = MockServer::start().await;

    let record = |text: &str, last: bool| {
        json!({
            "model": "gpt-35-turbo-16k",
            "is_last": last,
            "choices": [{"messages": [
                {"role": "tool", "content": "{}"},
                {"role": "assistant", "content": text}
            ]}]
        })
        .to_string()
    };
    let body = format!(
        "{}\n{}\n{}\n",
        record("You can", false),
        record("You can call 311", false),
        record("You can call 311 for help.", true)
    );

    Mock::given(method("POST"))
        .and(path("/conversation"))
        .and(body_string_contains("sessionUUID"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(1)
        .mount(&server)
        .await;

    let config = ProviderConfig::new("mycity", ProviderKind::MyCity).with_base_url(server.uri());
    let provider = create_provider(&config, &fast_resolution()).unwrap();

    let response = provider.query("Where do I report a pothole?").await.unwrap();
    assert_eq!(response.message, "You can call 311 for help.");
    assert_eq!(response.extra("is_last"), Some(&json!(true)));
}

#[tokio::test]
async fn test_mycity_stream_without_final_record() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/conversation"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"is_last\": false}\n"))
        .mount(&server)
        .await;

    let config = ProviderConfig::new("mycity", ProviderKind::MyCity).with_base_url(server.uri());
    let provider = create_provider(&config, &fast_resolution()).unwrap();

    let err = provider.query("hello").await.unwrap_err();
    assert!(matches!(err, AppError::MissingTerminalResponse { .. }));
}

async fn mount_slow_mycity(server: &MockServer, delay: Duration) {
    Mock::given(method("POST"))
        .and(path("/conversation"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(
                    json!({
                        "is_last": true,
                        "choices": [{"messages": [{"role": "assistant", "content": "Call 311."}]}]
                    })
                    .to_string(),
                )
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_mycity_stream_outlives_request_timeout() {
    let server = MockServer::start().await;
    mount_slow_mycity(&server, Duration::from_millis(500)).await;

    let resolution = ResolutionConfig {
        request_timeout_ms: 200,
        stream_timeout_ms: 2000,
        ..fast_resolution()
    };
    let config = ProviderConfig::new("mycity", ProviderKind::MyCity).with_base_url(server.uri());
    let provider = create_provider(&config, &resolution).unwrap();

    let response = provider.query("hello").await.unwrap();
    assert_eq!(response.message, "Call 311.");
}

#[tokio::test]
async fn test_mycity_slow_stream_is_resolution_timeout() {
    let server = MockServer::start().await;
    mount_slow_mycity(&server, Duration::from_millis(800)).await;

    let resolution = ResolutionConfig {
        request_timeout_ms: 200,
        stream_timeout_ms: 300,
        ..fast_resolution()
    };
    let config = ProviderConfig::new("mycity", ProviderKind::MyCity).with_base_url(server.uri());
    let provider = create_provider(&config, &resolution).unwrap();

    let err = provider.query("hello").await.unwrap_err();
    assert!(err.is_timeout(), "expected resolution timeout, got {:?}", err);
    assert!(matches!(
        err,
        AppError::ResolutionTimeout { waited, .. } if waited == Duration::from_millis(300)
    ));
}

#[tokio::test]
async fn test_backend_error_status_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat2"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .mount(&server)
        .await;

    let config = ProviderConfig::new(
        "scoutly",
        ProviderKind::Scoutly {
            language: "en-US".to_string(),
            session: None,
            initial_prompt: String::new(),
        },
    )
    .with_base_url(server.uri());
    let provider = create_provider(&config, &fast_resolution()).unwrap();

    let err = provider.query("hello").await.unwrap_err();
    assert!(matches!(err, AppError::Backend { status: 500, .. }));
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn test_malformed_payload_degrades_to_empty_message() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat2"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let provider = ScoutlyProvider::new(
        "scoutly",
        PromptDecoration::default(),
        HttpTransport::new(server.uri(), Duration::from_secs(2)).unwrap(),
        "en-US",
        None,
        "",
    );

    let response = provider.query("hello").await.unwrap();
    assert_eq!(response.message, "");
}
