// REST contract tests against a mock backend

use clinic_queue_core::{
    NewToken, QueueClient, QueueError, Role, SessionCredential, TokenId, TokenNumber, TokenPatch,
    TokenStatus,
};
use clinic_queue_http::{ApiConfig, HttpQueueClient};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> HttpQueueClient {
    HttpQueueClient::new(&ApiConfig::new(server.uri())).unwrap()
}

fn authed(server: &MockServer, role: Role) -> HttpQueueClient {
    let credential = SessionCredential::new("secret-token", role);
    client(server).with_credential(Some(&credential))
}

#[tokio::test]
async fn test_fetch_status_accepts_string_token_numbers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/queue/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "currentToken": {"_id": "a1", "tokenNumber": "101", "patientName": "Ann",
                             "phoneNumber": "555-0101", "status": "serving", "isVIP": false},
            "waitingTokens": [
                {"_id": "b2", "tokenNumber": 102, "patientName": "Bob",
                 "phoneNumber": "555-0102", "status": "waiting", "isVIP": true}
            ]
        })))
        .mount(&server)
        .await;

    let snapshot = client(&server).fetch_status().await.unwrap();

    let current = snapshot.current_token.unwrap();
    assert_eq!(current.token_number, TokenNumber(101));
    assert_eq!(current.status, TokenStatus::Serving);
    assert_eq!(snapshot.waiting_tokens.len(), 1);
    assert!(snapshot.waiting_tokens[0].is_vip);
}

#[tokio::test]
async fn test_empty_queue_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/queue/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"currentToken": null, "waitingTokens": []})),
        )
        .mount(&server)
        .await;

    let snapshot = client(&server).fetch_status().await.unwrap();
    assert!(snapshot.is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_validation_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/queue/status"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"waitingTokens": "nope"})),
        )
        .mount(&server)
        .await;

    let err = client(&server).fetch_status().await.unwrap_err();
    assert!(matches!(err, QueueError::Validation(_)), "got {err:?}");
}

#[tokio::test]
async fn test_server_error_keeps_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/queue/wait-time"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"message": "database offline"})),
        )
        .mount(&server)
        .await;

    let err = client(&server).fetch_wait_time().await.unwrap_err();
    assert_eq!(
        err,
        QueueError::Server {
            status: 500,
            message: Some("database offline".into())
        }
    );
}

#[tokio::test]
async fn test_unreachable_backend_is_network_error() {
    let config = ApiConfig::new("http://127.0.0.1:9");
    let err = HttpQueueClient::new(&config)
        .unwrap()
        .fetch_status()
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn test_wait_time() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/queue/wait-time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"averageWaitTime": 12.5})))
        .mount(&server)
        .await;

    assert_eq!(client(&server).fetch_wait_time().await.unwrap(), 12.5);
}

#[tokio::test]
async fn test_submit_sends_camel_case_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tokens"))
        .and(body_json(json!({"patientName": "Jane", "phoneNumber": "555-1000"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "_id": "j1", "tokenNumber": 101, "patientName": "Jane",
            "phoneNumber": "555-1000", "status": "waiting", "isVIP": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = client(&server)
        .submit_token(&NewToken::new("Jane", "555-1000"))
        .await
        .unwrap();
    assert_eq!(token.id, TokenId::from("j1"));
    assert_eq!(token.token_number, TokenNumber(101));
}

#[tokio::test]
async fn test_blank_submission_never_reaches_backend() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/tokens"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let err = client(&server)
        .submit_token(&NewToken::new("Jane", " "))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        QueueError::validation("Patient name and phone number are required")
    );
}

#[tokio::test]
async fn test_advance_reports_new_current_token() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/queue/next"))
        .and(header("authorization", "Bearer secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Next token called",
            "currentToken": {"_id": "a1", "tokenNumber": 101, "patientName": "Ann",
                             "phoneNumber": "555-0101", "status": "serving"}
        })))
        .mount(&server)
        .await;

    let outcome = authed(&server, Role::Doctor).advance_queue().await.unwrap();
    assert!(outcome.advanced);
    assert_eq!(
        outcome.current_token.map(|t| t.token_number),
        Some(TokenNumber(101))
    );
}

#[tokio::test]
async fn test_advance_on_empty_queue() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/queue/next"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "No more tokens in queue"})),
        )
        .mount(&server)
        .await;

    let outcome = authed(&server, Role::Doctor).advance_queue().await.unwrap();
    assert!(!outcome.advanced);
    assert_eq!(outcome.current_token, None);
}

#[tokio::test]
async fn test_rejected_credential_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/queue/skip/a1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Token expired"})))
        .mount(&server)
        .await;

    let err = authed(&server, Role::Doctor)
        .skip_token(&TokenId::from("a1"))
        .await
        .unwrap_err();
    assert_eq!(err, QueueError::auth("Token expired"));
}

#[tokio::test]
async fn test_update_sends_only_supplied_fields() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/tokens/a1"))
        .and(body_json(json!({"isVIP": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "_id": "a1", "tokenNumber": 101, "patientName": "Ann",
            "phoneNumber": "555-0101", "status": "waiting", "isVIP": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let token = authed(&server, Role::Receptionist)
        .update_token(&TokenId::from("a1"), &TokenPatch::vip(true))
        .await
        .unwrap();
    assert!(token.is_vip);
    assert_eq!(token.patient_name, "Ann");
}

#[tokio::test]
async fn test_delete_missing_token_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/tokens/zz"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"message": "Token not found"})),
        )
        .mount(&server)
        .await;

    let err = authed(&server, Role::Receptionist)
        .delete_token(&TokenId::from("zz"))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        QueueError::NotFound {
            message: Some("Token not found".into())
        }
    );
}

#[tokio::test]
async fn test_login_returns_credential_with_role() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"username": "front", "password": "desk"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "issued", "user": {"role": "receptionist"}
        })))
        .mount(&server)
        .await;

    let credential = client(&server).login("front", "desk").await.unwrap();
    assert_eq!(credential.token, "issued");
    assert_eq!(credential.role(), Role::Receptionist);
    assert_eq!(credential.user.username.as_deref(), Some("front"));
}
