mod common;

use advancia_ledger::{
    models::user::UserRole,
    services::nowpayments::{self, SIGNATURE_HEADER},
};
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use common::{IPN_SECRET, get, json_body, post_json, test_app, test_app_with, token_for};
use serde_json::json;
use tower::ServiceExt;
use uuid::Uuid;

#[tokio::test]
async fn test_user_routes_require_token() {
    for uri in ["/api/accounts", "/api/transactions", "/api/withdrawals", "/api/auth/me"] {
        let response = test_app().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn test_error_body_shape() {
    let response = test_app()
        .oneshot(get("/api/accounts", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "unauthorized");
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn test_forged_token_is_rejected() {
    let response = test_app()
        .oneshot(get("/api/accounts", Some("eyJhbGciOiJIUzI1NiJ9.e30.forged")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_routes_require_token() {
    let response = test_app()
        .oneshot(get("/api/admin/users", None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_cannot_approve_withdrawal() {
    let token = token_for(UserRole::User);
    let uri = format!("/api/withdrawals/{}/approve", Uuid::new_v4());

    let response = test_app()
        .oneshot(post_json(&uri, Some(&token), json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "forbidden");
}

#[tokio::test]
async fn test_user_cannot_reach_admin_routes() {
    let token = token_for(UserRole::User);

    let response = test_app()
        .oneshot(get("/api/admin/withdrawals", Some(&token)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let uri = format!("/api/admin/accounts/{}/credit", Uuid::new_v4());
    let response = test_app()
        .oneshot(post_json(&uri, Some(&token), json!({ "amount_cents": 100 })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_register_rejects_malformed_email() {
    let body = json!({ "email": "not-an-email", "password": "long-enough-password" });

    let response = test_app()
        .oneshot(post_json("/api/auth/register", None, body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

fn ipn_request(body: &str, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/payments/ipn/nowpayments")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

const IPN_BODY: &str = r#"{"payment_id":5077125051,"payment_status":"finished","order_id":"8f2c1a4e-0d3b-4b7a-9a51-2f6f1c0d9e11"}"#;

#[tokio::test]
async fn test_ipn_without_signature_is_unauthorized() {
    let response = test_app().oneshot(ipn_request(IPN_BODY, None)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "invalid_signature");
}

#[tokio::test]
async fn test_ipn_with_wrong_signature_is_unauthorized() {
    let canonical = nowpayments::canonical_json(IPN_BODY.as_bytes()).unwrap();
    let signature = nowpayments::sign("someone-elses-secret", &canonical).unwrap();

    let response = test_app()
        .oneshot(ipn_request(IPN_BODY, Some(&signature)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_ipn_with_tampered_body_is_unauthorized() {
    let canonical = nowpayments::canonical_json(IPN_BODY.as_bytes()).unwrap();
    let signature = nowpayments::sign(IPN_SECRET, &canonical).unwrap();
    let tampered = IPN_BODY.replace("5077125051", "5077125052");

    let response = test_app()
        .oneshot(ipn_request(&tampered, Some(&signature)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_ipn_without_configured_secret_is_unavailable() {
    let response = test_app_with(None)
        .oneshot(ipn_request(IPN_BODY, Some("00")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = json_body(response).await;
    assert_eq!(body["error"]["code"], "not_configured");
}
