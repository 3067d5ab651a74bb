mod common;

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use smime_signer::{AppState, Credentials, SigningInvoker, router};
use tower::ServiceExt;

fn test_state(program: impl Into<PathBuf>) -> AppState {
    AppState {
        invoker: SigningInvoker::new().program(program),
        credentials: Arc::new(Credentials {
            key: PathBuf::from("signer.key"),
            cert: PathBuf::from("signer.crt"),
            password: None,
        }),
    }
}

fn sign_request(uri: &str, body: &'static str) -> Request<axum::body::Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(axum::body::Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn healthcheck_returns_200() {
    let app = router(test_state("openssl"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthcheck")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"Ok");
}

#[tokio::test]
async fn sign_rejects_get() {
    let app = router(test_state("openssl"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/sign")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = router(test_state("openssl"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/nonexistent")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_format_returns_400() {
    let app = router(test_state("openssl"));

    let response = app
        .oneshot(sign_request("/sign?format=PKCS12", "hello world"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn missing_signing_tool_returns_500() {
    let app = router(test_state("/nonexistent/openssl"));

    let response = app
        .oneshot(sign_request("/sign", "hello world"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[cfg(unix)]
#[tokio::test]
async fn sign_streams_body_through_tool() {
    let dir = tempfile::TempDir::new().unwrap();
    let tool = common::fake_tool(dir.path(), "echo-tool", "exec cat\n");
    let app = router(test_state(tool));

    let response = app
        .oneshot(sign_request("/sign?format=der&opaque=true", "hello world"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pkcs7-mime"
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"hello world");
}

#[cfg(unix)]
#[tokio::test]
async fn format_query_is_case_insensitive() {
    let dir = tempfile::TempDir::new().unwrap();
    let tool = common::fake_tool(dir.path(), "echo-tool", "exec cat\n");
    let app = router(test_state(tool));

    let response = app
        .oneshot(sign_request("/sign?format=Pem", "hello world"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/x-pem-file"
    );
}

#[cfg(unix)]
#[tokio::test]
async fn failing_tool_returns_500() {
    let dir = tempfile::TempDir::new().unwrap();
    let tool = common::fake_tool(dir.path(), "failing-tool", "cat > /dev/null\nexit 1\n");
    let app = router(test_state(tool));

    let response = app
        .oneshot(sign_request("/sign", "hello world"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn sign_with_openssl_returns_pem() {
    if !common::openssl_available() {
        eprintln!("Skipping test: openssl not found on PATH");
        return;
    }
    let creds = common::generate_credentials(None);
    let state = AppState {
        invoker: SigningInvoker::new(),
        credentials: Arc::new(Credentials {
            key: creds.key.clone(),
            cert: creds.cert.clone(),
            password: None,
        }),
    };

    let response = router(state)
        .oneshot(sign_request("/sign", "hello world"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/x-pem-file"
    );
    let body = response.into_body().collect().await.unwrap().to_bytes();
    assert!(body.starts_with(b"-----BEGIN PKCS7-----"));
    assert_eq!(common::verify(&body, "PEM", Some(b"hello world")), b"hello world");
}
