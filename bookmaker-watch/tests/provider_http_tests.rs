//! Provider HTTP behavior against a local stand-in server
//!
//! `/volumes` answers like Google Books for one known code and fails with
//! 500 for `9780000000500`; `/openbd` answers like openBD.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Query;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use bookmaker_common::status::{self, Severity};
use bookmaker_watch::providers::{GoogleBooksProvider, MetadataResolver, OpenBdProvider};
use bookmaker_watch::types::MetadataProvider;
use bookmaker_watch::ProviderError;
use serde_json::{json, Value};

const KNOWN: &str = "9784101010014";
const FAILING: &str = "9780000000500";

async fn volumes(Query(params): Query<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
    let q = params.get("q").cloned().unwrap_or_default();
    if q == format!("isbn:{}", FAILING) {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": "backend"})));
    }
    if q == format!("isbn:{}", KNOWN) {
        return (
            StatusCode::OK,
            Json(json!({
                "kind": "books#volumes",
                "totalItems": 1,
                "items": [{"volumeInfo": {
                    "title": "吾輩は猫である",
                    "subtitle": "（改版）",
                    "authors": ["夏目漱石"]
                }}]
            })),
        );
    }
    (StatusCode::OK, Json(json!({"kind": "books#volumes", "totalItems": 0})))
}

async fn openbd(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    match params.get("isbn").map(String::as_str) {
        Some(FAILING) => Json(json!([{
            "summary": {"isbn": FAILING, "title": "代替　タイトル", "author": "山田太郎／著"}
        }])),
        _ => Json(json!([null])),
    }
}

/// Serve the stand-in APIs on an ephemeral port; returns the base URL
async fn spawn_server() -> String {
    let app = Router::new()
        .route("/volumes", get(volumes))
        .route("/openbd", get(openbd));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn providers(base: &str) -> (GoogleBooksProvider, OpenBdProvider) {
    let timeout = Duration::from_secs(5);
    (
        GoogleBooksProvider::new(&format!("{}/volumes", base), timeout).unwrap(),
        OpenBdProvider::new(&format!("{}/openbd", base), timeout).unwrap(),
    )
}

#[tokio::test]
async fn test_google_books_match() {
    let base = spawn_server().await;
    let (google, _) = providers(&base);

    let metadata = google.lookup(KNOWN).await.unwrap().unwrap();

    assert_eq!(metadata.title, "吾輩は猫である 改版");
    assert_eq!(metadata.author, "夏目漱石");
}

#[tokio::test]
async fn test_google_books_zero_items() {
    let base = spawn_server().await;
    let (google, _) = providers(&base);

    assert!(google.lookup("9789999999999").await.unwrap().is_none());
}

#[tokio::test]
async fn test_google_books_server_error_is_status_error() {
    let base = spawn_server().await;
    let (google, _) = providers(&base);

    let err = google.lookup(FAILING).await.unwrap_err();
    assert!(matches!(err, ProviderError::Status { status: 500, .. }));
}

#[tokio::test]
async fn test_openbd_null_record() {
    let base = spawn_server().await;
    let (_, openbd) = providers(&base);

    assert!(openbd.lookup(KNOWN).await.unwrap().is_none());
}

#[tokio::test]
async fn test_resolver_falls_back_to_openbd_after_http_error() {
    let base = spawn_server().await;
    let (google, openbd) = providers(&base);
    let google: Arc<dyn MetadataProvider> = Arc::new(google);
    let openbd: Arc<dyn MetadataProvider> = Arc::new(openbd);
    let resolver = MetadataResolver::new(vec![google, openbd]);
    let (tx, mut rx) = status::channel();

    let resolution = resolver.resolve(FAILING, &tx).await.unwrap();

    assert_eq!(resolution.provider, "openBD");
    assert_eq!(resolution.metadata.title, "代替 タイトル");
    assert_eq!(resolution.metadata.author, "山田太郎");

    let warning = rx.try_next().unwrap();
    assert_eq!(warning.severity, Severity::Warning);
    assert_eq!(
        warning.text,
        format!("Cannot find book info from Google. ISBN: {}. Status Code: 500.", FAILING)
    );
    assert!(rx.try_next().is_none());
}

#[tokio::test]
async fn test_unreachable_provider_is_soft() {
    // Nothing listens on port 1
    let (google, _) = providers("http://127.0.0.1:1");
    let google: Arc<dyn MetadataProvider> = Arc::new(google);
    let resolver = MetadataResolver::new(vec![google]);
    let (tx, mut rx) = status::channel();

    assert!(resolver.resolve(KNOWN, &tx).await.is_none());
    assert_eq!(rx.try_next().unwrap().severity, Severity::Warning);
}
