//! Wire tests for the Reddit source against a local fake of the JSON API.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use signal_harvest::config::SourceConfig;
use signal_harvest::reddit::RedditSource;
use signal_harvest::source::{ChannelStatus, ContentSource};

#[derive(Default)]
struct Fake {
    flaky_calls: AtomicUsize,
}

fn post(id: &str, title: &str) -> serde_json::Value {
    json!({ "kind": "t3", "data": {
        "permalink": format!("/r/SaaS/comments/{id}/{title}/"),
        "title": title,
        "selftext": "body",
        "created_utc": 1740830400.0,
        "score": 5,
        "is_self": true,
        "stickied": false
    }})
}

async fn about(Path(channel): Path<String>) -> Response {
    match channel.as_str() {
        "SaaS" => Json(json!({
            "kind": "t5",
            "data": { "subreddit_type": "public", "subscribers": 10 }
        }))
        .into_response(),
        "private_club" => StatusCode::FORBIDDEN.into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn top(
    State(fake): State<Arc<Fake>>,
    Path(channel): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if channel == "flaky" && fake.flaky_calls.fetch_add(1, Ordering::SeqCst) == 0 {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let body = match params.get("after").map(String::as_str) {
        None => json!({ "data": {
            "after": "t3_b",
            "children": [post("a", "first"), post("b", "second")]
        }}),
        Some("t3_b") => json!({ "data": {
            "after": null,
            "children": [post("c", "third")]
        }}),
        Some(_) => json!({ "data": { "after": null, "children": [] } }),
    };
    Json(body).into_response()
}

async fn start_fake() -> (String, Arc<Fake>) {
    let fake = Arc::new(Fake::default());
    let app = Router::new()
        .route("/r/{channel}/about.json", get(about))
        .route("/r/{channel}/top.json", get(top))
        .with_state(fake.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), fake)
}

fn source_for(base_url: &str) -> RedditSource {
    let config = SourceConfig {
        base_url: base_url.to_string(),
        timeout_secs: 5,
        max_retries: 2,
        ..SourceConfig::default()
    };
    RedditSource::anonymous(&config).unwrap()
}

#[tokio::test]
async fn test_list_top_follows_cursor() {
    let (base, _) = start_fake().await;
    let source = source_for(&base);

    let items = source.list_top("SaaS", "day", 10).await.unwrap();
    let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_list_top_stops_at_limit() {
    let (base, _) = start_fake().await;
    let source = source_for(&base);

    let items = source.list_top("SaaS", "day", 1).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].title, "first");
}

#[tokio::test]
async fn test_list_top_retries_server_errors() {
    let (base, fake) = start_fake().await;
    let source = source_for(&base);

    let items = source.list_top("flaky", "day", 10).await.unwrap();
    assert_eq!(items.len(), 3);
    assert!(fake.flaky_calls.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn test_channel_status_maps_http_statuses() {
    let (base, _) = start_fake().await;
    let source = source_for(&base);

    assert_eq!(source.channel_status("SaaS").await, ChannelStatus::Available);
    assert_eq!(
        source.channel_status("private_club").await,
        ChannelStatus::Restricted
    );
    assert_eq!(source.channel_status("ghost").await, ChannelStatus::NotFound);
    assert!(source.is_channel_available("SaaS").await);
    assert!(!source.is_channel_available("ghost").await);
}
