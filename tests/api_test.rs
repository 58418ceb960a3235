mod common;

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use celebyfilm::{AppState, config::Config, router, routes::SESSION_COOKIE};
use common::{PARASITE, TOM_HANKS};
use serde_json::{Value, json};
use tower::ServiceExt;

async fn app() -> Router {
    app_with_state().await.0
}

async fn app_with_state() -> (Router, Arc<AppState>) {
    let store = common::store().await;
    let state = Arc::new(AppState::new(Config::default(), store.clone(), store));
    (router(state.clone()), state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Option<String>, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, cookie, body)
}

fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::post(uri).header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_search_endpoint() {
    let app = app().await;

    let (status, _, body) = send(&app, get("/api/search?q=parasite", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["films"][0]["title"], "Parasite");
    assert_eq!(body["celebrities"].as_array().unwrap().len(), 1);

    let (status, _, body) = send(&app, get("/api/search?q=", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["films"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_film_list_query() {
    let app = app().await;

    let (status, _, body) = send(&app, get("/api/films?genre=Drama&sort=year", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["items"][0]["title"], "The Post");
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_routes_and_ids_are_404() {
    let app = app().await;

    let (status, _, body) = send(&app, get("/api/nowhere", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Page not found");

    let uri = format!("/api/film/{}", uuid::Uuid::new_v4());
    let (status, _, body) = send(&app, get(&uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Film not found");
}

#[tokio::test]
async fn test_anonymous_toggle_gets_notice_without_cookie() {
    let (app, state) = app_with_state().await;

    let target = json!({ "kind": "film", "id": PARASITE });
    let (status, cookie, body) = send(&app, post("/api/favorites/toggle", None, target)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cookie, None);
    assert_eq!(body["notice"]["level"], "error");
    assert_eq!(body["notice"]["message"], "Please sign in to add favorites");
    assert_eq!(body["is_favorite"], false);

    let (status, _, _) = send(&app, get("/api/favorites", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(state.clients.len().await, 0);
}

#[tokio::test]
async fn test_anonymous_traffic_does_not_grow_client_registry() {
    let (app, state) = app_with_state().await;

    for i in 0..200 {
        let uri = match i % 3 {
            0 => format!("/api/film/{PARASITE}"),
            1 => format!("/api/comments/film/{}", uuid::Uuid::new_v4()),
            _ => "/api/session".to_string(),
        };
        let forged = format!("{SESSION_COOKIE}={}", uuid::Uuid::new_v4());
        let cookie = (i % 2 == 0).then_some(forged.as_str());
        let (status, set_cookie, _) = send(&app, get(&uri, cookie)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(set_cookie, None);
    }

    assert_eq!(state.clients.len().await, 0);

    let credentials = json!({ "email": "ada@example.com", "password": "wrong" });
    let (_, cookie, body) = send(&app, post("/api/auth/sign-in", None, credentials)).await;
    assert_eq!(body["notice"]["level"], "error");
    assert_eq!(cookie, None);
    assert_eq!(state.clients.len().await, 0);
}

#[tokio::test]
async fn test_signed_in_flow() {
    let (app, state) = app_with_state().await;

    let credentials = json!({ "email": "ada@example.com", "password": "secret123" });
    let (_, cookie, body) = send(&app, post("/api/auth/sign-up", None, credentials)).await;
    let cookie = cookie.unwrap();
    assert!(cookie.starts_with(SESSION_COOKIE));
    assert_eq!(state.clients.len().await, 1);
    assert_eq!(body["notice"]["message"], "Account created successfully!");
    assert_eq!(body["identity"]["email"], "ada@example.com");
    assert!(body["identity"].get("access_token").is_none());

    let target = json!({ "kind": "celebrity", "id": TOM_HANKS });
    let (_, _, body) = send(&app, post("/api/favorites/toggle", Some(&cookie), target)).await;
    assert_eq!(body["notice"]["message"], "Added to favorites");
    assert_eq!(body["is_favorite"], true);

    let uri = format!("/api/celebrity/{TOM_HANKS}");
    let (status, _, body) = send(&app, get(&uri, Some(&cookie))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_favorite"], true);
    assert_eq!(body["filmography"].as_array().unwrap().len(), 2);

    let uri = format!("/api/comments/film/{PARASITE}");
    let comment = json!({ "content": "Best of the decade" });
    let (_, _, body) = send(&app, post(&uri, Some(&cookie), comment)).await;
    assert_eq!(body["notice"]["message"], "Comment added");
    assert_eq!(body["comments"][0]["content"], "Best of the decade");

    let (_, _, body) = send(&app, get("/api/favorites", Some(&cookie))).await;
    assert_eq!(body["celebrities"][0]["name"], "Tom Hanks");

    let (_, _, body) = send(&app, get("/api/profile", Some(&cookie))).await;
    assert_eq!(body["stats"]["favorites"], 1);
    assert_eq!(body["stats"]["comments"], 1);

    let (_, cleared, body) =
        send(&app, post("/api/auth/sign-out", Some(&cookie), json!({}))).await;
    assert_eq!(body["notice"]["message"], "Signed out successfully");
    assert_eq!(body["identity"], Value::Null);
    assert_eq!(cleared.as_deref(), Some(format!("{SESSION_COOKIE}=").as_str()));
    assert_eq!(state.clients.len().await, 0);

    let (_, _, body) = send(&app, get(&uri, Some(&cookie))).await;
    assert_eq!(body["comments"][0]["display_name"], "Anonymous");
}
