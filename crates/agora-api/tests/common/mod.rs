#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, Response, header};
use http_body_util::BodyExt;

use agora_api::auth::{AppState, AppStateInner, SessionSettings};
use agora_db::{Database, Repository};
use agora_gateway::Hub;
use agora_token::{TokenAuthority, keys::generate_key};

/// Fresh in-memory state. `seed` runs against the store before the hub
/// loads its history.
pub fn test_state(seed: impl FnOnce(&Database)) -> AppState {
    let db = Database::open_in_memory().unwrap();
    seed(&db);
    let db: Arc<dyn Repository> = Arc::new(db);
    let hub = Hub::spawn(db.clone());
    Arc::new(AppStateInner {
        db,
        tokens: TokenAuthority::new(&generate_key()).unwrap(),
        hub,
        session: SessionSettings::default(),
    })
}

pub fn json_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Every `Set-Cookie` header of `response`.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// The full `Set-Cookie` line for `name`, if present.
pub fn cookie_line(cookies: &[String], name: &str) -> Option<String> {
    cookies
        .iter()
        .find(|c| c.starts_with(&format!("{name}=")))
        .cloned()
}

/// Just the value of cookie `name`.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let line = cookie_line(cookies, name)?;
    let pair = line.split(';').next()?;
    Some(pair[name.len() + 1..].to_string())
}
