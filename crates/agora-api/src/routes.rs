use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::chat;
use crate::middleware::require_auth;

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/signup", post(auth::signup))
        .route("/api/login", post(auth::login))
        .route("/api/refresh", post(auth::refresh));

    let protected = Router::new()
        .route("/api/chat", get(chat::chat))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new().merge(public).merge(protected).with_state(state)
}
