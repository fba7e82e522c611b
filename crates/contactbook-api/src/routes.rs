use axum::{
    Router, middleware,
    response::Redirect,
    routing::{get, post},
};

use crate::handlers::{auth, contacts, reset};
use crate::session::require_login;
use crate::state::AppState;

/// All contactbook endpoints. Transport layers (tracing, CORS) are added by
/// the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(|| async { Redirect::to("/login") }))
        .route("/healthz", get(|| async { "ok" }))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/forgot", post(reset::forgot))
        .route("/reset/{token}", get(reset::show_reset).post(reset::reset_password));

    let protected_routes = Router::new()
        .route("/contact", get(contacts::contact))
        .route("/submit_details", post(contacts::submit_details))
        .route("/search", get(contacts::search_form).post(contacts::search))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_login));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
