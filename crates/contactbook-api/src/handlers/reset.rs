use axum::{
    Form, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use contactbook_types::api::{ForgotRequest, Notice, ResetPasswordRequest, ResetTokenStatus};

use crate::error::ApiError;
use crate::handlers::required;
use crate::state::{AppState, blocking};

pub async fn forgot(
    State(state): State<AppState>,
    Form(req): Form<ForgotRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let email = required("email", &req.email)?.to_string();

    let issued = {
        let state = state.clone();
        blocking(move || Ok(state.resets.create(&email)?)).await?
    };
    // Same notice whether or not the mail went out; the service logs failures.
    state.resets.deliver(issued).await;

    Ok(Json(
        Notice::success("Password reset link has been sent to your email").redirect_to("/login"),
    ))
}

pub async fn show_reset(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let email = blocking(move || {
        state
            .resets
            .validate(&token)
            .map_err(|e| ApiError::from_reset(e, &token))
    })
    .await?;

    Ok(Json(ResetTokenStatus { email }))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Form(req): Form<ResetPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    required("password", &req.password)?;

    blocking(move || {
        state
            .resets
            .consume(&token, &req.password, &req.password_confirm)
            .map_err(|e| ApiError::from_reset(e, &token))
    })
    .await?;

    Ok(Json(
        Notice::success("Your password has been updated! You can now login.").redirect_to("/login"),
    ))
}
