use axum::{Form, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::warn;

use contactbook_types::api::{LoginRequest, LoginResponse, Notice, RegisterRequest};

use crate::credentials::NewUser;
use crate::error::{ApiError, AuthError};
use crate::handlers::required;
use crate::session::{SESSION_COOKIE, SessionContext};
use crate::state::{AppState, blocking};

pub async fn register(
    State(state): State<AppState>,
    Form(req): Form<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    required("username", &req.username)?;
    required("email", &req.email)?;
    required("password", &req.password)?;

    blocking(move || {
        state.credentials.register(NewUser {
            username: &req.username,
            email: &req.email,
            mobile: &req.mobile,
            password: &req.password,
            registration_number: &req.reg_number,
        })?;
        Ok(())
    })
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(Notice::success("Registration successful! Please login.").redirect_to("/login")),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(req): Form<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cookie_secure = state.config.cookie_secure;

    let session = blocking(move || {
        let user = state
            .credentials
            .authenticate(&req.username, &req.password)
            .inspect_err(|e| {
                if matches!(e, AuthError::NotFound | AuthError::InvalidCredential) {
                    warn!(username = %req.username, "Rejected login");
                }
            })?;
        Ok(state.sessions.open_session(&user)?)
    })
    .await?;

    let cookie = Cookie::build((SESSION_COOKIE, session.token().to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(cookie_secure);

    Ok((
        jar.add(cookie),
        Json(LoginResponse {
            notice: Notice::success("Login successful!").redirect_to("/contact"),
            user_id: session.user_id(),
            username: session.username().to_string(),
            session_token: session.token().to_string(),
        }),
    ))
}

pub async fn logout(
    State(state): State<AppState>,
    ctx: SessionContext,
    jar: CookieJar,
) -> Result<impl IntoResponse, ApiError> {
    blocking(move || Ok(state.sessions.close_session(&ctx)?)).await?;

    Ok((
        jar.remove(Cookie::build(SESSION_COOKIE).path("/")),
        Json(Notice::success("You have been logged out").redirect_to("/login")),
    ))
}
