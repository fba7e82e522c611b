use axum::{Extension, Form, Json, extract::State, response::IntoResponse};

use contactbook_types::api::{
    Notice, SearchRequest, SearchResponse, SessionInfo, SubmitDetailsRequest, SubmitDetailsResponse,
};

use crate::contacts::ContactDetails;
use crate::error::ApiError;
use crate::handlers::required;
use crate::session::SessionHandle;
use crate::state::{AppState, blocking};

pub async fn contact(Extension(session): Extension<SessionHandle>) -> impl IntoResponse {
    Json(SessionInfo {
        user_id: session.user_id(),
        username: session.username().to_string(),
    })
}

pub async fn submit_details(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Form(req): Form<SubmitDetailsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    required("reg_number", &req.reg_number)?;

    let saved = blocking(move || {
        let details = ContactDetails {
            phone: &req.phone,
            email: &req.email,
            address: &req.address,
        };
        Ok(state.contacts.upsert(&session, &req.reg_number, details)?)
    })
    .await?;

    let message = if saved.created {
        "Contact details saved successfully"
    } else {
        "Contact details updated successfully"
    };

    Ok(Json(SubmitDetailsResponse {
        notice: Notice::success(message).redirect_to("/search"),
        contact: saved.record,
    }))
}

pub async fn search_form(Extension(_session): Extension<SessionHandle>) -> impl IntoResponse {
    Json(SearchResponse {
        notice: None,
        contact: None,
    })
}

pub async fn search(
    State(state): State<AppState>,
    Extension(session): Extension<SessionHandle>,
    Form(req): Form<SearchRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let found = blocking(move || Ok(state.contacts.find(&session, &req.reg_number)?)).await?;

    let notice = found
        .is_none()
        .then(|| Notice::error("No contacts found for this registration number"));

    Ok(Json(SearchResponse {
        notice,
        contact: found,
    }))
}
