//! Public HTTP surface: the registration page, form submission and health.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Form, Json, Router};
use chrono::{NaiveDate, Utc};
use loyalink_common::i18n::tr;
use loyalink_common::types::RegistrationForm;
use serde::{Deserialize, Serialize};

use crate::logging::TraceId;
use crate::pages;
use crate::registration::RegistrationError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterQuery {
    token: Option<String>,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub version: String,
    pub uptime_secs: i64,
    pub database: String,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", get(register_page))
        .route("/submit", post(submit))
        .route("/health", get(health))
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, message.to_string()).into_response()
}

async fn register_page(
    State(state): State<AppState>,
    Query(query): Query<RegisterQuery>,
) -> Response {
    let locale = state.locale();
    let Some(token) = query.token.filter(|t| !t.trim().is_empty()) else {
        return bad_request(tr(locale, "page.missing_token"));
    };

    match state.registration.validate_and_decode(&token).await {
        Ok(_) => Html(pages::register_form(locale, token.trim())).into_response(),
        Err(e) => (
            StatusCode::BAD_REQUEST,
            Html(pages::error_page(locale, e.public_message(locale))),
        )
            .into_response(),
    }
}

fn is_valid_birthday(birthday: &str) -> bool {
    birthday.len() == 10 && NaiveDate::parse_from_str(birthday, "%Y-%m-%d").is_ok()
}

async fn submit(
    Extension(trace_id): Extension<TraceId>,
    State(state): State<AppState>,
    Form(form): Form<RegistrationForm>,
) -> Response {
    let locale = state.locale();
    let Some(form) = form.complete() else {
        return bad_request(tr(locale, "page.missing_fields"));
    };
    if !is_valid_birthday(&form.birthday) {
        return bad_request(tr(locale, "page.invalid_birthday"));
    }

    let result: Result<(), RegistrationError> = async {
        let token = state.registration.validate_and_decode(&form.token).await?;
        state
            .workflow
            .register_user(&token, &form.name, &form.phone, &form.birthday)
            .await
    }
    .await;

    match result {
        Ok(()) => Html(pages::success_page(locale)).into_response(),
        Err(e) => {
            tracing::error!(trace_id = %trace_id.0, error = %e, "Registration failed");
            (
                StatusCode::BAD_REQUEST,
                Html(pages::error_page(
                    locale,
                    tr(locale, "page.registration_failed"),
                )),
            )
                .into_response()
        }
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = if state.registration.store().ping().await {
        "ok"
    } else {
        "unavailable"
    };
    Json(HealthResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: (Utc::now() - state.start_time).num_seconds(),
        database: database.to_string(),
    })
}
