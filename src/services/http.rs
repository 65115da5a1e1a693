use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        FromRequestParts, Path,
    },
    http::{header, request::Parts, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;

use super::{
    bills::BillRequest, reminders::ReminderRequest, request, users::UserRequest, ServiceError,
};

mod bills;
mod users;

#[derive(Clone)]
pub struct AppState {
    bill_channel: mpsc::Sender<BillRequest>,
    reminder_channel: mpsc::Sender<ReminderRequest>,
    user_channel: mpsc::Sender<UserRequest>,
}

pub type ApiError = (StatusCode, Json<Value>);

pub fn error_response(error: ServiceError) -> ApiError {
    let (status, label) = match &error {
        ServiceError::Validation(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
        ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "Not found"),
        ServiceError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "Access denied"),
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
    };

    if status.is_server_error() {
        log::error!("Request failed: {}", error);
    }

    (
        status,
        Json(json!({
            "error": label,
            "details": error.to_string()
        })),
    )
}

/// Turns axum's JSON body rejections into the same 400 shape as validation errors.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| error_response(ServiceError::Validation(rejection.body_text())))
}

pub fn path_id(path: Result<Path<i32>, PathRejection>) -> Result<i32, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|rejection| error_response(ServiceError::Validation(rejection.body_text())))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The caller resolved from the `Authorization: Bearer` header.
pub struct AuthUser(pub i32);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| {
                error_response(ServiceError::Unauthorized(
                    "Missing bearer token".to_string(),
                ))
            })?
            .to_string();

        let user_id = request(&state.user_channel, "UserService", |response| {
            UserRequest::Authenticate { token, response }
        })
        .await
        .map_err(error_response)?;

        Ok(AuthUser(user_id))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/bills", get(bills::list_bills).post(bills::create_bill))
        .route("/bills/remind", post(bills::remind))
        .route(
            "/bills/force-notification/{id}",
            post(bills::force_notification),
        )
        .route("/bills/reset-notifications", post(bills::reset_notifications))
        .route("/bills/test-notification", post(bills::test_notification))
        .route(
            "/bills/{id}",
            get(bills::get_bill)
                .put(bills::update_bill)
                .delete(bills::delete_bill),
        )
        .route("/users/me", get(users::get_me))
        .route("/users/push-token", post(users::set_push_token))
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_http_server(
    listen: &str,
    bill_channel: mpsc::Sender<BillRequest>,
    reminder_channel: mpsc::Sender<ReminderRequest>,
    user_channel: mpsc::Sender<UserRequest>,
) -> Result<(), anyhow::Error> {
    let app_state = AppState {
        bill_channel,
        reminder_channel,
        user_channel,
    };

    let listener = tokio::net::TcpListener::bind(listen).await?;
    log::info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, router(app_state)).await?;

    Ok(())
}
