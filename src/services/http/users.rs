use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde_json::{json, Value};

use super::{error_response, json_body, ApiError, AppState, AuthUser};
use crate::models::users::{PushTokenUpdate, UserProfile};
use crate::services::{request, users::UserRequest};

pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<UserProfile>, ApiError> {
    request(&state.user_channel, "UserService", |response| {
        UserRequest::GetProfile {
            id: user_id,
            response,
        }
    })
    .await
    .map(Json)
    .map_err(error_response)
}

pub async fn set_push_token(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<PushTokenUpdate>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let update = json_body(payload)?;

    request(&state.user_channel, "UserService", |response| {
        UserRequest::SetPushToken {
            id: user_id,
            push_token: update.push_token,
            response,
        }
    })
    .await
    .map_err(error_response)?;

    Ok(Json(json!({"message": "Push token updated successfully"})))
}
