use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use super::{error_response, json_body, path_id, ApiError, AppState, AuthUser};
use crate::models::bills::{Bill, BillUpdate, NewBill};
use crate::models::reminders::{ForcedNotification, SweepSummary, TestNotification};
use crate::services::{bills::BillRequest, reminders::ReminderRequest, request};

pub async fn list_bills(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<Bill>>, ApiError> {
    request(&state.bill_channel, "BillService", |response| {
        BillRequest::ListBills { user_id, response }
    })
    .await
    .map(Json)
    .map_err(error_response)
}

pub async fn get_bill(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    bill_id: Result<Path<i32>, PathRejection>,
) -> Result<Json<Bill>, ApiError> {
    let bill_id = path_id(bill_id)?;
    request(&state.bill_channel, "BillService", |response| {
        BillRequest::GetBill {
            user_id,
            bill_id,
            response,
        }
    })
    .await
    .map(Json)
    .map_err(error_response)
}

pub async fn create_bill(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    payload: Result<Json<NewBill>, JsonRejection>,
) -> Result<(StatusCode, Json<Bill>), ApiError> {
    let bill = json_body(payload)?;

    let bill = request(&state.bill_channel, "BillService", |response| {
        BillRequest::CreateBill {
            user_id,
            bill,
            response,
        }
    })
    .await
    .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(bill)))
}

pub async fn update_bill(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    bill_id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<BillUpdate>, JsonRejection>,
) -> Result<Json<Bill>, ApiError> {
    let bill_id = path_id(bill_id)?;
    let update = json_body(payload)?;

    request(&state.bill_channel, "BillService", |response| {
        BillRequest::UpdateBill {
            user_id,
            bill_id,
            update,
            response,
        }
    })
    .await
    .map(Json)
    .map_err(error_response)
}

pub async fn delete_bill(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    bill_id: Result<Path<i32>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let bill_id = path_id(bill_id)?;
    request(&state.bill_channel, "BillService", |response| {
        BillRequest::DeleteBill {
            user_id,
            bill_id,
            response,
        }
    })
    .await
    .map_err(error_response)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn remind(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<SweepSummary>, ApiError> {
    request(&state.reminder_channel, "ReminderService", |response| {
        ReminderRequest::Sweep { user_id, response }
    })
    .await
    .map(Json)
    .map_err(error_response)
}

pub async fn force_notification(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    bill_id: Result<Path<i32>, PathRejection>,
) -> Result<Json<ForcedNotification>, ApiError> {
    let bill_id = path_id(bill_id)?;
    request(&state.reminder_channel, "ReminderService", |response| {
        ReminderRequest::ForceNotification {
            user_id,
            bill_id,
            response,
        }
    })
    .await
    .map(Json)
    .map_err(error_response)
}

pub async fn reset_notifications(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Value>, ApiError> {
    let count = request(&state.reminder_channel, "ReminderService", |response| {
        ReminderRequest::ResetNotifications { user_id, response }
    })
    .await
    .map_err(error_response)?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Reset notification status for {} bills", count),
        "count": count
    })))
}

pub async fn test_notification(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<TestNotification>, ApiError> {
    request(&state.reminder_channel, "ReminderService", |response| {
        ReminderRequest::TestNotification { user_id, response }
    })
    .await
    .map(Json)
    .map_err(error_response)
}
