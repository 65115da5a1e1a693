use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::{mpsc, oneshot};

use crate::models::reminders::SweepSummary;
use crate::repositories::{
    bills::{BillRepository, BillStore},
    push::{DisabledPush, FcmPush, PushSender},
    sms::{DisabledSms, SmsSender, TwilioSms},
    users::{UserRepository, UserStore},
};
use crate::settings::Settings;

pub mod bills;
mod http;
pub mod reminders;
pub mod users;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Repository error: {0} - {1}")]
    Repository(String, String),
    #[error("Communication error: {0} - {1}")]
    Communication(String, String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

#[async_trait]
pub trait RequestHandler<T>: Send + Sync + 'static
where
    T: Send + 'static,
{
    async fn handle_request(&self, request: T);
}

#[async_trait]
pub trait Service<T, H>: Send + Sync + 'static
where
    T: Send + 'static,
    H: RequestHandler<T> + Clone + Send,
{
    async fn run(&mut self, handler: H, receiver: &mut mpsc::Receiver<T>) {
        while let Some(request) = receiver.recv().await {
            let handler = handler.clone();

            tokio::spawn(async move {
                handler.handle_request(request).await;
            });
        }
    }
}

/// Sends a request built around a fresh reply channel and waits for the answer.
pub async fn request<T, R>(
    channel: &mpsc::Sender<T>,
    service: &str,
    build: impl FnOnce(oneshot::Sender<Result<R, ServiceError>>) -> T,
) -> Result<R, ServiceError> {
    let (response_tx, response_rx) = oneshot::channel();

    channel
        .send(build(response_tx))
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?;

    response_rx
        .await
        .map_err(|e| ServiceError::Communication(service.to_string(), e.to_string()))?
}

fn notification_channels(
    settings: &Settings,
) -> Result<(Arc<dyn SmsSender>, Arc<dyn PushSender>), anyhow::Error> {
    let timeout = Duration::from_secs(settings.reminders.channel_timeout_secs);

    let sms: Arc<dyn SmsSender> = match &settings.sms {
        Some(sms) => Arc::new(TwilioSms::new(sms, timeout)?),
        None => {
            log::warn!("No [sms] section configured, SMS reminders are disabled.");
            Arc::new(DisabledSms)
        }
    };

    let push: Arc<dyn PushSender> = match &settings.push {
        Some(push) => Arc::new(FcmPush::new(push, timeout)?),
        None => {
            log::warn!("No [push] section configured, push reminders are disabled.");
            Arc::new(DisabledPush)
        }
    };

    Ok((sms, push))
}

fn reminder_handler(
    pool: &PgPool,
    settings: &Settings,
) -> Result<reminders::ReminderRequestHandler, anyhow::Error> {
    let (sms, push) = notification_channels(settings)?;
    let bill_store: Arc<dyn BillStore> = Arc::new(BillRepository::new(pool.clone()));
    let user_store: Arc<dyn UserStore> = Arc::new(UserRepository::new(pool.clone()));

    Ok(reminders::ReminderRequestHandler::new(
        bill_store,
        user_store,
        sms,
        push,
        &settings.reminders,
    ))
}

/// One batch sweep over every user with pending bills.
pub async fn run_sweep_once(pool: PgPool, settings: &Settings) -> Result<SweepSummary, anyhow::Error> {
    let handler = reminder_handler(&pool, settings)?;

    Ok(handler.sweep_all_users().await?)
}

pub async fn start_services(pool: PgPool, settings: Settings) -> Result<(), anyhow::Error> {
    let (bill_tx, mut bill_rx) = mpsc::channel(512);
    let (reminder_tx, mut reminder_rx) = mpsc::channel(512);
    let (user_tx, mut user_rx) = mpsc::channel(512);

    let mut bill_service = bills::BillService::new();
    let mut reminder_service = reminders::ReminderService::new();
    let mut user_service = users::UserService::new();

    log::info!("Starting bill service.");
    let bill_store: Arc<dyn BillStore> = Arc::new(BillRepository::new(pool.clone()));
    tokio::spawn(async move {
        bill_service
            .run(bills::BillRequestHandler::new(bill_store), &mut bill_rx)
            .await;
    });

    log::info!("Starting reminder service.");
    let handler = reminder_handler(&pool, &settings)?;
    if settings.reminders.sweep_interval_secs > 0 {
        handler.start_sweep_task(Duration::from_secs(settings.reminders.sweep_interval_secs));
    }
    tokio::spawn(async move {
        reminder_service.run(handler, &mut reminder_rx).await;
    });

    log::info!("Starting user service.");
    let user_store: Arc<dyn UserStore> = Arc::new(UserRepository::new(pool.clone()));
    tokio::spawn(async move {
        user_service
            .run(users::UserRequestHandler::new(user_store), &mut user_rx)
            .await;
    });

    log::info!("Starting HTTP server.");
    http::start_http_server(&settings.http.listen, bill_tx, reminder_tx, user_tx).await
}
