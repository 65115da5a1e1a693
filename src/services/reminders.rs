use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local, Utc};
use dashmap::DashMap;
use futures_util::future::join_all;
use tokio::sync::{oneshot, Mutex};

use super::{RequestHandler, Service, ServiceError};
use crate::models::bills::Bill;
use crate::models::reminders::{ForcedNotification, SweepSummary, TestNotification};
use crate::models::users::User;
use crate::repositories::{
    bills::BillStore,
    push::{PushData, PushSender},
    sms::SmsSender,
    users::UserStore,
};
use crate::settings;

const REMINDER_TITLE: &str = "Bill Payment Reminder";
const FORCED_TITLE: &str = "Test Bill Notification";
const TEST_TITLE: &str = "Test Notification";
const TEST_BODY: &str = "This is a test notification from your expense tracker app.";

pub enum ReminderRequest {
    Sweep {
        user_id: i32,
        response: oneshot::Sender<Result<SweepSummary, ServiceError>>,
    },
    ForceNotification {
        user_id: i32,
        bill_id: i32,
        response: oneshot::Sender<Result<ForcedNotification, ServiceError>>,
    },
    TestNotification {
        user_id: i32,
        response: oneshot::Sender<Result<TestNotification, ServiceError>>,
    },
    ResetNotifications {
        user_id: i32,
        response: oneshot::Sender<Result<u64, ServiceError>>,
    },
}

#[derive(Clone)]
pub struct ReminderRequestHandler {
    bills: Arc<dyn BillStore>,
    users: Arc<dyn UserStore>,
    sms: Arc<dyn SmsSender>,
    push: Arc<dyn PushSender>,
    channel_timeout: Duration,
    currency_symbol: String,
    sweep_locks: Arc<DashMap<i32, Arc<Mutex<()>>>>,
}

impl ReminderRequestHandler {
    pub fn new(
        bills: Arc<dyn BillStore>,
        users: Arc<dyn UserStore>,
        sms: Arc<dyn SmsSender>,
        push: Arc<dyn PushSender>,
        settings: &settings::Reminders,
    ) -> Self {
        Self {
            bills,
            users,
            sms,
            push,
            channel_timeout: Duration::from_secs(settings.channel_timeout_secs),
            currency_symbol: settings.currency_symbol.clone(),
            sweep_locks: Arc::new(DashMap::new()),
        }
    }

    pub async fn run_sweep(&self, user_id: i32) -> Result<SweepSummary, ServiceError> {
        self.run_sweep_at(user_id, Local::now()).await
    }

    /// Sends reminders for every unsent bill of `user_id` that is inside its
    /// notification window at `now`.
    pub async fn run_sweep_at(
        &self,
        user_id: i32,
        now: DateTime<Local>,
    ) -> Result<SweepSummary, ServiceError> {
        let lock = self.sweep_lock(user_id);
        let summary = {
            let _guard = lock.lock().await;
            self.sweep_locked(user_id, now).await
        };

        // Only the map and `lock` hold the mutex: nobody else is waiting on it.
        self.sweep_locks
            .remove_if(&user_id, |_, entry| Arc::strong_count(entry) == 2);

        summary
    }

    async fn sweep_locked(
        &self,
        user_id: i32,
        now: DateTime<Local>,
    ) -> Result<SweepSummary, ServiceError> {
        let today = now.day() as i32;
        let mut candidates = self
            .bills
            .pending_dated_bills(user_id, now.with_timezone(&Utc))
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;
        candidates.extend(
            self.bills
                .pending_recurring_bills(user_id, today, today + 1)
                .await
                .map_err(|e| ServiceError::Database(e.to_string()))?,
        );

        log::info!(
            "Reminder sweep for user {} at {}: {} candidate bills.",
            user_id,
            now.to_rfc3339(),
            candidates.len()
        );

        let due: Vec<Bill> = candidates
            .into_iter()
            .filter(|bill| {
                let eligible = bill.is_eligible(&now);
                if !eligible {
                    log::debug!(
                        "Skipping bill {} - not within notification window yet.",
                        bill.id
                    );
                }
                eligible
            })
            .collect();

        if due.is_empty() {
            log::info!("No bills to send notifications for user {}.", user_id);
            return Ok(SweepSummary::new(0));
        }

        let user = self
            .users
            .get_user(user_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("User {}", user_id)))?;

        log::debug!(
            "User {} phone: {}, push token: {}",
            user_id,
            if user.sms_destination().is_some() { "available" } else { "not available" },
            if user.push_destination().is_some() { "available" } else { "not available" }
        );

        let mut count = 0;
        for reminded in join_all(due.iter().map(|bill| self.remind(bill, &user))).await {
            if reminded? {
                count += 1;
            }
        }

        log::info!("Sent reminders for {} bills of user {}.", count, user_id);
        Ok(SweepSummary::new(count))
    }

    /// Claims `bill` and dispatches its reminder on every channel the user has.
    /// Returns false when another sweep claimed it first.
    async fn remind(&self, bill: &Bill, user: &User) -> Result<bool, ServiceError> {
        let claimed = self
            .bills
            .claim_notification(bill.id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        if !claimed {
            log::info!("Bill {} was already reminded by another sweep.", bill.id);
            return Ok(false);
        }

        let text = format!(
            "{}{} for {} is {}",
            self.currency_symbol,
            bill.amount,
            bill.name,
            bill.due_message()
        );

        let sms = async {
            if let Some(phone) = user.sms_destination() {
                log::info!("Sending SMS for bill {}", bill.id);
                let message = format!("🔔 Reminder: {}", text);
                self.with_timeout("SMS", bill.id, self.sms.send(phone, &message))
                    .await;
            }
        };

        let push = async {
            if let Some(token) = user.push_destination() {
                log::info!("Sending push notification for bill {}", bill.id);
                let mut data = PushData::new();
                data.insert("billName".to_string(), bill.name.clone());
                data.insert("billAmount".to_string(), bill.amount.to_string());
                data.insert("billDate".to_string(), bill.due_label());
                self.send_push(bill.id, token, REMINDER_TITLE, &text, &data)
                    .await;
            }
        };

        tokio::join!(sms, push);

        Ok(true)
    }

    async fn with_timeout<F: Future>(&self, channel: &str, bill_id: i32, call: F) -> Option<F::Output> {
        match tokio::time::timeout(self.channel_timeout, call).await {
            Ok(output) => Some(output),
            Err(_) => {
                log::warn!(
                    "{} delivery for bill {} timed out after {:?}.",
                    channel,
                    bill_id,
                    self.channel_timeout
                );
                None
            }
        }
    }

    async fn send_push(
        &self,
        bill_id: i32,
        token: &str,
        title: &str,
        body: &str,
        data: &PushData,
    ) -> bool {
        let delivery = self
            .with_timeout("Push", bill_id, self.push.send(token, title, body, data))
            .await;

        match delivery {
            Some(Ok(receipt)) => {
                log::debug!("Push receipt for bill {}: {}", bill_id, receipt);
                true
            }
            Some(Err(e)) => {
                log::error!("Push notification for bill {} failed: {}", bill_id, e);
                false
            }
            None => false,
        }
    }

    /// Pushes a reminder for one bill regardless of its window or sent flag.
    pub async fn force_notification(
        &self,
        user_id: i32,
        bill_id: i32,
    ) -> Result<ForcedNotification, ServiceError> {
        log::info!(
            "Force notification request for bill {} from user {}",
            bill_id,
            user_id
        );

        let bill = self
            .bills
            .get_bill(user_id, bill_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("Bill {}", bill_id)))?;

        let owner = self
            .users
            .get_user(bill.user_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        let token = match owner.as_ref().and_then(|user| user.push_destination()) {
            Some(token) => token,
            None => {
                log::info!("Push token not found for user {}", bill.user_id);
                return Ok(ForcedNotification {
                    success: false,
                    message: "Push token not found".to_string(),
                });
            }
        };

        let mut data = PushData::new();
        data.insert("test".to_string(), "true".to_string());
        data.insert("billId".to_string(), bill.id.to_string());
        data.insert("timestamp".to_string(), Utc::now().to_rfc3339());

        let body = format!(
            "Test reminder for {} ({}{})",
            bill.name, self.currency_symbol, bill.amount
        );

        if self.send_push(bill.id, token, FORCED_TITLE, &body, &data).await {
            Ok(ForcedNotification {
                success: true,
                message: format!("Test notification sent for bill: {}", bill.name),
            })
        } else {
            Ok(ForcedNotification {
                success: false,
                message: format!("Failed to send notification for bill: {}", bill.name),
            })
        }
    }

    pub async fn send_test_notification(&self, user_id: i32) -> Result<TestNotification, ServiceError> {
        let user = self
            .users
            .get_user(user_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        let token = match user.as_ref().and_then(|user| user.push_destination()) {
            Some(token) => token,
            None => {
                return Ok(TestNotification {
                    sent: false,
                    error: Some("No push token found for this user".to_string()),
                })
            }
        };

        let mut data = PushData::new();
        data.insert("test".to_string(), "true".to_string());
        data.insert("timestamp".to_string(), Utc::now().to_rfc3339());

        let delivery = tokio::time::timeout(
            self.channel_timeout,
            self.push.send(token, TEST_TITLE, TEST_BODY, &data),
        )
        .await;

        match delivery {
            Ok(Ok(_)) => Ok(TestNotification {
                sent: true,
                error: None,
            }),
            Ok(Err(e)) => {
                log::error!("Test notification error: {}", e);
                Ok(TestNotification {
                    sent: false,
                    error: Some(e.to_string()),
                })
            }
            Err(_) => Ok(TestNotification {
                sent: false,
                error: Some("Push delivery timed out".to_string()),
            }),
        }
    }

    pub async fn reset_notifications(&self, user_id: i32) -> Result<u64, ServiceError> {
        let count = self
            .bills
            .reset_notifications(user_id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        log::info!("Reset notification status for {} bills of user {}", count, user_id);
        Ok(count)
    }

    pub async fn sweep_all_users(&self) -> Result<SweepSummary, ServiceError> {
        self.sweep_all_users_at(Local::now()).await
    }

    /// Batch variant: one sweep per user that still has unsent bills. A
    /// failing user is logged and skipped.
    pub async fn sweep_all_users_at(&self, now: DateTime<Local>) -> Result<SweepSummary, ServiceError> {
        let users = self
            .bills
            .users_with_pending_bills()
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        let mut count = 0;
        for user_id in users {
            match self.run_sweep_at(user_id, now).await {
                Ok(summary) => count += summary.count,
                Err(e) => log::error!("Reminder sweep failed for user {}: {}", user_id, e),
            }
        }

        Ok(SweepSummary::new(count))
    }

    pub fn start_sweep_task(&self, every: Duration) {
        let handler = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);

            loop {
                interval.tick().await;

                match handler.sweep_all_users().await {
                    Ok(summary) => log::info!("Scheduled sweep reminded {} bills.", summary.count),
                    Err(e) => log::error!("Scheduled reminder sweep failed: {}", e),
                }
            }
        });

        log::info!("Reminder sweep task started, every {:?}", every);
    }

    fn sweep_lock(&self, user_id: i32) -> Arc<Mutex<()>> {
        self.sweep_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl RequestHandler<ReminderRequest> for ReminderRequestHandler {
    async fn handle_request(&self, request: ReminderRequest) {
        match request {
            ReminderRequest::Sweep { user_id, response } => {
                let summary = self.run_sweep(user_id).await;
                let _ = response.send(summary);
            }
            ReminderRequest::ForceNotification {
                user_id,
                bill_id,
                response,
            } => {
                let result = self.force_notification(user_id, bill_id).await;
                let _ = response.send(result);
            }
            ReminderRequest::TestNotification { user_id, response } => {
                let result = self.send_test_notification(user_id).await;
                let _ = response.send(result);
            }
            ReminderRequest::ResetNotifications { user_id, response } => {
                let count = self.reset_notifications(user_id).await;
                let _ = response.send(count);
            }
        }
    }
}

pub struct ReminderService;

impl ReminderService {
    pub fn new() -> Self {
        ReminderService {}
    }
}

#[async_trait]
impl Service<ReminderRequest, ReminderRequestHandler> for ReminderService {}
