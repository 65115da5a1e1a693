//! In-memory stand-ins for the stores and delivery channels.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;

use crate::models::bills::{Bill, BillUpdate, NewBill};
use crate::models::users::User;
use crate::repositories::{
    bills::{BillStore, SPECIFIC_DATE_HORIZON_HOURS},
    push::{PushData, PushSender},
    sms::SmsSender,
    users::UserStore,
};

pub fn new_bill(name: &str, date_of_month: i32) -> NewBill {
    NewBill {
        name: name.to_string(),
        amount: Decimal::new(4999, 2),
        date_of_month,
        specific_date: None,
        notification_hours_before: None,
    }
}

#[derive(Default)]
struct BillTable {
    rows: Vec<Bill>,
    next_id: i32,
    lost_claims: HashSet<i32>,
}

#[derive(Default)]
pub struct InMemoryBills {
    table: Mutex<BillTable>,
}

impl InMemoryBills {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(
        &self,
        user_id: i32,
        name: &str,
        date_of_month: i32,
        specific_date: Option<DateTime<Utc>>,
        hours_before: i32,
    ) -> Bill {
        let mut table = self.table.lock().unwrap();
        table.next_id += 1;
        let now = Utc::now();
        let bill = Bill {
            id: table.next_id,
            user_id,
            name: name.to_string(),
            amount: Decimal::new(4999, 2),
            date_of_month,
            specific_date,
            notification_hours_before: hours_before,
            notification_sent: false,
            created_at: now,
            updated_at: now,
        };
        table.rows.push(bill.clone());
        bill
    }

    pub fn add_recurring(&self, user_id: i32, name: &str, date_of_month: i32) -> i32 {
        self.insert(user_id, name, date_of_month, None, 3).id
    }

    pub fn add_dated(
        &self,
        user_id: i32,
        name: &str,
        due: DateTime<Utc>,
        hours_before: i32,
    ) -> i32 {
        self.insert(user_id, name, 1, Some(due), hours_before).id
    }

    pub fn get(&self, bill_id: i32) -> Bill {
        self.table
            .lock()
            .unwrap()
            .rows
            .iter()
            .find(|bill| bill.id == bill_id)
            .cloned()
            .expect("bill exists")
    }

    pub fn all(&self) -> Vec<Bill> {
        self.table.lock().unwrap().rows.clone()
    }

    pub fn set_sent(&self, bill_id: i32, sent: bool) {
        let mut table = self.table.lock().unwrap();
        if let Some(bill) = table.rows.iter_mut().find(|bill| bill.id == bill_id) {
            bill.notification_sent = sent;
        }
    }

    /// The next claim of `bill_id` behaves as if a concurrent sweep won it.
    pub fn lose_next_claim(&self, bill_id: i32) {
        self.table.lock().unwrap().lost_claims.insert(bill_id);
    }

    fn select(&self, filter: impl Fn(&Bill) -> bool) -> Vec<Bill> {
        self.table
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|bill| filter(bill))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BillStore for InMemoryBills {
    async fn list_bills(&self, user_id: i32) -> Result<Vec<Bill>, anyhow::Error> {
        let mut bills = self.select(|bill| bill.user_id == user_id);
        bills.sort_by_key(|bill| (bill.date_of_month, bill.id));
        Ok(bills)
    }

    async fn get_bill(&self, user_id: i32, bill_id: i32) -> Result<Option<Bill>, anyhow::Error> {
        Ok(self
            .select(|bill| bill.id == bill_id && bill.user_id == user_id)
            .pop())
    }

    async fn insert_bill(&self, user_id: i32, bill: &NewBill) -> Result<Bill, anyhow::Error> {
        let mut inserted = self.insert(
            user_id,
            bill.name.trim(),
            bill.date_of_month,
            bill.specific_date,
            bill.hours_before(),
        );

        let mut table = self.table.lock().unwrap();
        if let Some(row) = table.rows.iter_mut().find(|row| row.id == inserted.id) {
            row.amount = bill.amount;
            inserted.amount = bill.amount;
        }

        Ok(inserted)
    }

    async fn update_bill(
        &self,
        user_id: i32,
        bill_id: i32,
        update: &BillUpdate,
    ) -> Result<Option<Bill>, anyhow::Error> {
        let mut table = self.table.lock().unwrap();
        let row = table
            .rows
            .iter_mut()
            .find(|bill| bill.id == bill_id && bill.user_id == user_id);

        Ok(row.map(|bill| {
            bill.name = update.name.trim().to_string();
            bill.amount = update.amount;
            bill.date_of_month = update.date_of_month;
            bill.specific_date = update.specific_date;
            bill.notification_hours_before = update.hours_before();
            bill.notification_sent = update.notification_sent();
            bill.updated_at = Utc::now();
            bill.clone()
        }))
    }

    async fn delete_bill(&self, user_id: i32, bill_id: i32) -> Result<bool, anyhow::Error> {
        let mut table = self.table.lock().unwrap();
        let before = table.rows.len();
        table
            .rows
            .retain(|bill| !(bill.id == bill_id && bill.user_id == user_id));
        Ok(table.rows.len() < before)
    }

    async fn pending_dated_bills(
        &self,
        user_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Bill>, anyhow::Error> {
        Ok(self.select(|bill| {
            let horizon_hours = bill
                .notification_hours_before
                .max(SPECIFIC_DATE_HORIZON_HOURS);

            bill.user_id == user_id
                && !bill.notification_sent
                && bill
                    .specific_date
                    .map(|due| due <= now + ChronoDuration::hours(i64::from(horizon_hours)))
                    .unwrap_or(false)
        }))
    }

    async fn pending_recurring_bills(
        &self,
        user_id: i32,
        first_day: i32,
        last_day: i32,
    ) -> Result<Vec<Bill>, anyhow::Error> {
        Ok(self.select(|bill| {
            bill.user_id == user_id
                && !bill.notification_sent
                && bill.specific_date.is_none()
                && (first_day..=last_day).contains(&bill.date_of_month)
        }))
    }

    async fn claim_notification(&self, bill_id: i32) -> Result<bool, anyhow::Error> {
        let mut table = self.table.lock().unwrap();
        if table.lost_claims.remove(&bill_id) {
            return Ok(false);
        }

        match table
            .rows
            .iter_mut()
            .find(|bill| bill.id == bill_id && !bill.notification_sent)
        {
            Some(bill) => {
                bill.notification_sent = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn reset_notifications(&self, user_id: i32) -> Result<u64, anyhow::Error> {
        let mut table = self.table.lock().unwrap();
        let mut count = 0;
        for bill in table.rows.iter_mut().filter(|bill| bill.user_id == user_id) {
            bill.notification_sent = false;
            count += 1;
        }
        Ok(count)
    }

    async fn users_with_pending_bills(&self) -> Result<Vec<i32>, anyhow::Error> {
        let mut users: Vec<i32> = self
            .select(|bill| !bill.notification_sent)
            .into_iter()
            .map(|bill| bill.user_id)
            .collect();
        users.sort_unstable();
        users.dedup();
        Ok(users)
    }
}

#[derive(Default)]
pub struct InMemoryUsers {
    users: Mutex<HashMap<i32, User>>,
    tokens: Mutex<HashMap<String, i32>>,
}

impl InMemoryUsers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, id: i32, phone: Option<&str>, push_token: Option<&str>) {
        self.users.lock().unwrap().insert(
            id,
            User {
                id,
                name: format!("user-{}", id),
                email: format!("user-{}@example.com", id),
                phone: phone.map(str::to_string),
                push_token: push_token.map(str::to_string),
            },
        );
    }

    pub fn add_token(&self, token: &str, user_id: i32) {
        self.tokens
            .lock()
            .unwrap()
            .insert(token.to_string(), user_id);
    }

    pub fn user(&self, id: i32) -> Option<User> {
        self.users.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl UserStore for InMemoryUsers {
    async fn get_user(&self, user_id: i32) -> Result<Option<User>, anyhow::Error> {
        Ok(self.user(user_id))
    }

    async fn find_user_by_token(&self, token: &str) -> Result<Option<i32>, anyhow::Error> {
        Ok(self.tokens.lock().unwrap().get(token).copied())
    }

    async fn set_push_token(
        &self,
        user_id: i32,
        push_token: Option<&str>,
    ) -> Result<bool, anyhow::Error> {
        let mut users = self.users.lock().unwrap();
        match users.get_mut(&user_id) {
            Some(user) => {
                user.push_token = push_token.map(str::to_string);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct RecordingSms {
    messages: Mutex<Vec<(String, String)>>,
}

impl RecordingSms {
    pub fn messages(&self) -> Vec<(String, String)> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl SmsSender for RecordingSms {
    async fn send(&self, phone_number: &str, message: &str) {
        self.messages
            .lock()
            .unwrap()
            .push((phone_number.to_string(), message.to_string()));
    }
}

/// Never answers within any reasonable timeout.
pub struct SlowSms;

#[async_trait]
impl SmsSender for SlowSms {
    async fn send(&self, _phone_number: &str, _message: &str) {
        tokio::time::sleep(Duration::from_secs(60)).await;
    }
}

#[derive(Clone, Debug)]
pub struct SentPush {
    pub token: String,
    pub title: String,
    pub body: String,
    pub data: PushData,
}

#[derive(Default)]
pub struct RecordingPush {
    sent: Mutex<Vec<SentPush>>,
    fail: bool,
}

impl RecordingPush {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<SentPush> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushSender for RecordingPush {
    async fn send(
        &self,
        device_token: &str,
        title: &str,
        body: &str,
        data: &PushData,
    ) -> Result<String, anyhow::Error> {
        if self.fail {
            anyhow::bail!("provider rejected token {}", device_token)
        }

        let mut sent = self.sent.lock().unwrap();
        sent.push(SentPush {
            token: device_token.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            data: data.clone(),
        });

        Ok(format!("projects/test/messages/{}", sent.len()))
    }
}
