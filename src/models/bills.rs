use std::fmt;

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_NOTIFICATION_HOURS_BEFORE: i32 = 3;

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct Bill {
    pub id: i32,
    pub user_id: i32,
    pub name: String,
    pub amount: Decimal,
    pub date_of_month: i32,
    pub specific_date: Option<DateTime<Utc>>,
    pub notification_hours_before: i32,
    pub notification_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bill {
    /// An absolute `specific_date` always wins over the recurring day.
    pub fn due_spec(&self) -> DueSpec {
        match self.specific_date {
            Some(date) => DueSpec::Absolute(date),
            None => DueSpec::Recurring {
                day_of_month: self.date_of_month.max(0) as u32,
            },
        }
    }

    pub fn is_eligible<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        self.due_spec()
            .is_eligible(self.notification_hours_before, now)
    }

    /// Due phrase for reminders, with dates shown in server-local time.
    pub fn due_message(&self) -> String {
        self.due_message_in(&Local)
    }

    pub fn due_message_in<Tz: TimeZone>(&self, tz: &Tz) -> String
    where
        Tz::Offset: fmt::Display,
    {
        match self.due_spec() {
            DueSpec::Absolute(date) => format!(
                "due on {}",
                date.with_timezone(tz).format("%b %-d, %Y")
            ),
            DueSpec::Recurring { day_of_month } => format!("due on the {}th", day_of_month),
        }
    }

    /// The value sent as `billDate` in push payloads.
    pub fn due_label(&self) -> String {
        match self.specific_date {
            Some(date) => date.to_rfc3339(),
            None => self.date_of_month.to_string(),
        }
    }
}

/// When a bill falls due.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DueSpec {
    Recurring { day_of_month: u32 },
    Absolute(DateTime<Utc>),
}

impl DueSpec {
    /// Whether `now` is inside the notification window.
    ///
    /// Absolute dates fire once the rounded-up number of hours left drops to
    /// `hours_before` or below, overdue bills included. Recurring bills fire on
    /// their day and the day before it; `hours_before` is ignored for them.
    pub fn is_eligible<Tz: TimeZone>(&self, hours_before: i32, now: &DateTime<Tz>) -> bool {
        match self {
            DueSpec::Absolute(due) => hours_until_due(due, now) <= i64::from(hours_before),
            DueSpec::Recurring { day_of_month } => {
                let today = now.day();
                // Tomorrow is today + 1 with no month rollover, so a bill on the
                // 1st is missed on the last day of the previous month.
                let tomorrow = today + 1;
                *day_of_month == today || *day_of_month == tomorrow
            }
        }
    }
}

/// Hours until `due`, rounded up. Negative once the date has passed.
pub fn hours_until_due<Tz: TimeZone>(due: &DateTime<Utc>, now: &DateTime<Tz>) -> i64 {
    let millis = due.timestamp_millis() - now.timestamp_millis();
    let hours = millis / MILLIS_PER_HOUR;

    if millis % MILLIS_PER_HOUR > 0 {
        hours + 1
    } else {
        hours
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct NewBill {
    pub name: String,
    pub amount: Decimal,
    pub date_of_month: i32,
    #[serde(default, deserialize_with = "deserialize_due_date")]
    pub specific_date: Option<DateTime<Utc>>,
    pub notification_hours_before: Option<i32>,
}

impl NewBill {
    pub fn validate(&self) -> Result<(), String> {
        validate_fields(
            &self.name,
            self.amount,
            self.date_of_month,
            self.notification_hours_before,
        )
    }

    pub fn hours_before(&self) -> i32 {
        self.notification_hours_before
            .unwrap_or(DEFAULT_NOTIFICATION_HOURS_BEFORE)
    }
}

/// Full replacement of a bill's editable fields.
#[derive(Clone, Debug, Deserialize)]
pub struct BillUpdate {
    pub name: String,
    pub amount: Decimal,
    pub date_of_month: i32,
    #[serde(default, deserialize_with = "deserialize_due_date")]
    pub specific_date: Option<DateTime<Utc>>,
    pub notification_hours_before: Option<i32>,
    pub notification_sent: Option<bool>,
}

impl BillUpdate {
    pub fn validate(&self) -> Result<(), String> {
        validate_fields(
            &self.name,
            self.amount,
            self.date_of_month,
            self.notification_hours_before,
        )
    }

    pub fn hours_before(&self) -> i32 {
        self.notification_hours_before
            .unwrap_or(DEFAULT_NOTIFICATION_HOURS_BEFORE)
    }

    /// Editing a bill re-arms its reminder unless the caller says otherwise.
    pub fn notification_sent(&self) -> bool {
        self.notification_sent.unwrap_or(false)
    }
}

fn validate_fields(
    name: &str,
    amount: Decimal,
    date_of_month: i32,
    hours_before: Option<i32>,
) -> Result<(), String> {
    if name.trim().is_empty() {
        return Err("name is required".to_string());
    }
    if amount <= Decimal::ZERO {
        return Err("amount must be positive".to_string());
    }
    if !(1..=31).contains(&date_of_month) {
        return Err("date_of_month must be between 1 and 31".to_string());
    }
    if let Some(hours) = hours_before {
        if hours < 0 {
            return Err("notification_hours_before cannot be negative".to_string());
        }
    }

    Ok(())
}

/// Accepts RFC 3339 timestamps and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_due_date(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
        .map_err(|_| format!("invalid specific_date: {}", value))
}

fn deserialize_due_date<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;

    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_due_date(value)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}
