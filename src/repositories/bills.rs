use crate::models::bills::{Bill, BillUpdate, NewBill};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Shortest look-ahead used by the specific-date pre-filter.
pub const SPECIFIC_DATE_HORIZON_HOURS: i32 = 48;

#[async_trait]
pub trait BillStore: Send + Sync + 'static {
    async fn list_bills(&self, user_id: i32) -> Result<Vec<Bill>, anyhow::Error>;

    async fn get_bill(&self, user_id: i32, bill_id: i32) -> Result<Option<Bill>, anyhow::Error>;

    async fn insert_bill(&self, user_id: i32, bill: &NewBill) -> Result<Bill, anyhow::Error>;

    async fn update_bill(
        &self,
        user_id: i32,
        bill_id: i32,
        update: &BillUpdate,
    ) -> Result<Option<Bill>, anyhow::Error>;

    async fn delete_bill(&self, user_id: i32, bill_id: i32) -> Result<bool, anyhow::Error>;

    /// Unsent bills with a specific date no later than
    /// `now + max(48h, notification_hours_before)`.
    async fn pending_dated_bills(
        &self,
        user_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Bill>, anyhow::Error>;

    /// Unsent bills without a specific date whose day falls in `first_day..=last_day`.
    async fn pending_recurring_bills(
        &self,
        user_id: i32,
        first_day: i32,
        last_day: i32,
    ) -> Result<Vec<Bill>, anyhow::Error>;

    /// Flips `notification_sent` to true if it is still false. Returns whether
    /// this caller won the flip.
    async fn claim_notification(&self, bill_id: i32) -> Result<bool, anyhow::Error>;

    async fn reset_notifications(&self, user_id: i32) -> Result<u64, anyhow::Error>;

    async fn users_with_pending_bills(&self) -> Result<Vec<i32>, anyhow::Error>;
}

#[derive(Clone)]
pub struct BillRepository {
    conn: PgPool,
}

impl BillRepository {
    pub fn new(conn: PgPool) -> Self {
        BillRepository { conn }
    }
}

#[async_trait]
impl BillStore for BillRepository {
    async fn list_bills(&self, user_id: i32) -> Result<Vec<Bill>, anyhow::Error> {
        let bills = sqlx::query_as::<_, Bill>(
            "SELECT * FROM bills WHERE user_id = $1 ORDER BY date_of_month, id",
        )
        .bind(user_id)
        .fetch_all(&self.conn)
        .await?;

        Ok(bills)
    }

    async fn get_bill(&self, user_id: i32, bill_id: i32) -> Result<Option<Bill>, anyhow::Error> {
        let bill = sqlx::query_as::<_, Bill>("SELECT * FROM bills WHERE id = $1 AND user_id = $2")
            .bind(bill_id)
            .bind(user_id)
            .fetch_optional(&self.conn)
            .await?;

        Ok(bill)
    }

    async fn insert_bill(&self, user_id: i32, bill: &NewBill) -> Result<Bill, anyhow::Error> {
        let bill = sqlx::query_as::<_, Bill>(
            r#"
                INSERT INTO bills
                (user_id, name, amount, date_of_month, specific_date, notification_hours_before, notification_sent)
                VALUES ($1, $2, $3, $4, $5, $6, false)
                RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(bill.name.trim())
        .bind(bill.amount)
        .bind(bill.date_of_month)
        .bind(bill.specific_date)
        .bind(bill.hours_before())
        .fetch_one(&self.conn)
        .await?;

        Ok(bill)
    }

    async fn update_bill(
        &self,
        user_id: i32,
        bill_id: i32,
        update: &BillUpdate,
    ) -> Result<Option<Bill>, anyhow::Error> {
        let bill = sqlx::query_as::<_, Bill>(
            r#"
                UPDATE bills
                SET name = $1,
                    amount = $2,
                    date_of_month = $3,
                    specific_date = $4,
                    notification_hours_before = $5,
                    notification_sent = $6,
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = $7 AND user_id = $8
                RETURNING *
            "#,
        )
        .bind(update.name.trim())
        .bind(update.amount)
        .bind(update.date_of_month)
        .bind(update.specific_date)
        .bind(update.hours_before())
        .bind(update.notification_sent())
        .bind(bill_id)
        .bind(user_id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(bill)
    }

    async fn delete_bill(&self, user_id: i32, bill_id: i32) -> Result<bool, anyhow::Error> {
        let result = sqlx::query("DELETE FROM bills WHERE id = $1 AND user_id = $2")
            .bind(bill_id)
            .bind(user_id)
            .execute(&self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn pending_dated_bills(
        &self,
        user_id: i32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Bill>, anyhow::Error> {
        let bills = sqlx::query_as::<_, Bill>(
            r#"
                SELECT * FROM bills
                WHERE user_id = $1
                  AND specific_date IS NOT NULL
                  AND notification_sent = false
                  AND specific_date <= $2 + make_interval(hours => GREATEST(notification_hours_before, $3))
                ORDER BY specific_date
            "#,
        )
        .bind(user_id)
        .bind(now)
        .bind(SPECIFIC_DATE_HORIZON_HOURS)
        .fetch_all(&self.conn)
        .await?;

        Ok(bills)
    }

    async fn pending_recurring_bills(
        &self,
        user_id: i32,
        first_day: i32,
        last_day: i32,
    ) -> Result<Vec<Bill>, anyhow::Error> {
        let bills = sqlx::query_as::<_, Bill>(
            r#"
                SELECT * FROM bills
                WHERE user_id = $1
                  AND specific_date IS NULL
                  AND notification_sent = false
                  AND date_of_month BETWEEN $2 AND $3
                ORDER BY date_of_month
            "#,
        )
        .bind(user_id)
        .bind(first_day)
        .bind(last_day)
        .fetch_all(&self.conn)
        .await?;

        Ok(bills)
    }

    async fn claim_notification(&self, bill_id: i32) -> Result<bool, anyhow::Error> {
        let claimed: Option<i32> = sqlx::query_scalar(
            r#"
                UPDATE bills
                SET notification_sent = true, updated_at = CURRENT_TIMESTAMP
                WHERE id = $1 AND notification_sent = false
                RETURNING id
            "#,
        )
        .bind(bill_id)
        .fetch_optional(&self.conn)
        .await?;

        Ok(claimed.is_some())
    }

    async fn reset_notifications(&self, user_id: i32) -> Result<u64, anyhow::Error> {
        let result = sqlx::query(
            "UPDATE bills SET notification_sent = false, updated_at = CURRENT_TIMESTAMP WHERE user_id = $1",
        )
        .bind(user_id)
        .execute(&self.conn)
        .await?;

        Ok(result.rows_affected())
    }

    async fn users_with_pending_bills(&self) -> Result<Vec<i32>, anyhow::Error> {
        let users: Vec<i32> = sqlx::query_scalar(
            "SELECT DISTINCT user_id FROM bills WHERE notification_sent = false ORDER BY user_id",
        )
        .fetch_all(&self.conn)
        .await?;

        Ok(users)
    }
}
