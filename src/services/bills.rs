use std::sync::Arc;

use async_trait::async_trait;
use chrono::Local;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::models::bills::{hours_until_due, Bill, BillUpdate, NewBill};
use crate::repositories::bills::BillStore;

pub enum BillRequest {
    ListBills {
        user_id: i32,
        response: oneshot::Sender<Result<Vec<Bill>, ServiceError>>,
    },
    GetBill {
        user_id: i32,
        bill_id: i32,
        response: oneshot::Sender<Result<Bill, ServiceError>>,
    },
    CreateBill {
        user_id: i32,
        bill: NewBill,
        response: oneshot::Sender<Result<Bill, ServiceError>>,
    },
    UpdateBill {
        user_id: i32,
        bill_id: i32,
        update: BillUpdate,
        response: oneshot::Sender<Result<Bill, ServiceError>>,
    },
    DeleteBill {
        user_id: i32,
        bill_id: i32,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
}

#[derive(Clone)]
pub struct BillRequestHandler {
    repository: Arc<dyn BillStore>,
}

impl BillRequestHandler {
    pub fn new(repository: Arc<dyn BillStore>) -> Self {
        BillRequestHandler { repository }
    }

    async fn list_bills(&self, user_id: i32) -> Result<Vec<Bill>, ServiceError> {
        self.repository
            .list_bills(user_id)
            .await
            .map_err(|e| ServiceError::Repository("Bills".to_string(), e.to_string()))
    }

    async fn get_bill(&self, user_id: i32, bill_id: i32) -> Result<Bill, ServiceError> {
        self.repository
            .get_bill(user_id, bill_id)
            .await
            .map_err(|e| ServiceError::Repository("Bills".to_string(), e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("Bill {}", bill_id)))
    }

    async fn create_bill(&self, user_id: i32, bill: NewBill) -> Result<Bill, ServiceError> {
        bill.validate().map_err(ServiceError::Validation)?;

        let bill = self
            .repository
            .insert_bill(user_id, &bill)
            .await
            .map_err(|e| ServiceError::Repository("Bills".to_string(), e.to_string()))?;

        log::info!("Bill {} created for user {}", bill.id, user_id);
        if let Some(due) = bill.specific_date {
            let now = Local::now();
            if bill.is_eligible(&now) {
                log::info!(
                    "Bill {} is due in {} hours, inside its {} hour notification window.",
                    bill.id,
                    hours_until_due(&due, &now),
                    bill.notification_hours_before
                );
            }
        }

        Ok(bill)
    }

    async fn update_bill(
        &self,
        user_id: i32,
        bill_id: i32,
        update: BillUpdate,
    ) -> Result<Bill, ServiceError> {
        update.validate().map_err(ServiceError::Validation)?;

        let bill = self
            .repository
            .update_bill(user_id, bill_id, &update)
            .await
            .map_err(|e| ServiceError::Repository("Bills".to_string(), e.to_string()))?
            .ok_or_else(|| ServiceError::NotFound(format!("Bill {}", bill_id)))?;

        log::info!(
            "Bill {} updated for user {} (notification_sent = {})",
            bill.id,
            user_id,
            bill.notification_sent
        );
        Ok(bill)
    }

    async fn delete_bill(&self, user_id: i32, bill_id: i32) -> Result<(), ServiceError> {
        let deleted = self
            .repository
            .delete_bill(user_id, bill_id)
            .await
            .map_err(|e| ServiceError::Repository("Bills".to_string(), e.to_string()))?;

        if !deleted {
            return Err(ServiceError::NotFound(format!("Bill {}", bill_id)));
        }

        log::info!("Bill {} deleted for user {}", bill_id, user_id);
        Ok(())
    }
}

#[async_trait]
impl RequestHandler<BillRequest> for BillRequestHandler {
    async fn handle_request(&self, request: BillRequest) {
        match request {
            BillRequest::ListBills { user_id, response } => {
                let bills = self.list_bills(user_id).await;
                let _ = response.send(bills);
            }
            BillRequest::GetBill {
                user_id,
                bill_id,
                response,
            } => {
                let bill = self.get_bill(user_id, bill_id).await;
                let _ = response.send(bill);
            }
            BillRequest::CreateBill {
                user_id,
                bill,
                response,
            } => {
                let bill = self.create_bill(user_id, bill).await;
                let _ = response.send(bill);
            }
            BillRequest::UpdateBill {
                user_id,
                bill_id,
                update,
                response,
            } => {
                let bill = self.update_bill(user_id, bill_id, update).await;
                let _ = response.send(bill);
            }
            BillRequest::DeleteBill {
                user_id,
                bill_id,
                response,
            } => {
                let result = self.delete_bill(user_id, bill_id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct BillService;

impl BillService {
    pub fn new() -> Self {
        BillService {}
    }
}

#[async_trait]
impl Service<BillRequest, BillRequestHandler> for BillService {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_bill, InMemoryBills};
    use rust_decimal::Decimal;

    fn handler() -> (BillRequestHandler, Arc<InMemoryBills>) {
        let bills = Arc::new(InMemoryBills::new());
        (BillRequestHandler::new(bills.clone()), bills)
    }

    fn update_of(bill: &Bill) -> BillUpdate {
        BillUpdate {
            name: bill.name.clone(),
            amount: bill.amount,
            date_of_month: bill.date_of_month,
            specific_date: bill.specific_date,
            notification_hours_before: Some(bill.notification_hours_before),
            notification_sent: None,
        }
    }

    #[tokio::test]
    async fn new_bills_start_unsent_with_default_lead_time() {
        let (handler, _) = handler();

        let bill = handler.create_bill(1, new_bill("Rent", 1)).await.unwrap();

        assert!(!bill.notification_sent);
        assert_eq!(bill.notification_hours_before, 3);
        assert_eq!(handler.list_bills(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invalid_bills_are_rejected() {
        let (handler, bills) = handler();

        let mut bill = new_bill("Rent", 1);
        bill.amount = Decimal::new(-5, 0);

        assert!(matches!(
            handler.create_bill(1, bill).await,
            Err(ServiceError::Validation(_))
        ));
        assert!(bills.all().is_empty());
    }

    #[tokio::test]
    async fn editing_a_bill_rearms_its_reminder() {
        let (handler, bills) = handler();
        let bill = handler.create_bill(1, new_bill("Gym", 12)).await.unwrap();
        bills.set_sent(bill.id, true);

        let updated = handler
            .update_bill(1, bill.id, update_of(&bill))
            .await
            .unwrap();

        assert!(!updated.notification_sent);
    }

    #[tokio::test]
    async fn edit_can_explicitly_keep_the_sent_flag() {
        let (handler, bills) = handler();
        let bill = handler.create_bill(1, new_bill("Gym", 12)).await.unwrap();
        bills.set_sent(bill.id, true);

        let mut update = update_of(&bill);
        update.notification_sent = Some(true);
        let updated = handler.update_bill(1, bill.id, update).await.unwrap();

        assert!(updated.notification_sent);
    }

    #[tokio::test]
    async fn bills_of_other_users_are_not_found() {
        let (handler, _) = handler();
        let bill = handler.create_bill(1, new_bill("Phone", 20)).await.unwrap();

        assert!(matches!(
            handler.get_bill(2, bill.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            handler.update_bill(2, bill.id, update_of(&bill)).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            handler.delete_bill(2, bill.id).await,
            Err(ServiceError::NotFound(_))
        ));

        handler.delete_bill(1, bill.id).await.unwrap();
        assert!(handler.list_bills(1).await.unwrap().is_empty());
    }
}
