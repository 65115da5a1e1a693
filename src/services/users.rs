use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{models::users::UserProfile, repositories::users::UserStore};

pub enum UserRequest {
    Authenticate {
        token: String,
        response: oneshot::Sender<Result<i32, ServiceError>>,
    },
    GetProfile {
        id: i32,
        response: oneshot::Sender<Result<UserProfile, ServiceError>>,
    },
    SetPushToken {
        id: i32,
        push_token: Option<String>,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    repository: Arc<dyn UserStore>,
}

impl UserRequestHandler {
    pub fn new(repository: Arc<dyn UserStore>) -> Self {
        UserRequestHandler { repository }
    }

    async fn authenticate(&self, token: &str) -> Result<i32, ServiceError> {
        self.repository
            .find_user_by_token(token)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid token".to_string()))
    }

    async fn get_profile(&self, id: i32) -> Result<UserProfile, ServiceError> {
        self.repository
            .get_user(id)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?
            .map(UserProfile::from)
            .ok_or_else(|| ServiceError::NotFound(format!("User {}", id)))
    }

    async fn set_push_token(&self, id: i32, push_token: Option<String>) -> Result<(), ServiceError> {
        let push_token = push_token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty());

        let updated = self
            .repository
            .set_push_token(id, push_token)
            .await
            .map_err(|e| ServiceError::Database(e.to_string()))?;

        if !updated {
            return Err(ServiceError::NotFound(format!("User {}", id)));
        }

        log::info!(
            "Push token {} for user {}",
            if push_token.is_some() { "registered" } else { "cleared" },
            id
        );
        Ok(())
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::Authenticate { token, response } => {
                let user_id = self.authenticate(&token).await;
                let _ = response.send(user_id);
            }
            UserRequest::GetProfile { id, response } => {
                let profile = self.get_profile(id).await;
                let _ = response.send(profile);
            }
            UserRequest::SetPushToken {
                id,
                push_token,
                response,
            } => {
                let result = self.set_push_token(id, push_token).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::InMemoryUsers;

    fn handler() -> (UserRequestHandler, Arc<InMemoryUsers>) {
        let users = Arc::new(InMemoryUsers::new());
        users.add_user(7, Some("+15550007777"), None);
        users.add_token("good-token", 7);

        (UserRequestHandler::new(users.clone()), users)
    }

    #[tokio::test]
    async fn known_tokens_resolve_to_their_user() {
        let (handler, _) = handler();

        assert_eq!(handler.authenticate("good-token").await.unwrap(), 7);
        assert!(matches!(
            handler.authenticate("forged").await,
            Err(ServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn push_token_can_be_set_and_cleared() {
        let (handler, users) = handler();

        handler
            .set_push_token(7, Some(" device-abc ".to_string()))
            .await
            .unwrap();
        assert_eq!(users.user(7).unwrap().push_token.as_deref(), Some("device-abc"));
        assert!(handler.get_profile(7).await.unwrap().has_push_token);

        handler.set_push_token(7, Some("".to_string())).await.unwrap();
        assert!(users.user(7).unwrap().push_token.is_none());
        assert!(!handler.get_profile(7).await.unwrap().has_push_token);
    }

    #[tokio::test]
    async fn unknown_users_are_not_found() {
        let (handler, _) = handler();

        assert!(matches!(
            handler.get_profile(99).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(matches!(
            handler.set_push_token(99, None).await,
            Err(ServiceError::NotFound(_))
        ));
    }
}
