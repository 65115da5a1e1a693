use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub push_token: Option<String>,
}

impl User {
    pub fn sms_destination(&self) -> Option<&str> {
        non_blank(self.phone.as_deref())
    }

    pub fn push_destination(&self) -> Option<&str> {
        non_blank(self.push_token.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Clone, Debug, Serialize)]
pub struct UserProfile {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub has_push_token: bool,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        let has_push_token = user.push_destination().is_some();

        UserProfile {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            has_push_token,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct PushTokenUpdate {
    pub push_token: Option<String>,
}
