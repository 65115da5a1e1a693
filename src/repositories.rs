pub mod bills;
pub mod push;
pub mod sms;
pub mod users;
