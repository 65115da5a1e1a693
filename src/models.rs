pub mod bills;
pub mod reminders;
pub mod users;
