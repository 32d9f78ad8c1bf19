pub mod devotionals;
pub mod lessons;
pub mod notifications;
pub mod users;
