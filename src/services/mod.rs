pub mod auth;
pub mod database;
pub mod devotional;
pub mod lesson;
pub mod notification;
pub mod repository;
pub mod scheduler;
pub mod user;

#[cfg(test)]
pub mod testing;

pub use auth::AuthService;
pub use database::Database;
pub use devotional::DevotionalService;
pub use lesson::LessonService;
pub use notification::NotificationService;
pub use scheduler::{PublicationScheduler, SweepSummary};
pub use user::UserService;
