pub mod lesson;
pub mod devotional;
pub mod reservation;
pub mod notification;
pub mod user;
