pub mod middleware;
pub mod sanitize;
pub mod serde_helpers;
