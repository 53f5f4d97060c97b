//! HTTP route handlers

pub mod engagement;
mod health;
mod status;

pub use engagement::handle_engagement_request;
pub use health::{health_check, ready_check};
pub use status::status_check;
