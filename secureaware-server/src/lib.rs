//! SecureAware portal server
//!
//! Wires the route guard in front of a small portal API over the RBAC
//! and compliance core.

pub mod errors;
pub mod handlers;
pub mod services;
pub mod startup;

pub use errors::{ApiError, ApiResult};
pub use services::AppState;
pub use startup::{build_app, Server};
