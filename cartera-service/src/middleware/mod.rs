pub mod auth;
pub mod metrics;

pub use auth::{auth_middleware, CurrentUser, StaffUser};
pub use metrics::metrics_middleware;
