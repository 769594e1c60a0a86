pub mod metrics;
pub mod session;

pub use metrics::metrics_middleware;
pub use session::{AuthRedirect, LoggedInSession, SESSION_COOKIE};
