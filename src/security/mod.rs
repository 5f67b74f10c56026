//! Account security facade: login, session lifecycle, two-factor, and
//! credential changes behind one service type.

pub mod config;
pub mod error;
pub mod service;

pub use config::{MAX_SESSION_TIMEOUT_MINUTES, SecurityConfig};
pub use error::SecurityError;
pub use service::{AuthContext, LoginOutcome, SecurityService};
