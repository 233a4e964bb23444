//! Session handling: token expiry, renewal and the coordinator that keeps
//! concurrent requests from renewing more than once.

pub mod coordinator;
pub mod events;
pub mod expiry;
pub mod renewer;

pub use coordinator::SessionCoordinator;
pub use events::{EndReason, SessionEvent};
pub use expiry::{is_token_expired, is_token_expired_at};
pub use renewer::{HttpRenewer, TokenRenewer};
