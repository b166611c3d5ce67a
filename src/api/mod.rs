//! Access to the remote devotee API.
//!
//! Every call goes through [`gateway::Gateway`], which attaches the operator's
//! access token and recovers from expiry with a single refresh per request.

pub mod client;
pub mod error;
pub mod gateway;
pub mod models;
pub mod session;

#[cfg(test)]
pub(crate) mod fake;

pub use client::TempleApi;
pub use error::ApiError;
pub use gateway::Gateway;
pub use models::{Devotee, EntryKind, NewDevotee, PendingEntry};
pub use session::{Session, SessionStore};
