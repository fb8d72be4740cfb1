//! Transient-subscription lifecycle.
//!
//! - `subscription`: one auto-replying subscription with idempotent cancel.
//! - `manager`: creates subscription batches and expires them after the TTL.
//! - `request`: bounded request/response, no background work.

pub mod manager;
pub mod request;
pub mod subscription;

pub use manager::{ReplySpec, SubscriptionManager};
pub use request::RequestBridge;
pub use subscription::{SubscriptionState, TransientSubscription};
