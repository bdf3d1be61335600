//! Push notification delivery.
//!
//! - [`payload`] builds platform-specific payloads from a generic message
//! - [`provider`] abstracts the push provider behind [`PushProvider`]
//! - [`fcm`] is the Firebase Cloud Messaging HTTP v1 implementation
//! - [`dispatcher`] fans a recipient list out in provider-sized batches
//! - [`mock`] is a scripted in-process provider for tests and local runs

pub mod dispatcher;
pub mod error;
pub mod fcm;
pub mod mock;
pub mod payload;
pub mod provider;

pub use dispatcher::{BatchDispatcher, DispatchReport, PUSH_BATCH_SIZE};
pub use error::PushError;
pub use payload::{NotificationKind, PayloadBuilder, PushMessage, PushPayload};
pub use provider::PushProvider;
