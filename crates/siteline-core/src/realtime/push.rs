//! Push delivery boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::Result;

/// Events delivered over the push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    /// A durable notification record was inserted.
    NotificationInserted { source_id: String },
}

/// An abstract push channel scoped to durable-notification inserts.
///
/// The transport is external; implementations bridge whatever delivery
/// mechanism exists into a broadcast receiver.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Opens the subscription and returns the event receiver.
    async fn subscribe(&self) -> Result<broadcast::Receiver<PushEvent>>;

    /// Closes the subscription.
    async fn unsubscribe(&self) -> Result<()>;
}
