//! Realtime badge-count module.
//!
//! Keeps the unread-count badge live through a push/poll hybrid: push
//! delivery lowers latency, the fallback poll bounds staleness when push
//! silently fails. Both paths only ever touch the cheap count query.
//!
//! # Module Structure
//!
//! - `push`: Push delivery boundary (`PushChannel`, `PushEvent`)
//! - `bridge`: Subscription and poll lifecycle (`RealtimeCountBridge`)

mod bridge;
mod push;

// Re-export public API
pub use bridge::RealtimeCountBridge;
pub use push::{PushChannel, PushEvent};
