//! Notification domain module.
//!
//! Two structurally different notification kinds feed one ordered stream:
//! durable, acknowledgment-tracked messages ("permanent") and ephemeral,
//! rule-computed alerts ("dynamic"). This module owns the closed tagged
//! union over both, the source boundaries, and the merge/sort/read-state
//! logic.
//!
//! # Module Structure
//!
//! - `model`: Feed item types (`NotificationItem`, `Priority`, `AlertKind`)
//! - `source`: Source boundaries (`PermanentSource`, `AlertRule`)
//! - `aggregator`: Merge, ordering, and read-state (`NotificationAggregator`)

mod aggregator;
mod model;
mod source;

// Re-export public API
pub use aggregator::{FeedReport, NotificationAggregator};
pub use model::{
    AlertKind, Audience, DynamicAlert, NotificationItem, PermanentNotification, Priority,
    UnreadCounts,
};
pub use source::{AlertContext, AlertRule, PermanentSource};
