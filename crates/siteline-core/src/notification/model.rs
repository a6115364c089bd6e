//! Notification domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Display priority of a feed item. High sorts first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    /// Sort rank, high first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::High => 0,
            Self::Normal => 1,
            Self::Low => 2,
        }
    }
}

/// Who a permanent notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum Audience {
    /// Everyone holding the named role.
    Role { role: String },
    /// One specific identity.
    User { identity_id: String },
}

/// The fixed battery of business triggers that produce dynamic alerts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertKind {
    /// A contract expires soon.
    ContractExpiring,
    /// A contract is running low on remaining hours.
    ContractHoursLow,
    /// A ticket is assigned to the current identity.
    TicketAssigned,
    /// A high-priority ticket has no assignee (privileged roles only).
    TicketUnassignedHighPriority,
    /// Work is scheduled for today.
    WorkScheduledToday,
}

/// A durable, acknowledgment-tracked message created by a human action.
///
/// Persists until explicitly marked read; never silently dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermanentNotification {
    /// Feed-level identifier
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
    /// Optional navigation target
    pub link: Option<String>,
    /// Whether the recipient acknowledged this message
    pub is_read: bool,
    /// Who this message is addressed to
    pub audience: Audience,
    /// Identifier of the underlying durable record, used for acknowledgment
    pub source_id: String,
}

/// An ephemeral alert recomputed from current business data on each load.
///
/// Has no persisted read-state; it exists as long as its triggering
/// condition holds and vanishes once that condition resolves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicAlert {
    /// Feed-level identifier, stable across recomputations of one trigger
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub timestamp: DateTime<Utc>,
    /// Optional navigation target
    pub link: Option<String>,
    /// The business trigger that produced this alert
    pub kind: AlertKind,
}

/// One item of the merged notification feed.
///
/// A closed tagged union so merge and sort logic pattern-matches
/// exhaustively instead of relying on field presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationItem {
    Permanent(PermanentNotification),
    Dynamic(DynamicAlert),
}

impl NotificationItem {
    pub fn id(&self) -> &str {
        match self {
            Self::Permanent(p) => &p.id,
            Self::Dynamic(d) => &d.id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Permanent(p) => &p.title,
            Self::Dynamic(d) => &d.title,
        }
    }

    pub fn description(&self) -> &str {
        match self {
            Self::Permanent(p) => &p.description,
            Self::Dynamic(d) => &d.description,
        }
    }

    pub fn priority(&self) -> Priority {
        match self {
            Self::Permanent(p) => p.priority,
            Self::Dynamic(d) => d.priority,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::Permanent(p) => p.timestamp,
            Self::Dynamic(d) => d.timestamp,
        }
    }

    pub fn link(&self) -> Option<&str> {
        match self {
            Self::Permanent(p) => p.link.as_deref(),
            Self::Dynamic(d) => d.link.as_deref(),
        }
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent(_))
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic(_))
    }
}

/// Per-source unread counts for badge display.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadCounts {
    pub permanent: usize,
    pub dynamic: usize,
}

impl UnreadCounts {
    pub fn total(&self) -> usize {
        self.permanent + self.dynamic
    }
}
