//! Notification source boundaries.
//!
//! Defines the interfaces to the external data store's notification
//! queries: the durable notification endpoint and the fixed battery of
//! rule queries producing dynamic alerts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::model::{AlertKind, DynamicAlert, PermanentNotification};
use crate::error::Result;

/// Recipient context the sources filter by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertContext {
    /// The authenticated identity notifications are fetched for
    pub identity_id: String,
    /// The active site, if one is selected
    pub site_id: Option<String>,
    /// Whether the identity holds a privileged role (enables the
    /// unassigned-high-priority-ticket rule)
    pub privileged: bool,
}

/// Boundary to the durable notification store.
///
/// Records are filtered by recipient and unread flag; acknowledgments are
/// written back through the same boundary.
#[async_trait]
pub trait PermanentSource: Send + Sync {
    /// Fetches all unread durable notifications for the recipient.
    async fn fetch_unread(&self, ctx: &AlertContext) -> Result<Vec<PermanentNotification>>;

    /// Writes one acknowledgment against the underlying durable record.
    async fn acknowledge(&self, source_id: &str) -> Result<()>;

    /// Writes acknowledgments for a batch of durable records.
    async fn acknowledge_many(&self, source_ids: &[String]) -> Result<()>;

    /// Counts unread durable notifications without materializing them.
    async fn count_unread(&self, ctx: &AlertContext) -> Result<usize>;
}

/// One rule query of the dynamic alert battery.
///
/// Each rule is independently callable and independently failable; a
/// failing rule degrades to an empty result in the aggregator and never
/// fails the whole load.
#[async_trait]
pub trait AlertRule: Send + Sync {
    /// The business trigger this rule computes.
    fn kind(&self) -> AlertKind;

    /// Evaluates the rule against current business data.
    async fn evaluate(&self, ctx: &AlertContext) -> Result<Vec<DynamicAlert>>;

    /// Counts matching records without materializing full alerts.
    ///
    /// The default evaluates and counts; implementations with a cheaper
    /// count query should override this.
    async fn count(&self, ctx: &AlertContext) -> Result<usize> {
        Ok(self.evaluate(ctx).await?.len())
    }
}
