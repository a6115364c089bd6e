//! Notification aggregation: merge, ordering, and read-state.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::model::{AlertKind, DynamicAlert, NotificationItem, PermanentNotification, UnreadCounts};
use super::source::{AlertContext, AlertRule, PermanentSource};
use crate::error::{Result, SitelineError};

/// Result of one full feed load.
///
/// A failing source never fails the load; it degrades to an empty list and
/// is reported here as an advisory error alongside the best-effort feed.
#[derive(Debug)]
pub struct FeedReport {
    /// The merged, ordered, deduplicated feed
    pub items: Vec<NotificationItem>,
    /// Error from the durable source, if it failed
    pub permanent_error: Option<SitelineError>,
    /// Errors from individual rule queries that failed
    pub rule_errors: Vec<(AlertKind, SitelineError)>,
}

impl FeedReport {
    /// Whether any source degraded during the load.
    pub fn is_degraded(&self) -> bool {
        self.permanent_error.is_some() || !self.rule_errors.is_empty()
    }
}

/// Loads, merges, orders, and mutates the notification feed.
///
/// `NotificationAggregator` is responsible for:
/// - Fanning out concurrently to the durable source and the rule battery
/// - Degrading failed sources to empty lists (partial-failure tolerance)
/// - Deduplicating per variant and sorting by priority then recency
/// - Optimistic read-state transitions on the permanent subset
/// - A cheap count-only path for badge display
pub struct NotificationAggregator {
    /// Durable notification backend
    permanent: Arc<dyn PermanentSource>,
    /// The fixed battery of dynamic alert rules, in evaluation order
    rules: Vec<Arc<dyn AlertRule>>,
    /// The current merged feed
    items: Arc<RwLock<Vec<NotificationItem>>>,
}

impl NotificationAggregator {
    /// Creates a new `NotificationAggregator` with the given sources.
    pub fn new(permanent: Arc<dyn PermanentSource>, rules: Vec<Arc<dyn AlertRule>>) -> Self {
        Self {
            permanent,
            rules,
            items: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Loads both sources concurrently and rebuilds the merged feed.
    ///
    /// Never fails as a whole: each failing source or rule degrades to an
    /// empty list and is reported in the returned [`FeedReport`].
    pub async fn load_all(&self, ctx: &AlertContext) -> FeedReport {
        let (permanent_result, (dynamic_items, rule_errors)) =
            tokio::join!(self.permanent.fetch_unread(ctx), self.evaluate_rules(ctx));

        let mut permanent_error = None;
        let permanent_items = match permanent_result {
            Ok(items) => items,
            Err(e) => {
                tracing::warn!(target: "notifications", "durable source failed, degrading to empty: {e}");
                permanent_error = Some(e);
                Vec::new()
            }
        };

        let merged = merge_feed(permanent_items, dynamic_items);
        tracing::debug!(target: "notifications", count = merged.len(), "feed rebuilt");
        *self.items.write().await = merged.clone();

        FeedReport {
            items: merged,
            permanent_error,
            rule_errors,
        }
    }

    /// Runs the full rule battery concurrently, in stable rule order.
    async fn evaluate_rules(
        &self,
        ctx: &AlertContext,
    ) -> (Vec<DynamicAlert>, Vec<(AlertKind, SitelineError)>) {
        let results = futures::future::join_all(
            self.rules
                .iter()
                .map(|rule| async move { (rule.kind(), rule.evaluate(ctx).await) }),
        )
        .await;

        let mut alerts = Vec::new();
        let mut errors = Vec::new();
        for (kind, result) in results {
            match result {
                Ok(mut items) => alerts.append(&mut items),
                Err(e) => {
                    tracing::warn!(target: "notifications", %kind, "rule query failed, degrading to empty: {e}");
                    errors.push((kind, e));
                }
            }
        }
        (alerts, errors)
    }

    /// Marks one permanent item as read.
    ///
    /// The item is removed from the feed immediately (optimistic update),
    /// then the acknowledgment is written. A failed write is logged and
    /// reconciled by the next full load, not rolled back. Idempotent:
    /// marking an id that is no longer in the feed is a no-op.
    pub async fn mark_read(&self, id: &str) -> Result<()> {
        let mut source_id = None;
        {
            let mut items = self.items.write().await;
            items.retain(|item| match item {
                NotificationItem::Permanent(p) if p.id == id => {
                    source_id = Some(p.source_id.clone());
                    false
                }
                _ => true,
            });
        }

        let Some(source_id) = source_id else {
            return Ok(());
        };

        if let Err(e) = self.permanent.acknowledge(&source_id).await {
            tracing::warn!(target: "notifications", id, "acknowledgment failed, reconciled on next load: {e}");
        }
        Ok(())
    }

    /// Marks the whole permanent subset as read, as one batch.
    ///
    /// Same optimistic-then-confirm pattern as [`mark_read`].
    ///
    /// [`mark_read`]: Self::mark_read
    pub async fn mark_all_read(&self) -> Result<()> {
        let mut source_ids = Vec::new();
        {
            let mut items = self.items.write().await;
            items.retain(|item| match item {
                NotificationItem::Permanent(p) => {
                    source_ids.push(p.source_id.clone());
                    false
                }
                NotificationItem::Dynamic(_) => true,
            });
        }

        if source_ids.is_empty() {
            return Ok(());
        }

        if let Err(e) = self.permanent.acknowledge_many(&source_ids).await {
            tracing::warn!(target: "notifications", count = source_ids.len(), "batch acknowledgment failed, reconciled on next load: {e}");
        }
        Ok(())
    }

    /// Returns the full merged feed.
    pub async fn all(&self) -> Vec<NotificationItem> {
        self.items.read().await.clone()
    }

    /// Returns the permanent subset of the merged feed.
    pub async fn permanent_only(&self) -> Vec<NotificationItem> {
        self.items
            .read()
            .await
            .iter()
            .filter(|item| item.is_permanent())
            .cloned()
            .collect()
    }

    /// Returns the dynamic subset of the merged feed.
    pub async fn dynamic_only(&self) -> Vec<NotificationItem> {
        self.items
            .read()
            .await
            .iter()
            .filter(|item| item.is_dynamic())
            .cloned()
            .collect()
    }

    /// Asks each source for counts without materializing full items.
    ///
    /// Used for badge display; never touches the merge/sort path. A failed
    /// count degrades to zero for that source.
    pub async fn count_only(&self, ctx: &AlertContext) -> UnreadCounts {
        let (permanent, dynamic) = tokio::join!(
            async {
                match self.permanent.count_unread(ctx).await {
                    Ok(count) => count,
                    Err(e) => {
                        tracing::warn!(target: "notifications", "durable count failed: {e}");
                        0
                    }
                }
            },
            async {
                let counts = futures::future::join_all(
                    self.rules
                        .iter()
                        .map(|rule| async move { (rule.kind(), rule.count(ctx).await) }),
                )
                .await;
                counts
                    .into_iter()
                    .map(|(kind, result)| match result {
                        Ok(count) => count,
                        Err(e) => {
                            tracing::warn!(target: "notifications", %kind, "rule count failed: {e}");
                            0
                        }
                    })
                    .sum::<usize>()
            }
        );

        UnreadCounts { permanent, dynamic }
    }
}

/// Merges both variants into one deduplicated, ordered feed.
///
/// Duplicate ids within the same variant keep the first occurrence. The
/// sort is stable by requirement: ties on (priority, timestamp) preserve
/// source fetch order.
fn merge_feed(
    permanent: Vec<PermanentNotification>,
    dynamic: Vec<DynamicAlert>,
) -> Vec<NotificationItem> {
    let mut items = Vec::with_capacity(permanent.len() + dynamic.len());

    let mut seen_permanent = HashSet::new();
    for p in permanent {
        if seen_permanent.insert(p.id.clone()) {
            items.push(NotificationItem::Permanent(p));
        }
    }

    let mut seen_dynamic = HashSet::new();
    for d in dynamic {
        if seen_dynamic.insert(d.id.clone()) {
            items.push(NotificationItem::Dynamic(d));
        }
    }

    items.sort_by(|a, b| {
        a.priority()
            .rank()
            .cmp(&b.priority().rank())
            .then_with(|| b.timestamp().cmp(&a.timestamp()))
    });

    items
}
