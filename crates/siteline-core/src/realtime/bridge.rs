//! Push/poll hybrid keeping the unread-count badge live.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast, watch};
use tokio_util::sync::CancellationToken;

use super::push::{PushChannel, PushEvent};
use crate::config::SyncConfig;
use crate::notification::{AlertContext, NotificationAggregator, UnreadCounts};

/// Bridges push delivery and fallback polling into badge-count updates.
///
/// `RealtimeCountBridge` is responsible for:
/// - Subscribing once per active session to the push channel
/// - Refreshing counts on every insert event (never a full reload)
/// - An independent fallback poll bounding staleness when push fails
/// - Deterministic teardown when the owning session ends
///
/// Consumers observe counts through the watch channel returned by
/// [`subscribe_counts`](Self::subscribe_counts).
pub struct RealtimeCountBridge {
    /// Push delivery backend
    push: Arc<dyn PushChannel>,
    /// Count queries go through the aggregator's cheap path
    aggregator: Arc<NotificationAggregator>,
    poll_interval: Duration,
    /// Latest counts, replaced on every refresh
    counts: watch::Sender<UnreadCounts>,
    /// Cancellation for the running tasks; `None` while stopped
    cancel: Mutex<Option<CancellationToken>>,
}

impl RealtimeCountBridge {
    /// Creates a new `RealtimeCountBridge` with the given backends.
    pub fn new(
        push: Arc<dyn PushChannel>,
        aggregator: Arc<NotificationAggregator>,
        config: &SyncConfig,
    ) -> Self {
        let (counts, _) = watch::channel(UnreadCounts::default());
        Self {
            push,
            aggregator,
            poll_interval: config.count_poll_interval(),
            counts,
            cancel: Mutex::new(None),
        }
    }

    /// Returns a receiver observing the latest unread counts.
    pub fn subscribe_counts(&self) -> watch::Receiver<UnreadCounts> {
        self.counts.subscribe()
    }

    /// Subscribes to the push channel and starts both refresh tasks.
    ///
    /// Starting an already running bridge is a no-op. The first poll tick
    /// fires immediately, so the badge is populated right after start.
    ///
    /// # Errors
    ///
    /// Returns an error if the push subscription cannot be opened; the
    /// bridge is left stopped in that case.
    pub async fn start(&self, ctx: AlertContext) -> crate::error::Result<()> {
        let mut slot = self.cancel.lock().await;
        if slot.is_some() {
            tracing::warn!(target: "badge", "count bridge already running, skipping");
            return Ok(());
        }

        let rx = self.push.subscribe().await?;
        let token = CancellationToken::new();
        *slot = Some(token.clone());
        drop(slot);

        self.spawn_push_listener(rx, ctx.clone(), token.clone());
        self.spawn_fallback_poll(ctx, token);
        tracing::debug!(target: "badge", "count bridge started");
        Ok(())
    }

    fn spawn_push_listener(
        &self,
        mut rx: broadcast::Receiver<PushEvent>,
        ctx: AlertContext,
        cancel: CancellationToken,
    ) {
        let aggregator = self.aggregator.clone();
        let counts = self.counts.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = rx.recv() => match event {
                        Ok(PushEvent::NotificationInserted { source_id }) => {
                            tracing::debug!(target: "badge", source_id, "insert event, refreshing counts");
                            counts.send_replace(aggregator.count_only(&ctx).await);
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(target: "badge", skipped, "push stream lagged, refreshing counts");
                            counts.send_replace(aggregator.count_only(&ctx).await);
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            // The fallback poll keeps the badge eventually consistent.
                            tracing::warn!(target: "badge", "push channel closed, relying on fallback poll");
                            break;
                        }
                    },
                }
            }
            tracing::debug!(target: "badge", "push listener stopped");
        });
    }

    fn spawn_fallback_poll(&self, ctx: AlertContext, cancel: CancellationToken) {
        let aggregator = self.aggregator.clone();
        let counts = self.counts.clone();
        let mut ticker = tokio::time::interval(self.poll_interval);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        counts.send_replace(aggregator.count_only(&ctx).await);
                    }
                }
            }
            tracing::debug!(target: "badge", "fallback poll stopped");
        });
    }

    /// Stops both tasks and closes the push subscription. Idempotent.
    pub async fn shutdown(&self) {
        let token = self.cancel.lock().await.take();
        let Some(token) = token else {
            return;
        };

        token.cancel();
        if let Err(e) = self.push.unsubscribe().await {
            tracing::warn!(target: "badge", "push unsubscribe failed: {e}");
        }
        tracing::debug!(target: "badge", "count bridge stopped");
    }

    /// Whether the bridge currently has running tasks.
    pub async fn is_running(&self) -> bool {
        self.cancel.lock().await.is_some()
    }
}
