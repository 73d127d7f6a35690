//! In-process change notification.
//!
//! Every mutating service publishes a [`ChangeEvent`] to the [`ChangeHub`]
//! after its write commits. Consumers subscribe per (table, optional
//! column-equality filter): the WebSocket endpoint forwards matching events to
//! browser clients, and [`ChangeListener`] drives an in-process re-fetch
//! callback. Events are cues, not payloads: nobody applies them
//! incrementally, the dependent collection is always re-read whole.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const HUB_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub op: ChangeOp,
    pub row_id: String,
    /// Columns exposed for equality filtering (foreign keys, mostly).
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, String>,
}

impl ChangeEvent {
    pub fn new(table: &str, op: ChangeOp, row_id: &str) -> Self {
        Self {
            table: table.to_string(),
            op,
            row_id: row_id.to_string(),
            fields: HashMap::new(),
        }
    }

    pub fn with_field(mut self, column: &str, value: &str) -> Self {
        self.fields.insert(column.to_string(), value.to_string());
        self
    }
}

/// Column-equality filter, e.g. `post_id = X`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableFilter {
    pub column: String,
    pub value: String,
}

/// One logical subscription: a table plus an optional row filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub table: String,
    #[serde(default)]
    pub filter: Option<TableFilter>,
}

impl Subscription {
    pub fn table(table: &str) -> Self {
        Self {
            table: table.to_string(),
            filter: None,
        }
    }

    pub fn filtered(table: &str, column: &str, value: &str) -> Self {
        Self {
            table: table.to_string(),
            filter: Some(TableFilter {
                column: column.to_string(),
                value: value.to_string(),
            }),
        }
    }

    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table {
            return false;
        }
        match &self.filter {
            None => true,
            Some(filter) => event
                .fields
                .get(&filter.column)
                .map(|value| value == &filter.value)
                .unwrap_or(false),
        }
    }
}

/// Process-wide broadcast fan-out for change events.
#[derive(Clone)]
pub struct ChangeHub {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(HUB_CAPACITY);
        Self { tx }
    }

    /// Publishing with no subscribers is not an error; the event is inert.
    pub fn publish(&self, event: ChangeEvent) {
        tracing::debug!(table = %event.table, op = ?event.op, row_id = %event.row_id, "change event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

/// Drives a re-fetch callback from hub events.
///
/// Triggers that land while a re-fetch is in flight coalesce: at most one
/// trailing re-fetch runs once the current one completes. A lagged receiver
/// (hub outran us) is treated as a trigger, since a full re-fetch subsumes
/// whatever was missed. Dropping the listener tears the subscription down;
/// events delivered afterwards are inert.
pub struct ChangeListener {
    handle: JoinHandle<()>,
}

impl ChangeListener {
    pub fn spawn<F, Fut>(hub: &ChangeHub, subscription: Subscription, mut refetch: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send,
    {
        let mut rx = hub.subscribe();
        let handle = tokio::spawn(async move {
            'recv: loop {
                let triggered = match rx.recv().await {
                    Ok(event) => subscription.matches(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, table = %subscription.table, "listener lagged");
                        true
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };
                if !triggered {
                    continue;
                }
                loop {
                    if let Err(err) = refetch().await {
                        tracing::warn!(table = %subscription.table, error = ?err, "re-fetch failed");
                    }
                    // Collapse everything that arrived during the re-fetch
                    // into at most one more pass.
                    let mut dirty = false;
                    loop {
                        match rx.try_recv() {
                            Ok(event) => {
                                if subscription.matches(&event) {
                                    dirty = true;
                                }
                            }
                            Err(broadcast::error::TryRecvError::Empty) => break,
                            Err(broadcast::error::TryRecvError::Lagged(_)) => dirty = true,
                            Err(broadcast::error::TryRecvError::Closed) => break 'recv,
                        }
                    }
                    if !dirty {
                        break;
                    }
                }
            }
        });
        Self { handle }
    }
}

impl Drop for ChangeListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::{mpsc, Semaphore};
    use tokio::time::timeout;

    fn insert(table: &str, row_id: &str) -> ChangeEvent {
        ChangeEvent::new(table, ChangeOp::Insert, row_id)
    }

    #[test]
    fn subscription_matching_honors_table_and_filter() {
        let unfiltered = Subscription::table("poll_votes");
        let filtered = Subscription::filtered("blog_comments", "post_id", "post-1");

        assert!(unfiltered.matches(&insert("poll_votes", "v1")));
        assert!(!unfiltered.matches(&insert("blog_likes", "l1")));

        let matching = insert("blog_comments", "c1").with_field("post_id", "post-1");
        let other_post = insert("blog_comments", "c2").with_field("post_id", "post-2");
        let no_field = insert("blog_comments", "c3");
        assert!(filtered.matches(&matching));
        assert!(!filtered.matches(&other_post));
        assert!(!filtered.matches(&no_field));
    }

    #[tokio::test]
    async fn listener_refetches_on_matching_events_only() {
        let hub = ChangeHub::new();
        let (done_tx, mut done_rx) = mpsc::unbounded_channel();

        let _listener = ChangeListener::spawn(
            &hub,
            Subscription::filtered("blog_comments", "post_id", "post-1"),
            move || {
                let done_tx = done_tx.clone();
                async move {
                    let _ = done_tx.send(());
                    Ok(())
                }
            },
        );

        // Non-matching events are ignored.
        hub.publish(insert("blog_comments", "c1").with_field("post_id", "other"));
        hub.publish(insert("poll_votes", "v1"));
        assert!(
            timeout(Duration::from_millis(100), done_rx.recv())
                .await
                .is_err(),
            "re-fetch fired for non-matching event"
        );

        hub.publish(insert("blog_comments", "c2").with_field("post_id", "post-1"));
        timeout(Duration::from_secs(1), done_rx.recv())
            .await
            .expect("re-fetch should fire")
            .expect("channel open");
    }

    #[tokio::test]
    async fn overlapping_triggers_coalesce_into_one_trailing_refetch() {
        let hub = ChangeHub::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Semaphore::new(0));
        let (started_tx, mut started_rx) = mpsc::unbounded_channel();

        let _listener = {
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            ChangeListener::spawn(&hub, Subscription::table("poll_votes"), move || {
                let calls = Arc::clone(&calls);
                let gate = Arc::clone(&gate);
                let started_tx = started_tx.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let _ = started_tx.send(());
                    let permit = gate.acquire().await.expect("gate open");
                    permit.forget();
                    Ok(())
                }
            })
        };

        // First event starts a re-fetch that blocks on the gate.
        hub.publish(insert("poll_votes", "v1"));
        timeout(Duration::from_secs(1), started_rx.recv())
            .await
            .expect("first re-fetch should start");

        // A burst lands while the first re-fetch is in flight.
        for i in 0..5 {
            hub.publish(insert("poll_votes", &format!("burst-{i}")));
        }
        gate.add_permits(1);

        // Exactly one trailing re-fetch covers the burst.
        timeout(Duration::from_secs(1), started_rx.recv())
            .await
            .expect("trailing re-fetch should start");
        gate.add_permits(1);

        // Give any (incorrect) extra re-fetches a chance to appear.
        assert!(
            timeout(Duration::from_millis(200), started_rx.recv())
                .await
                .is_err(),
            "burst should coalesce into a single trailing re-fetch"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn events_after_teardown_are_inert() {
        let hub = ChangeHub::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let listener = {
            let calls = Arc::clone(&calls);
            ChangeListener::spawn(&hub, Subscription::table("poll_votes"), move || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
        };
        drop(listener);
        tokio::time::sleep(Duration::from_millis(50)).await;

        hub.publish(insert("poll_votes", "v1"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
