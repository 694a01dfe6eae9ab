//! In-process subscribe/notify registry.

use crate::model::expense::EntryId;
use crate::model::member::MemberId;
use crate::model::month::MonthKey;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Handle returned by [`ChangeFeed::subscribe`].
pub type SubscriptionId = u64;

/// Committed mutation kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    EntryAdded(EntryId),
    EntryUpdated(EntryId),
    EntryDeleted(EntryId),
    GridInitialized(MonthKey),
    CellToggled {
        month: MonthKey,
        day: u32,
        member_id: MemberId,
        present: bool,
    },
}

impl Change {
    fn label(&self) -> &'static str {
        match self {
            Self::EntryAdded(_) => "entry_added",
            Self::EntryUpdated(_) => "entry_updated",
            Self::EntryDeleted(_) => "entry_deleted",
            Self::GridInitialized(_) => "grid_initialized",
            Self::CellToggled { .. } => "cell_toggled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub revision: u64,
    pub change: Change,
}

/// Observer of committed changes.
///
/// Listeners are invoked synchronously on the writing thread and should only
/// schedule work (for example, mark a settlement view stale).
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, event: &ChangeEvent);
}

impl<F> ChangeListener for F
where
    F: Fn(&ChangeEvent) + Send + Sync,
{
    fn on_change(&self, event: &ChangeEvent) {
        self(event)
    }
}

#[derive(Default)]
pub struct ChangeFeed {
    listeners: Mutex<BTreeMap<SubscriptionId, Arc<dyn ChangeListener>>>,
    next_subscription: AtomicU64,
    revision: AtomicU64,
}

impl ChangeFeed {
    /// Empty feed at revision `0`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` for every later publish.
    pub fn subscribe(&self, listener: Arc<dyn ChangeListener>) -> SubscriptionId {
        let id = self.next_subscription.fetch_add(1, Ordering::Relaxed) + 1;
        self.lock_listeners().insert(id, listener);
        debug!("event=feed_subscribe module=event status=ok subscription={id}");
        id
    }

    /// Removes a listener; returns whether it was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock_listeners().remove(&id).is_some()
    }

    /// Number of registered listeners.
    pub fn subscriber_count(&self) -> usize {
        self.lock_listeners().len()
    }

    /// Latest published revision, `0` before the first publish.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::SeqCst)
    }

    /// Publishes one committed change to every listener.
    pub fn publish(&self, change: Change) -> ChangeEvent {
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        let event = ChangeEvent { revision, change };

        // Snapshot listeners so callbacks may subscribe/unsubscribe freely.
        let listeners: Vec<Arc<dyn ChangeListener>> =
            self.lock_listeners().values().cloned().collect();
        debug!(
            "event=feed_publish module=event status=ok change={} revision={} listeners={}",
            event.change.label(),
            revision,
            listeners.len()
        );
        for listener in listeners {
            listener.on_change(&event);
        }
        event
    }

    fn lock_listeners(
        &self,
    ) -> std::sync::MutexGuard<'_, BTreeMap<SubscriptionId, Arc<dyn ChangeListener>>> {
        match self.listeners.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("event=feed_lock module=event status=recovered reason=poisoned");
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Change, ChangeEvent, ChangeFeed};
    use crate::model::month::MonthKey;
    use std::sync::{Arc, Mutex};

    #[test]
    fn publishes_to_all_listeners_with_increasing_revisions() {
        let feed = ChangeFeed::new();
        let seen: Arc<Mutex<Vec<ChangeEvent>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        feed.subscribe(Arc::new(move |event: &ChangeEvent| {
            sink.lock().unwrap().push(event.clone());
        }));

        let month = MonthKey::new(2026, 10).unwrap();
        feed.publish(Change::GridInitialized(month));
        feed.publish(Change::CellToggled {
            month,
            day: 3,
            member_id: 1,
            present: false,
        });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0].revision, 1);
        assert_eq!(seen[1].revision, 2);
        assert_eq!(feed.revision(), 2);
    }

    #[test]
    fn unsubscribed_listener_stops_receiving() {
        let feed = ChangeFeed::new();
        let count = Arc::new(Mutex::new(0_u32));
        let sink = Arc::clone(&count);
        let id = feed.subscribe(Arc::new(move |_: &ChangeEvent| {
            *sink.lock().unwrap() += 1;
        }));

        let month = MonthKey::new(2026, 10).unwrap();
        feed.publish(Change::GridInitialized(month));
        assert!(feed.unsubscribe(id));
        assert!(!feed.unsubscribe(id));
        feed.publish(Change::GridInitialized(month));

        assert_eq!(*count.lock().unwrap(), 1);
        assert_eq!(feed.subscriber_count(), 0);
    }
}
