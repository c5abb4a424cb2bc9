use crate::{MessageStore, Result};
use consult_dm::Message;
use std::sync::Arc;

pub type Unsubscribe = Box<dyn FnOnce() + Send>;

/// Callback invoked by a message store for every matching insert.
pub type InsertCallback = Arc<dyn Fn(Message) + Send + Sync>;

/// Handle to a realtime feed registration.
///
/// The feed is released exactly once: by `unsubscribe()`, or when the handle
/// is dropped.
pub struct Subscription {
    id: String,
    unsubscribe: Option<Unsubscribe>,
}

impl Subscription {
    pub fn new(id: impl Into<String>, unsubscribe: Unsubscribe) -> Self {
        Self {
            id: id.into(),
            unsubscribe: Some(unsubscribe),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_active(&self) -> bool {
        self.unsubscribe.is_some()
    }

    pub fn unsubscribe(&mut self) {
        if let Some(unsubscribe) = self.unsubscribe.take() {
            tracing::debug!(subscription = %self.id, "unsubscribed");
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Subscribe to inserts for `recipient_id` and receive them on a channel.
///
/// The receiver reports `Disconnected` once the store drops the callback,
/// which is how a lost realtime feed is noticed.
pub fn subscribe_channel(
    store: &dyn MessageStore,
    recipient_id: &str,
) -> Result<(Subscription, crossbeam_channel::Receiver<Message>)> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let callback: InsertCallback = Arc::new(move |message| {
        let _ = tx.send(message);
    });
    let subscription = store.subscribe_inserts(recipient_id, callback)?;
    Ok((subscription, rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_subscription(counter: &Arc<AtomicUsize>) -> Subscription {
        let counter = counter.clone();
        Subscription::new(
            "sub-1",
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[test]
    fn unsubscribe_runs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut subscription = counting_subscription(&counter);
        assert!(subscription.is_active());

        subscription.unsubscribe();
        subscription.unsubscribe();
        drop(subscription);

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_unsubscribes() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let _subscription = counting_subscription(&counter);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
