// Push-style value streams with explicit subscribe/unsubscribe
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

struct Subscribers<T> {
    next_id: u64,
    senders: Vec<(u64, mpsc::UnboundedSender<T>)>,
    latest: Option<T>,
}

/// Fan-out point for a stream of values.
///
/// Every subscriber gets every value published after it subscribed, in
/// publish order, plus the most recent value at subscribe time. Each
/// subscriber has its own unbounded queue so a slow reader never makes
/// another one miss values.
pub struct Publisher<T> {
    inner: Arc<Mutex<Subscribers<T>>>,
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + 'static> Publisher<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Subscribers {
                next_id: 0,
                senders: Vec::new(),
                latest: None,
            })),
        }
    }

    pub fn publish(&self, value: T) {
        let mut subs = lock(&self.inner);
        // Closed receivers are pruned here as well as on drop
        subs.senders.retain(|(_, tx)| tx.send(value.clone()).is_ok());
        subs.latest = Some(value);
    }

    pub fn subscribe(&self) -> Subscription<T> {
        let mut subs = lock(&self.inner);
        let (tx, rx) = mpsc::unbounded_channel();

        if let Some(latest) = &subs.latest {
            let _ = tx.send(latest.clone());
        }

        let id = subs.next_id;
        subs.next_id += 1;
        subs.senders.push((id, tx));

        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.inner),
        }
    }

    pub fn latest(&self) -> Option<T> {
        lock(&self.inner).latest.clone()
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner).senders.len()
    }
}

impl<T: Clone + Send + 'static> Default for Publisher<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for one subscriber. Dropping it (or calling `unsubscribe`)
/// detaches it from the publisher.
pub struct Subscription<T> {
    id: u64,
    rx: mpsc::UnboundedReceiver<T>,
    registry: Weak<Mutex<Subscribers<T>>>,
}

impl<T> Subscription<T> {
    /// Wait for the next value. `None` once the publisher is gone.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take a value if one is already queued
    pub fn try_next(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Everything queued right now, oldest first
    pub fn drain(&mut self) -> Vec<T> {
        let mut values = Vec::new();
        while let Ok(value) = self.rx.try_recv() {
            values.push(value);
        }
        values
    }

    pub fn unsubscribe(self) {}
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            let id = self.id;
            lock(&registry).senders.retain(|(sub_id, _)| *sub_id != id);
        }
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_values_arrive_in_order() {
        let publisher = Publisher::new();
        let mut sub = publisher.subscribe();

        publisher.publish(1);
        publisher.publish(2);
        publisher.publish(3);

        assert_eq!(sub.drain(), vec![1, 2, 3]);
    }

    #[test]
    fn test_late_subscriber_gets_latest() {
        let publisher = Publisher::new();
        publisher.publish("old");
        publisher.publish("current");

        let mut sub = publisher.subscribe();
        assert_eq!(sub.try_next(), Some("current"));
        assert_eq!(sub.try_next(), None);
    }

    #[test]
    fn test_unsubscribe_detaches() {
        let publisher = Publisher::<u8>::new();
        let first = publisher.subscribe();
        let _second = publisher.subscribe();
        assert_eq!(publisher.subscriber_count(), 2);

        first.unsubscribe();
        assert_eq!(publisher.subscriber_count(), 1);
    }

    #[test]
    fn test_subscription_outlives_publisher() {
        let publisher = Publisher::new();
        let mut sub = publisher.subscribe();
        publisher.publish(7);
        drop(publisher);

        assert_eq!(sub.try_next(), Some(7));
        drop(sub);
    }

    #[tokio::test]
    async fn test_stream_ends_when_publisher_dropped() {
        let publisher = Publisher::new();
        let sub = publisher.subscribe();

        let reader = tokio::spawn(async move { sub.collect::<Vec<_>>().await });

        publisher.publish(1);
        publisher.publish(2);
        drop(publisher);

        assert_eq!(reader.await.unwrap(), vec![1, 2]);
    }
}
