//! One-shot event waiters: register a matcher, await the first matching event
//! before a deadline, deregister on completion, timeout or drop.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;
use tokio::{sync::oneshot, time::Instant};

type Matcher<E> = Box<dyn Fn(&E) -> bool + Send + Sync>;

struct Slot<E> {
    matcher: Matcher<E>,
    tx: oneshot::Sender<E>,
}

struct Table<E> {
    next_id: u64,
    slots: HashMap<u64, Slot<E>>,
}

/// A set of pending waiters for events of type `E`.
pub struct Waiters<E> {
    table: Arc<Mutex<Table<E>>>,
}

impl<E> Default for Waiters<E> {
    fn default() -> Self {
        Self {
            table: Arc::new(Mutex::new(Table {
                next_id: 0,
                slots: HashMap::new(),
            })),
        }
    }
}

impl<E: Clone + Send + 'static> Waiters<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a matcher. The returned waiter is live immediately, so an
    /// event dispatched before the caller starts awaiting is not lost.
    pub fn register<F>(&self, matcher: F) -> Waiter<E>
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let mut table = self.table.lock();
        let id = table.next_id;
        table.next_id += 1;
        table.slots.insert(
            id,
            Slot {
                matcher: Box::new(matcher),
                tx,
            },
        );

        Waiter {
            id,
            rx,
            table: Arc::downgrade(&self.table),
        }
    }

    /// Resolves every waiter whose matcher accepts `event`. Returns how many
    /// were resolved.
    pub fn dispatch(&self, event: &E) -> usize {
        let matched: Vec<Slot<E>> = {
            let mut table = self.table.lock();
            let ids: Vec<u64> = table
                .slots
                .iter()
                .filter(|(_, slot)| (slot.matcher)(event))
                .map(|(id, _)| *id)
                .collect();
            ids.into_iter()
                .filter_map(|id| table.slots.remove(&id))
                .collect()
        };

        let mut resolved = 0;
        for slot in matched {
            if slot.tx.send(event.clone()).is_ok() {
                resolved += 1;
            }
        }
        resolved
    }

    pub fn pending(&self) -> usize {
        self.table.lock().slots.len()
    }
}

/// A registered one-shot wait.
pub struct Waiter<E> {
    id: u64,
    rx: oneshot::Receiver<E>,
    table: Weak<Mutex<Table<E>>>,
}

impl<E> Waiter<E> {
    /// Waits for the matching event. `None` when the deadline passes first or
    /// the waiter set was dropped.
    pub async fn wait_until(mut self, deadline: Instant) -> Option<E> {
        match tokio::time::timeout_at(deadline, &mut self.rx).await {
            Ok(Ok(event)) => Some(event),
            Ok(Err(_)) | Err(_) => None,
        }
    }
}

impl<E> Drop for Waiter<E> {
    fn drop(&mut self) {
        if let Some(table) = self.table.upgrade() {
            table.lock().slots.remove(&self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_event_before_await_is_delivered() {
        let waiters = Waiters::<u32>::new();
        let waiter = waiters.register(|n| *n == 7);

        assert_eq!(waiters.dispatch(&3), 0);
        assert_eq!(waiters.dispatch(&7), 1);

        let got = waiter.wait_until(Instant::now() + Duration::from_secs(1)).await;
        assert_eq!(got, Some(7));
        assert_eq!(waiters.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_deregisters() {
        let waiters = Waiters::<u32>::new();
        let waiter = waiters.register(|_| true);
        assert_eq!(waiters.pending(), 1);

        let got = waiter.wait_until(Instant::now() + Duration::from_secs(15)).await;
        assert_eq!(got, None);
        assert_eq!(waiters.pending(), 0);
        assert_eq!(waiters.dispatch(&1), 0);
    }

    #[test]
    fn test_drop_deregisters() {
        let waiters = Waiters::<u32>::new();
        let a = waiters.register(|_| true);
        let _b = waiters.register(|_| true);
        drop(a);
        assert_eq!(waiters.pending(), 1);
        assert_eq!(waiters.dispatch(&1), 1);
    }

    #[test]
    fn test_dispatch_is_one_shot() {
        let waiters = Waiters::<u32>::new();
        let _w = waiters.register(|_| true);
        assert_eq!(waiters.dispatch(&1), 1);
        assert_eq!(waiters.dispatch(&1), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_resolves_every_match() {
        let waiters = Waiters::<u32>::new();
        let even = waiters.register(|n| n % 2 == 0);
        let any = waiters.register(|_| true);
        let _odd = waiters.register(|n| n % 2 == 1);

        assert_eq!(waiters.dispatch(&4), 2);
        assert_eq!(waiters.pending(), 1);

        let deadline = Instant::now() + Duration::from_secs(1);
        assert_eq!(even.wait_until(deadline).await, Some(4));
        assert_eq!(any.wait_until(deadline).await, Some(4));
    }
}
