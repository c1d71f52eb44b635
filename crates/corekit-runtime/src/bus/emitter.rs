//! Generic publish/subscribe bus keyed by [`EventKey`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use corekit_core::events::EventKey;
use corekit_core::result::AppResult;

/// Identifies a single subscription on the bus.
pub type ListenerId = u64;

/// An async listener. Returning `Some` replaces the accumulator when the
/// listener runs inside a hook's `pre` or `post` phase.
pub type Listener<P> = Arc<dyn Fn(P) -> BoxFuture<'static, AppResult<Option<P>>> + Send + Sync>;

/// Wraps an async closure into a [`Listener`].
pub fn listener<P, F, Fut>(f: F) -> Listener<P>
where
    F: Fn(P) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = AppResult<Option<P>>> + Send + 'static,
{
    Arc::new(move |payload| f(payload).boxed())
}

enum Slot<P> {
    Handler(Listener<P>),
    Once(oneshot::Sender<P>),
    Forward(mpsc::UnboundedSender<(EventKey, P)>),
}

struct Entry<P> {
    id: ListenerId,
    slot: Slot<P>,
}

/// Event bus over payload type `P`.
///
/// [`EventBus::emit`] is synchronous: `once` and `forward` subscribers have
/// received the payload when it returns. Handler listeners are spawned on
/// the current tokio runtime.
pub struct EventBus<P> {
    listeners: Mutex<HashMap<EventKey, Vec<Entry<P>>>>,
    next_id: AtomicU64,
}

impl<P> EventBus<P>
where
    P: Clone + Send + 'static,
{
    /// Creates an empty bus.
    pub fn new() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<EventKey, Vec<Entry<P>>>> {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn subscribe(&self, key: EventKey, slot: Slot<P>) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().entry(key).or_default().push(Entry { id, slot });
        id
    }

    /// Adds a persistent listener.
    pub fn on(&self, key: EventKey, listener: Listener<P>) -> ListenerId {
        self.subscribe(key, Slot::Handler(listener))
    }

    /// Subscribes to the next emission of `key` only.
    pub fn once(&self, key: EventKey) -> (ListenerId, oneshot::Receiver<P>) {
        let (tx, rx) = oneshot::channel();
        let id = self.subscribe(key, Slot::Once(tx));
        (id, rx)
    }

    /// Forwards every emission of `key` into `sender` until removed.
    pub fn forward(&self, key: EventKey, sender: mpsc::UnboundedSender<(EventKey, P)>) -> ListenerId {
        self.subscribe(key, Slot::Forward(sender))
    }

    /// Emits `payload` to every subscriber of `key`. Returns how many
    /// subscribers were notified.
    pub fn emit(&self, key: &EventKey, payload: P) -> usize {
        self.deliver(key, payload, true)
    }

    /// Feeds `once` and `forward` subscribers of `key` only. Used by callers
    /// that run the handler listeners themselves.
    pub fn notify_sinks(&self, key: &EventKey, payload: P) -> usize {
        self.deliver(key, payload, false)
    }

    fn deliver(&self, key: &EventKey, payload: P, run_handlers: bool) -> usize {
        let mut notified = 0;
        let mut handlers = Vec::new();
        {
            let mut listeners = self.lock();
            let Some(entries) = listeners.get_mut(key) else {
                return 0;
            };
            let mut kept = Vec::with_capacity(entries.len());
            for entry in entries.drain(..) {
                match entry.slot {
                    Slot::Handler(handler) => {
                        if run_handlers {
                            handlers.push(handler.clone());
                        }
                        kept.push(Entry {
                            id: entry.id,
                            slot: Slot::Handler(handler),
                        });
                    }
                    Slot::Once(tx) => {
                        if tx.send(payload.clone()).is_ok() {
                            notified += 1;
                        }
                    }
                    Slot::Forward(tx) => {
                        if tx.send((key.clone(), payload.clone())).is_ok() {
                            notified += 1;
                            kept.push(Entry {
                                id: entry.id,
                                slot: Slot::Forward(tx),
                            });
                        }
                    }
                }
            }
            if kept.is_empty() {
                listeners.remove(key);
            } else {
                *entries = kept;
            }
        }

        if handlers.is_empty() {
            return notified;
        }

        match Handle::try_current() {
            Ok(runtime) => {
                for handler in handlers {
                    let fut = handler(payload.clone());
                    let event = key.clone();
                    runtime.spawn(async move {
                        if let Err(e) = fut.await {
                            warn!(event = %event, error = %e, "Event listener failed");
                        }
                    });
                    notified += 1;
                }
            }
            Err(_) => {
                debug!(event = %key, "No async runtime, skipping handler listeners");
            }
        }

        notified
    }

    /// Returns the handler listeners of `key` in registration order.
    pub fn handlers(&self, key: &EventKey) -> Vec<Listener<P>> {
        self.lock()
            .get(key)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| match &entry.slot {
                        Slot::Handler(handler) => Some(handler.clone()),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Removes one subscription. Returns whether it existed.
    pub fn remove_listener(&self, key: &EventKey, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let Some(entries) = listeners.get_mut(key) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|entry| entry.id != id);
        let removed = entries.len() != before;
        if entries.is_empty() {
            listeners.remove(key);
        }
        removed
    }

    /// Number of live subscriptions on `key`.
    pub fn listener_count(&self, key: &EventKey) -> usize {
        self.lock().get(key).map(Vec::len).unwrap_or(0)
    }
}

impl<P> Default for EventBus<P>
where
    P: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P> std::fmt::Debug for EventBus<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let events = self
            .listeners
            .lock()
            .map(|listeners| listeners.len())
            .unwrap_or(0);
        f.debug_struct("EventBus").field("events", &events).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_once_fires_a_single_time() {
        let bus: EventBus<u32> = EventBus::new();
        let key = EventKey::registered("logger");
        let (_, rx) = bus.once(key.clone());
        assert_eq!(bus.listener_count(&key), 1);

        assert_eq!(bus.emit(&key, 7), 1);
        assert_eq!(rx.await.unwrap(), 7);
        assert_eq!(bus.listener_count(&key), 0);
        assert_eq!(bus.emit(&key, 8), 0);
    }

    #[tokio::test]
    async fn test_handlers_are_spawned() {
        let bus: EventBus<u32> = EventBus::new();
        let key = EventKey::main("tick");
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        bus.on(
            key.clone(),
            listener(move |n: u32| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(n as usize, Ordering::SeqCst);
                    Ok(None)
                }
            }),
        );

        bus.emit(&key, 2);
        bus.emit(&key, 3);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 5);
        assert_eq!(bus.listener_count(&key), 1);
    }

    #[tokio::test]
    async fn test_forward_until_removed() {
        let bus: EventBus<&'static str> = EventBus::new();
        let key = EventKey::main("a");
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = bus.forward(key.clone(), tx);

        bus.emit(&key, "first");
        assert_eq!(rx.recv().await.unwrap(), (key.clone(), "first"));

        assert!(bus.remove_listener(&key, id));
        assert_eq!(bus.emit(&key, "second"), 0);
        assert_eq!(bus.listener_count(&key), 0);
    }

    #[test]
    fn test_emit_without_runtime_still_feeds_once() {
        let bus: EventBus<u32> = EventBus::new();
        let key = EventKey::main("sync");
        let (_, mut rx) = bus.once(key.clone());
        bus.on(key.clone(), listener(|_: u32| async { Ok(None) }));
        assert_eq!(bus.emit(&key, 1), 1);
        assert_eq!(rx.try_recv().unwrap(), 1);
    }
}
