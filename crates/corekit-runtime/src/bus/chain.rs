//! Wait for a set of events, failing fast on any of another set.

use std::fmt::Debug;

use thiserror::Error;
use tokio::sync::mpsc;

use corekit_core::error::{AppError, ErrorKind};
use corekit_core::events::EventKey;

use super::emitter::{EventBus, ListenerId};

/// Why a chained wait did not resolve.
#[derive(Debug, Error)]
pub enum ChainError<P: Debug> {
    /// A reject event fired first.
    #[error("chained wait rejected by \"{event}\"")]
    Rejected {
        /// The reject event that fired.
        event: EventKey,
        /// Its payload.
        payload: P,
    },
    /// Every subscription was dropped from the bus before the wait settled.
    #[error("event bus dropped the chained wait before it settled")]
    Closed,
}

impl<P: Debug> From<ChainError<P>> for AppError {
    fn from(err: ChainError<P>) -> Self {
        match &err {
            ChainError::Rejected { event, payload } => AppError::new(
                ErrorKind::Internal,
                format!("Chained event \"{event}\" rejected with {payload:?}"),
            ),
            ChainError::Closed => AppError::internal(err.to_string()),
        }
    }
}

/// Removes every subscription of a chained wait when dropped.
struct Subscriptions<'a, P>
where
    P: Clone + Send + 'static,
{
    bus: &'a EventBus<P>,
    ids: Vec<(EventKey, ListenerId)>,
}

impl<P> Drop for Subscriptions<'_, P>
where
    P: Clone + Send + 'static,
{
    fn drop(&mut self) {
        for (key, id) in self.ids.drain(..) {
            self.bus.remove_listener(&key, id);
        }
    }
}

fn normalize<S: AsRef<str>>(events: &[S]) -> Vec<EventKey> {
    let mut keys: Vec<EventKey> = Vec::new();
    for raw in events {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            continue;
        }
        let key = EventKey::parse(raw);
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}

/// Resolves once every event in `resolve` fired at least once, with the
/// payload of each event's first firing in firing order. Fails with the
/// payload of the first `reject` event that fires. Empty names are
/// ignored; with no resolve events the wait completes immediately.
///
/// All subscriptions are removed when the returned future settles or is
/// dropped.
pub async fn chain_events<P, S, R>(
    bus: &EventBus<P>,
    resolve: &[S],
    reject: &[R],
) -> Result<Vec<P>, ChainError<P>>
where
    P: Clone + Send + Debug + 'static,
    S: AsRef<str>,
    R: AsRef<str>,
{
    let resolve_keys = normalize(resolve);
    let reject_keys = normalize(reject);

    if resolve_keys.is_empty() {
        return Ok(Vec::new());
    }

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut subscriptions = Subscriptions {
        bus,
        ids: Vec::with_capacity(resolve_keys.len() + reject_keys.len()),
    };
    for key in reject_keys.iter().chain(resolve_keys.iter()) {
        let id = bus.forward(key.clone(), tx.clone());
        subscriptions.ids.push((key.clone(), id));
    }
    drop(tx);

    let mut pending = resolve_keys;
    let mut payloads = Vec::with_capacity(pending.len());

    while let Some((key, payload)) = rx.recv().await {
        if reject_keys.contains(&key) {
            return Err(ChainError::Rejected {
                event: key,
                payload,
            });
        }
        if let Some(position) = pending.iter().position(|pending_key| *pending_key == key) {
            pending.remove(position);
            payloads.push(payload);
            if pending.is_empty() {
                return Ok(payloads);
            }
        }
    }

    Err(ChainError::Closed)
}
