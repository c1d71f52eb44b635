//! Hook engine: `pre` / main / `post` phases over the event bus.
//!
//! For a hook named `run`:
//! - `run.pre` listeners run one after another in registration order. A
//!   listener returning `Some` replaces the accumulator handed to the next.
//! - `run` listeners run concurrently against the `pre` output. Their
//!   return values are ignored; the `pre` output flows forward.
//! - `run.post` listeners reduce like `pre`, seeded with the forwarded value.
//! - `run.complete` is emitted with the final value, which is also returned.
//!
//! A failing listener fails the whole hook. Completed phases are not rolled
//! back and `complete` does not fire.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::debug;

use corekit_core::events::{EventKey, Phase};
use corekit_core::result::AppResult;

use crate::bus::{EventBus, Listener};

/// Runs hooks against an event bus.
#[derive(Debug)]
pub struct HookEngine<P> {
    /// The bus listeners are registered on.
    bus: Arc<EventBus<P>>,
}

impl<P> HookEngine<P>
where
    P: Clone + Send + 'static,
{
    /// Creates an engine over `bus`.
    pub fn new(bus: Arc<EventBus<P>>) -> Self {
        Self { bus }
    }

    /// Runs hook `name` with `args` and returns the final value.
    pub async fn hook(&self, name: &str, args: P) -> AppResult<P> {
        let main = EventKey::main(name);

        let accumulator = self.reduce(name, &EventKey::new(name, Phase::Pre), args).await?;

        let listeners = self.bus.handlers(&main);
        debug!(hook = %name, listeners = listeners.len(), "Running main stage of hook");
        try_join_all(listeners.iter().map(|listener| listener(accumulator.clone()))).await?;
        self.bus.notify_sinks(&main, accumulator.clone());

        let result = self
            .reduce(name, &EventKey::new(name, Phase::Post), accumulator)
            .await?;

        self.bus
            .emit(&EventKey::new(name, Phase::Complete), result.clone());
        debug!(hook = %name, "Hook complete");

        Ok(result)
    }

    async fn reduce(&self, name: &str, key: &EventKey, seed: P) -> AppResult<P> {
        let listeners: Vec<Listener<P>> = self.bus.handlers(key);
        debug!(
            hook = %name,
            stage = %key,
            listeners = listeners.len(),
            "Running sequential stage of hook"
        );

        let mut accumulator = seed;
        for listener in listeners {
            if let Some(next) = listener(accumulator.clone()).await? {
                accumulator = next;
            }
        }
        self.bus.notify_sinks(key, accumulator.clone());
        Ok(accumulator)
    }

    /// Returns the bus this engine runs on.
    pub fn bus(&self) -> &Arc<EventBus<P>> {
        &self.bus
    }
}
