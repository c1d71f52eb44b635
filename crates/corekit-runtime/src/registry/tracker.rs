//! Tracks registrations in flight and decides when the aggregate
//! `modules.resolved` signal fires.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::warn;

/// Result of [`RegistrationTracker::finish`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerOutcome {
    /// The set drained during a bulk phase; fire the aggregate signal now.
    Drained,
    /// Other registrations are pending, or no bulk phase is active, or the
    /// signal already fired for this phase.
    Pending,
    /// The name was not being tracked.
    Unknown,
}

#[derive(Debug, Default)]
struct TrackerState {
    /// Name to the number of registrations of it in flight.
    pending: HashMap<String, usize>,
    bulk_phase: bool,
    fired: bool,
}

/// Counts of module names whose registration is in flight.
#[derive(Debug, Default)]
pub struct RegistrationTracker {
    state: Mutex<TrackerState>,
}

impl RegistrationTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackerState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Marks `name` as registering. Overlapping registrations of the same
    /// name are counted.
    pub fn begin(&self, name: &str) {
        *self.lock().pending.entry(name.to_string()).or_insert(0) += 1;
    }

    /// Removes `name` after its registration settled, successfully or not.
    pub fn finish(&self, name: &str) -> TrackerOutcome {
        let mut state = self.lock();
        match state.pending.get_mut(name) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                state.pending.remove(name);
            }
            None => {
                warn!(module = %name, "Checking for status of unknown module");
                return TrackerOutcome::Unknown;
            }
        }
        Self::check(&mut state)
    }

    /// Starts the bulk phase. Returns `true` when nothing is pending, in
    /// which case the aggregate signal must fire right away.
    pub fn begin_bulk_phase(&self) -> bool {
        let mut state = self.lock();
        state.bulk_phase = true;
        state.fired = false;
        Self::check(&mut state) == TrackerOutcome::Drained
    }

    fn check(state: &mut TrackerState) -> TrackerOutcome {
        if state.bulk_phase && !state.fired && state.pending.is_empty() {
            state.fired = true;
            TrackerOutcome::Drained
        } else {
            TrackerOutcome::Pending
        }
    }

    /// Names currently registering, sorted.
    pub fn pending(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().pending.keys().cloned().collect();
        names.sort();
        names
    }

    /// Whether the bulk phase has started.
    pub fn in_bulk_phase(&self) -> bool {
        self.lock().bulk_phase
    }
}
