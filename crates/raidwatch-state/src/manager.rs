//! The state owner: applies event batches, persists, and drives expiry.

use std::sync::mpsc::Sender;

use chrono::Utc;
use tracing::{error, info, warn};

use raidwatch_core::enums::{BatchKind, TimerState};
use raidwatch_core::events::{Event, ExpiryNotice};
use raidwatch_core::state::{ActiveObjectGroup, WorldState};

use crate::expiry::{ExpiryTick, ExpiryTimer};
use crate::reconcile::{self, EventOutcome};
use crate::store::StateStore;

/// Result of one `update_state` call.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub kind: BatchKind,
    /// One entry per event for incremental batches; empty for summaries.
    pub outcomes: Vec<EventOutcome>,
    /// Groups tracked after the batch.
    pub groups: usize,
    /// True when this batch emptied a previously non-empty collection.
    pub cleared: bool,
}

/// Owns the active group collection. Not `Sync`; exactly one thread applies
/// batches and expiry ticks.
pub struct StateManager<S: StateStore> {
    store: S,
    groups: Vec<ActiveObjectGroup>,
    timer: ExpiryTimer,
    timer_state: TimerState,
    generation: u64,
    notices: Sender<ExpiryNotice>,
}

impl<S: StateStore> StateManager<S> {
    /// Restore state from `store` and arm the timer if anything was restored.
    /// A store that cannot be read is logged and treated as empty.
    pub fn new(store: S, timer: ExpiryTimer, notices: Sender<ExpiryNotice>) -> Self {
        let groups = store.load_all().unwrap_or_else(|e| {
            error!(error = %e, "Failed to load state; starting empty");
            Vec::new()
        });
        info!(groups = groups.len(), "State restored");

        let mut manager = Self {
            store,
            groups,
            timer,
            timer_state: TimerState::Disarmed,
            generation: 0,
            notices,
        };
        manager.refresh_timer();
        manager
    }

    /// Apply one classified batch.
    pub fn update_state(&mut self, events: &[Event]) -> BatchReport {
        let was_empty = self.groups.is_empty();
        if events.is_empty() {
            self.refresh_timer();
            return self.report(BatchKind::Incremental, Vec::new(), false);
        }

        let now = Utc::now();
        let kind = reconcile::classify_batch(events);
        let outcomes = match kind {
            BatchKind::Summary(category) => {
                reconcile::replace_category(&mut self.groups, category, events, now);
                Vec::new()
            }
            BatchKind::Incremental => events
                .iter()
                .map(|event| reconcile::process_event(&mut self.groups, event, now))
                .collect(),
        };

        self.persist();
        self.refresh_timer();
        let cleared = !was_empty && self.groups.is_empty();
        if cleared {
            info!("All groups resolved");
        }
        self.report(kind, outcomes, cleared)
    }

    /// Handle a fired timer. Returns true when the state was cleared.
    ///
    /// Ticks from a superseded countdown are ignored.
    pub fn handle_expiry(&mut self, tick: ExpiryTick) -> bool {
        if tick.generation != self.generation || self.timer_state != TimerState::Armed {
            info!(
                tick = tick.generation,
                current = self.generation,
                "Ignoring stale idle-timer tick"
            );
            return false;
        }
        self.timer_state = TimerState::Disarmed;
        if self.groups.is_empty() {
            return false;
        }

        let events = self.landed_events();
        warn!(groups = events.len(), "Idle timeout; clearing all groups");
        self.groups.clear();
        self.persist();

        let notice = ExpiryNotice {
            events,
            cleared_at: Utc::now(),
        };
        if self.notices.send(notice).is_err() {
            warn!("Expiry notice receiver is gone");
        }
        true
    }

    /// One `landed` event per tracked group, as synthesized on expiry.
    pub fn landed_events(&self) -> Vec<Event> {
        self.groups
            .iter()
            .map(|g| Event::landed(g.quantity, g.category, g.destination.clone()))
            .collect()
    }

    pub fn snapshot(&self) -> WorldState {
        WorldState {
            groups: self.groups.clone(),
        }
    }

    pub fn groups(&self) -> &[ActiveObjectGroup] {
        &self.groups
    }

    pub fn timer_state(&self) -> TimerState {
        self.timer_state
    }

    /// Generation of the current countdown.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn report(&self, kind: BatchKind, outcomes: Vec<EventOutcome>, cleared: bool) -> BatchReport {
        BatchReport {
            kind,
            outcomes,
            groups: self.groups.len(),
            cleared,
        }
    }

    /// Re-arm when groups remain, cancel otherwise. Either way the generation
    /// moves on so any tick already queued is stale.
    fn refresh_timer(&mut self) {
        self.generation += 1;
        if self.groups.is_empty() {
            if self.timer_state == TimerState::Armed {
                info!("No active groups; idle timer cancelled");
            }
            self.timer.disarm();
            self.timer_state = TimerState::Disarmed;
        } else {
            self.timer.arm(self.generation);
            self.timer_state = TimerState::Armed;
        }
    }

    fn persist(&self) {
        if let Err(e) = self.store.replace_all(&self.groups) {
            error!(error = %e, "Failed to persist state; keeping in-memory copy");
        }
    }
}
