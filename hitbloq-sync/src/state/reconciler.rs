use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use tokio::sync::mpsc;

use crate::background::{FetchDispatcher, Generation, ResultEnvelope};
use crate::error::FetchFailure;
use crate::events::SlotEvent;
use crate::state::SlotState;

/// What happened to a completion handed to the [`Reconciler`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Result belonged to the current generation and is now visible
    Published,
    /// A newer dispatch exists for the slot; result dropped
    Superseded,
    /// The generation was already settled (duplicate completion)
    AlreadyApplied,
    /// Owner was torn down; result dropped
    Disposed,
}

impl ReconcileOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published)
    }
}

/// Owns the observable per-slot state and decides which completions may change it
pub struct Reconciler<K, V> {
    states: HashMap<K, SlotState<V>>,
    // State each loading slot had before its fetch started
    settled: HashMap<K, SlotState<V>>,
    subscribers: Vec<mpsc::UnboundedSender<SlotEvent<K, V>>>,
    disposed: bool,
}

impl<K, V> Default for Reconciler<K, V> {
    fn default() -> Self {
        Self {
            states: HashMap::new(),
            settled: HashMap::new(),
            subscribers: Vec::new(),
            disposed: false,
        }
    }
}

impl<K, V> Reconciler<K, V>
where
    K: Clone + Eq + Hash + Debug,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer. Dropping the receiver unsubscribes it.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SlotEvent<K, V>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    /// Start tracking `slot` in the `Idle` state
    pub fn register(&mut self, slot: K) {
        let state = if self.disposed {
            SlotState::Disposed
        } else {
            SlotState::Idle
        };
        self.states.entry(slot).or_insert(state);
    }

    pub fn state(&self, slot: &K) -> Option<&SlotState<V>> {
        self.states.get(slot)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// A fetch for `slot` was started
    pub fn mark_loading(&mut self, slot: K, generation: Generation) {
        if self.disposed {
            return;
        }
        let previous = self.states.insert(slot.clone(), SlotState::Loading);
        if let Some(previous) = previous.filter(|state| !state.is_loading()) {
            self.settled.insert(slot.clone(), previous);
        }
        self.notify(SlotEvent::Loading { slot, generation });
    }

    /// A replacement fetch for `slot` failed to start after the previous one was
    /// cancelled. A loading slot goes back to what it showed before it started
    /// loading, since nothing will ever complete it.
    pub fn abandon_loading(&mut self, slot: &K, generation: Generation) {
        if self.disposed || !self.states.get(slot).is_some_and(SlotState::is_loading) {
            return;
        }

        let restored = self.settled.remove(slot).unwrap_or_default();
        tracing::debug!(slot = ?slot, %generation, "Nothing left loading, restoring last state");
        let event = match &restored {
            SlotState::Loaded(value) => SlotEvent::Loaded {
                slot: slot.clone(),
                generation,
                value: value.clone(),
            },
            SlotState::Failed(failure) => SlotEvent::Failed {
                slot: slot.clone(),
                generation,
                failure: failure.clone(),
            },
            _ => SlotEvent::Idle { slot: slot.clone() },
        };
        self.states.insert(slot.clone(), restored);
        self.notify(event);
    }

    pub fn on_completed<S>(
        &mut self,
        dispatcher: &mut FetchDispatcher<K, S, V>,
        slot: K,
        generation: Generation,
        value: V,
    ) -> ReconcileOutcome {
        let outcome = self.admit(dispatcher, &slot, generation);
        if outcome.is_published() {
            tracing::debug!(slot = ?slot, %generation, "Publishing result");
            self.states.insert(slot.clone(), SlotState::Loaded(value.clone()));
            self.notify(SlotEvent::Loaded {
                slot,
                generation,
                value,
            });
        }
        outcome
    }

    pub fn on_failed<S>(
        &mut self,
        dispatcher: &mut FetchDispatcher<K, S, V>,
        slot: K,
        generation: Generation,
        failure: FetchFailure,
    ) -> ReconcileOutcome {
        let outcome = self.admit(dispatcher, &slot, generation);
        if outcome.is_published() {
            tracing::warn!(slot = ?slot, %generation, "Fetch failed: {}", failure);
            self.states
                .insert(slot.clone(), SlotState::Failed(failure.clone()));
            self.notify(SlotEvent::Failed {
                slot,
                generation,
                failure,
            });
        }
        outcome
    }

    /// Route a finished fetch to [`Self::on_completed`] or [`Self::on_failed`]
    pub fn reconcile<S>(
        &mut self,
        dispatcher: &mut FetchDispatcher<K, S, V>,
        envelope: ResultEnvelope<K, S, V>,
    ) -> ReconcileOutcome {
        let ResultEnvelope {
            slot,
            generation,
            outcome,
            ..
        } = envelope;

        match outcome {
            Ok(value) => self.on_completed(dispatcher, slot, generation, value),
            Err(failure) => self.on_failed(dispatcher, slot, generation, failure),
        }
    }

    /// Move every slot to `Disposed`. Nothing changes state afterwards.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        let slots: Vec<K> = self.states.keys().cloned().collect();
        for slot in slots {
            self.states.insert(slot.clone(), SlotState::Disposed);
            self.notify(SlotEvent::Disposed { slot });
        }
    }

    fn admit<S>(
        &self,
        dispatcher: &mut FetchDispatcher<K, S, V>,
        slot: &K,
        generation: Generation,
    ) -> ReconcileOutcome {
        if self.disposed {
            return ReconcileOutcome::Disposed;
        }
        if !dispatcher.is_current(slot, generation) {
            tracing::debug!(
                slot = ?slot,
                %generation,
                current = %dispatcher.current_generation(slot),
                "Discarding superseded result"
            );
            return ReconcileOutcome::Superseded;
        }
        if !dispatcher.settle(slot, generation) {
            tracing::debug!(slot = ?slot, %generation, "Result already applied");
            return ReconcileOutcome::AlreadyApplied;
        }
        ReconcileOutcome::Published
    }

    fn notify(&mut self, event: SlotEvent<K, V>) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future;

    type TestDispatcher = FetchDispatcher<&'static str, char, u32>;
    type Results = mpsc::UnboundedReceiver<ResultEnvelope<&'static str, char, u32>>;

    fn setup() -> (TestDispatcher, Results, Reconciler<&'static str, u32>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut reconciler = Reconciler::new();
        reconciler.register("rank-info");
        (FetchDispatcher::new(tx), rx, reconciler)
    }

    fn start(dispatcher: &mut TestDispatcher, selection: char) -> Generation {
        dispatcher
            .dispatch("rank-info", selection, |_, _| Ok(future::pending()))
            .unwrap()
            .generation()
    }

    #[tokio::test]
    async fn publishes_current_generation() {
        let (mut dispatcher, _results, mut reconciler) = setup();
        let mut events = reconciler.subscribe();

        let generation = start(&mut dispatcher, 'A');
        reconciler.mark_loading("rank-info", generation);
        let outcome = reconciler.on_completed(&mut dispatcher, "rank-info", generation, 12);

        assert_eq!(outcome, ReconcileOutcome::Published);
        assert_eq!(reconciler.state(&"rank-info"), Some(&SlotState::Loaded(12)));
        assert!(!dispatcher.is_in_flight(&"rank-info"));

        assert!(matches!(events.try_recv(), Ok(SlotEvent::Loading { .. })));
        assert!(matches!(
            events.try_recv(),
            Ok(SlotEvent::Loaded { value: 12, .. })
        ));
    }

    #[tokio::test]
    async fn discards_superseded_generation() {
        let (mut dispatcher, _results, mut reconciler) = setup();

        let old = start(&mut dispatcher, 'A');
        reconciler.mark_loading("rank-info", old);
        let new = start(&mut dispatcher, 'B');
        reconciler.mark_loading("rank-info", new);

        let outcome = reconciler.on_completed(&mut dispatcher, "rank-info", old, 1);
        assert_eq!(outcome, ReconcileOutcome::Superseded);
        assert_eq!(reconciler.state(&"rank-info"), Some(&SlotState::Loading));
        assert!(dispatcher.is_in_flight(&"rank-info"));

        let outcome = reconciler.on_failed(
            &mut dispatcher,
            "rank-info",
            old,
            FetchFailure::Network("timeout".to_string()),
        );
        assert_eq!(outcome, ReconcileOutcome::Superseded);
        assert_eq!(reconciler.state(&"rank-info"), Some(&SlotState::Loading));
    }

    #[tokio::test]
    async fn duplicate_completion_keeps_value() {
        let (mut dispatcher, _results, mut reconciler) = setup();

        let generation = start(&mut dispatcher, 'A');
        reconciler.mark_loading("rank-info", generation);
        reconciler.on_completed(&mut dispatcher, "rank-info", generation, 5);
        let outcome = reconciler.on_completed(&mut dispatcher, "rank-info", generation, 5);

        assert_eq!(outcome, ReconcileOutcome::AlreadyApplied);
        assert_eq!(reconciler.state(&"rank-info"), Some(&SlotState::Loaded(5)));
    }

    #[tokio::test]
    async fn failure_is_published_as_failed_state() {
        let (mut dispatcher, _results, mut reconciler) = setup();

        let generation = start(&mut dispatcher, 'A');
        let envelope = ResultEnvelope {
            slot: "rank-info",
            generation,
            selection: 'A',
            outcome: Err(FetchFailure::NotFound("pool".to_string())),
        };

        assert!(reconciler.reconcile(&mut dispatcher, envelope).is_published());
        assert_eq!(
            reconciler.state(&"rank-info"),
            Some(&SlotState::Failed(FetchFailure::NotFound("pool".to_string())))
        );
    }

    #[tokio::test]
    async fn dispose_is_absorbing() {
        let (mut dispatcher, _results, mut reconciler) = setup();
        let mut events = reconciler.subscribe();

        let generation = start(&mut dispatcher, 'A');
        reconciler.dispose();
        reconciler.mark_loading("rank-info", generation);
        let outcome = reconciler.on_completed(&mut dispatcher, "rank-info", generation, 9);

        assert_eq!(outcome, ReconcileOutcome::Disposed);
        assert_eq!(reconciler.state(&"rank-info"), Some(&SlotState::Disposed));
        assert!(matches!(
            events.try_recv(),
            Ok(SlotEvent::Disposed { slot: "rank-info" })
        ));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_subscribers_are_dropped() {
        let (mut dispatcher, _results, mut reconciler) = setup();
        let dropped = reconciler.subscribe();
        let mut kept = reconciler.subscribe();
        drop(dropped);

        let generation = start(&mut dispatcher, 'A');
        reconciler.mark_loading("rank-info", generation);

        assert_eq!(reconciler.subscribers.len(), 1);
        assert!(kept.try_recv().is_ok());
    }
}
