use futures::future::BoxFuture;
use std::fmt::Debug;
use std::hash::Hash;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::background::{FetchDispatcher, Generation, ResultEnvelope};
use crate::error::{DispatchError, FetchFailure};
use crate::events::SlotEvent;
use crate::state::reconciler::{ReconcileOutcome, Reconciler};
use crate::state::SlotState;

pub type FetchFuture<V> = BoxFuture<'static, Result<V, FetchFailure>>;

type FetchFn<S, V> =
    Box<dyn Fn(S, CancellationToken) -> Result<FetchFuture<V>, DispatchError> + Send + Sync>;
type DependsOnFn<S> = Box<dyn Fn(&S, &S) -> bool + Send + Sync>;

/// Ties a slot to the fetch that fills it and to the part of the selection it reads
pub struct SlotBinding<K, S, V> {
    slot: K,
    depends_on: DependsOnFn<S>,
    fetch: FetchFn<S, V>,
}

impl<K, S, V> SlotBinding<K, S, V> {
    /// Binding that is re-fetched on every selection change
    pub fn new<F>(slot: K, fetch: F) -> Self
    where
        F: Fn(S, CancellationToken) -> Result<FetchFuture<V>, DispatchError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            slot,
            depends_on: Box::new(|_, _| true),
            fetch: Box::new(fetch),
        }
    }

    /// Only re-fetch when `changed(previous, next)` reports a relevant difference
    pub fn depends_on<F>(mut self, changed: F) -> Self
    where
        F: Fn(&S, &S) -> bool + Send + Sync + 'static,
    {
        self.depends_on = Box::new(changed);
        self
    }

    pub fn slot(&self) -> &K {
        &self.slot
    }
}

/// Tracks the active selection and keeps every bound slot in sync with it.
///
/// All mutation happens on the owning task: fetches run on spawned tasks and
/// their completions queue up on a channel that only the holder drains, via
/// [`Self::process_next`] or [`Self::process_pending`].
pub struct SelectionHolder<K, S, V> {
    selection: Option<S>,
    bindings: Vec<SlotBinding<K, S, V>>,
    dispatcher: FetchDispatcher<K, S, V>,
    reconciler: Reconciler<K, V>,
    results_rx: mpsc::UnboundedReceiver<ResultEnvelope<K, S, V>>,
}

impl<K, S, V> SelectionHolder<K, S, V>
where
    K: Clone + Eq + Hash + Debug + Send + 'static,
    S: Clone + PartialEq + Send + 'static,
    V: Clone + Send + 'static,
{
    pub fn new(bindings: Vec<SlotBinding<K, S, V>>) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let mut reconciler = Reconciler::new();
        for binding in &bindings {
            reconciler.register(binding.slot.clone());
        }

        Self {
            selection: None,
            bindings,
            dispatcher: FetchDispatcher::new(results_tx),
            reconciler,
            results_rx,
        }
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SlotEvent<K, V>> {
        self.reconciler.subscribe()
    }

    pub fn selection(&self) -> Option<&S> {
        self.selection.as_ref()
    }

    /// Replace the active selection and re-fetch the slots that depend on what changed.
    ///
    /// Returns the slots that were (re)started. Every affected binding is tried;
    /// when some of them fail to start, the first error is returned after the
    /// others were dispatched.
    pub fn set_selection(&mut self, selection: S) -> Result<Vec<K>, DispatchError> {
        if self.reconciler.is_disposed() {
            return Err(DispatchError::Disposed);
        }
        if self.selection.as_ref() == Some(&selection) {
            return Ok(Vec::new());
        }

        let previous = self.selection.replace(selection.clone());
        let mut started = Vec::new();
        let mut first_error = None;

        for binding in &self.bindings {
            let affected = previous
                .as_ref()
                .is_none_or(|previous| (binding.depends_on)(previous, &selection));
            if !affected {
                continue;
            }

            match Self::start(
                &mut self.dispatcher,
                &mut self.reconciler,
                binding,
                selection.clone(),
            ) {
                Ok(_) => started.push(binding.slot.clone()),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(started),
        }
    }

    /// Re-fetch one slot for the current selection
    pub fn refresh(&mut self, slot: &K) -> Result<Generation, DispatchError> {
        if self.reconciler.is_disposed() {
            return Err(DispatchError::Disposed);
        }
        let selection = self
            .selection
            .clone()
            .ok_or_else(|| DispatchError::InvalidSelection("nothing selected yet".to_string()))?;
        let binding = self
            .bindings
            .iter()
            .find(|binding| &binding.slot == slot)
            .ok_or_else(|| DispatchError::InvalidSelection(format!("unknown slot {:?}", slot)))?;

        Self::start(&mut self.dispatcher, &mut self.reconciler, binding, selection)
    }

    /// Wait for the next completion and reconcile it.
    ///
    /// Returns `None` once no fetch can report anymore.
    pub async fn process_next(&mut self) -> Option<ReconcileOutcome> {
        let envelope = self.results_rx.recv().await?;
        Some(self.reconcile(envelope))
    }

    /// Reconcile every completion that has already arrived, without waiting
    pub fn process_pending(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(envelope) = self.results_rx.try_recv() {
            self.reconcile(envelope);
            processed += 1;
        }
        processed
    }

    pub fn reconcile(&mut self, envelope: ResultEnvelope<K, S, V>) -> ReconcileOutcome {
        self.reconciler.reconcile(&mut self.dispatcher, envelope)
    }

    /// Cancel everything and stop reacting. There is no way back.
    pub fn teardown(&mut self) {
        if self.reconciler.is_disposed() {
            return;
        }
        tracing::debug!(in_flight = self.dispatcher.in_flight_count(), "Tearing down");
        self.dispatcher.cancel_all();
        self.reconciler.dispose();
    }

    pub fn state(&self, slot: &K) -> Option<&SlotState<V>> {
        self.reconciler.state(slot)
    }

    pub fn generation(&self, slot: &K) -> Generation {
        self.dispatcher.current_generation(slot)
    }

    pub fn is_in_flight(&self, slot: &K) -> bool {
        self.dispatcher.is_in_flight(slot)
    }

    pub fn in_flight_count(&self) -> usize {
        self.dispatcher.in_flight_count()
    }

    pub fn in_flight_selection(&self, slot: &K) -> Option<&S> {
        self.dispatcher.in_flight_selection(slot)
    }

    /// Nothing is left in flight
    pub fn is_settled(&self) -> bool {
        self.dispatcher.in_flight_count() == 0
    }

    pub fn is_disposed(&self) -> bool {
        self.reconciler.is_disposed()
    }

    fn start(
        dispatcher: &mut FetchDispatcher<K, S, V>,
        reconciler: &mut Reconciler<K, V>,
        binding: &SlotBinding<K, S, V>,
        selection: S,
    ) -> Result<Generation, DispatchError> {
        let started = dispatcher.dispatch(binding.slot.clone(), selection, |selection, cancel| {
            (binding.fetch)(selection, cancel)
        });
        let handle = match started {
            Ok(handle) => handle,
            Err(e) => {
                let generation = dispatcher.current_generation(&binding.slot);
                reconciler.abandon_loading(&binding.slot, generation);
                return Err(e);
            }
        };
        reconciler.mark_loading(binding.slot.clone(), handle.generation());
        Ok(handle.generation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::{Arc, Mutex};
    use tokio::sync::oneshot;

    #[derive(Debug, Clone, PartialEq)]
    struct Selection {
        pool: char,
        level: char,
    }

    fn selection(pool: char, level: char) -> Selection {
        Selection { pool, level }
    }

    type Pending = Vec<(&'static str, Selection, oneshot::Sender<Result<String, FetchFailure>>)>;

    /// Fetches that complete only when the test says so, ignoring cancellation
    #[derive(Clone, Default)]
    struct Remote {
        pending: Arc<Mutex<Pending>>,
    }

    impl Remote {
        fn fetch(
            &self,
            slot: &'static str,
        ) -> impl Fn(Selection, CancellationToken) -> Result<FetchFuture<String>, DispatchError>
               + Send
               + Sync
               + 'static {
            let pending = self.pending.clone();
            move |selection, _cancel| {
                if selection.pool == '!' {
                    return Err(DispatchError::InvalidSelection("bad pool".to_string()));
                }
                let (tx, rx) = oneshot::channel();
                pending.lock().unwrap().push((slot, selection, tx));
                Ok(async move { rx.await.unwrap_or(Err(FetchFailure::Cancelled)) }.boxed())
            }
        }

        fn complete(&self, slot: &str, selection: &Selection, value: &str) {
            let mut pending = self.pending.lock().unwrap();
            let index = pending
                .iter()
                .position(|(s, sel, _)| *s == slot && sel == selection)
                .unwrap();
            let (_, _, tx) = pending.remove(index);
            tx.send(Ok(value.to_string())).unwrap();
        }
    }

    fn holder(remote: &Remote) -> SelectionHolder<&'static str, Selection, String> {
        SelectionHolder::new(vec![
            SlotBinding::new("rank-info", remote.fetch("rank-info"))
                .depends_on(|a: &Selection, b: &Selection| a.pool != b.pool),
            SlotBinding::new("pool-info", remote.fetch("pool-info"))
                .depends_on(|a: &Selection, b: &Selection| a.level != b.level),
        ])
    }

    #[tokio::test]
    async fn first_selection_starts_every_slot() {
        let remote = Remote::default();
        let mut holder = holder(&remote);
        assert_eq!(holder.state(&"rank-info"), Some(&SlotState::Idle));

        let started = holder.set_selection(selection('A', 'x')).unwrap();

        assert_eq!(started, vec!["rank-info", "pool-info"]);
        assert_eq!(holder.state(&"rank-info"), Some(&SlotState::Loading));
        assert_eq!(holder.state(&"pool-info"), Some(&SlotState::Loading));
        assert_eq!(holder.in_flight_count(), 2);
    }

    #[tokio::test]
    async fn superseded_pool_result_is_never_published() {
        let remote = Remote::default();
        let mut holder = holder(&remote);
        let a = selection('A', 'x');
        let b = selection('B', 'x');

        holder.set_selection(a.clone()).unwrap();
        assert_eq!(holder.generation(&"rank-info"), Generation::new(1));
        holder.set_selection(b.clone()).unwrap();
        assert_eq!(holder.generation(&"rank-info"), Generation::new(2));

        remote.complete("rank-info", &a, "X");
        assert_eq!(holder.process_next().await, Some(ReconcileOutcome::Superseded));
        assert_eq!(holder.state(&"rank-info"), Some(&SlotState::Loading));

        remote.complete("rank-info", &b, "Y");
        assert_eq!(holder.process_next().await, Some(ReconcileOutcome::Published));
        assert_eq!(
            holder.state(&"rank-info"),
            Some(&SlotState::Loaded("Y".to_string()))
        );
    }

    #[tokio::test]
    async fn late_result_after_newer_publish_is_dropped() {
        let remote = Remote::default();
        let mut holder = holder(&remote);
        let a = selection('A', 'x');
        let b = selection('B', 'x');
        let mut events = holder.subscribe();

        holder.set_selection(a.clone()).unwrap();
        holder.set_selection(b.clone()).unwrap();
        remote.complete("rank-info", &b, "Y");
        holder.process_next().await;
        remote.complete("rank-info", &a, "X");
        assert_eq!(holder.process_next().await, Some(ReconcileOutcome::Superseded));

        assert_eq!(
            holder.state(&"rank-info"),
            Some(&SlotState::Loaded("Y".to_string()))
        );
        while let Ok(event) = events.try_recv() {
            if let SlotEvent::Loaded { value, .. } = event {
                assert_ne!(value, "X");
            }
        }
    }

    #[tokio::test]
    async fn at_most_one_operation_per_slot() {
        let remote = Remote::default();
        let mut holder = holder(&remote);

        for (pool, level) in [('A', 'x'), ('B', 'x'), ('B', 'y'), ('C', 'z'), ('A', 'x')] {
            holder.set_selection(selection(pool, level)).unwrap();
            assert!(holder.in_flight_count() <= 2);
            assert_eq!(
                holder.in_flight_selection(&"rank-info").map(|s| s.pool),
                Some(pool)
            );
        }
        assert_eq!(holder.generation(&"rank-info"), Generation::new(4));
        assert_eq!(holder.generation(&"pool-info"), Generation::new(4));
    }

    #[tokio::test]
    async fn duplicate_completion_leaves_latest_value() {
        let remote = Remote::default();
        let mut holder = holder(&remote);
        let a = selection('A', 'x');

        holder.set_selection(a.clone()).unwrap();
        let generation = holder.generation(&"rank-info");
        remote.complete("rank-info", &a, "X");
        holder.process_next().await;

        let duplicate = ResultEnvelope {
            slot: "rank-info",
            generation,
            selection: a,
            outcome: Ok("X".to_string()),
        };
        assert_eq!(holder.reconcile(duplicate), ReconcileOutcome::AlreadyApplied);
        assert_eq!(
            holder.state(&"rank-info"),
            Some(&SlotState::Loaded("X".to_string()))
        );
    }

    #[tokio::test]
    async fn teardown_is_absorbing() {
        let remote = Remote::default();
        let mut holder = holder(&remote);
        let a = selection('A', 'x');

        holder.set_selection(a.clone()).unwrap();
        holder.teardown();
        assert!(holder.is_settled());

        remote.complete("rank-info", &a, "X");
        assert_eq!(holder.process_next().await, Some(ReconcileOutcome::Disposed));
        assert_eq!(holder.state(&"rank-info"), Some(&SlotState::Disposed));
        assert_eq!(holder.state(&"pool-info"), Some(&SlotState::Disposed));

        assert_eq!(
            holder.set_selection(selection('B', 'y')),
            Err(DispatchError::Disposed)
        );
        assert_eq!(holder.refresh(&"rank-info"), Err(DispatchError::Disposed));
    }

    #[tokio::test]
    async fn failed_start_keeps_prior_state() {
        let remote = Remote::default();
        let mut holder = holder(&remote);
        let a = selection('A', 'x');

        holder.set_selection(a.clone()).unwrap();
        remote.complete("rank-info", &a, "X");
        holder.process_next().await;

        let err = holder.set_selection(selection('!', 'x')).unwrap_err();

        assert_eq!(err, DispatchError::InvalidSelection("bad pool".to_string()));
        assert_eq!(
            holder.state(&"rank-info"),
            Some(&SlotState::Loaded("X".to_string()))
        );
        assert!(!holder.is_in_flight(&"rank-info"));
        // pool-info did not depend on the change and kept its fetch
        assert!(holder.is_in_flight(&"pool-info"));
    }

    #[tokio::test]
    async fn failed_restart_of_loading_slot_returns_to_idle() {
        let remote = Remote::default();
        let mut holder = holder(&remote);
        let a = selection('A', 'x');
        let mut events = holder.subscribe();

        holder.set_selection(a.clone()).unwrap();
        assert!(holder.set_selection(selection('!', 'x')).is_err());

        assert_eq!(holder.state(&"rank-info"), Some(&SlotState::Idle));
        assert!(!holder.is_in_flight(&"rank-info"));

        remote.complete("rank-info", &a, "X");
        assert_eq!(holder.process_next().await, Some(ReconcileOutcome::Superseded));
        assert_eq!(holder.state(&"rank-info"), Some(&SlotState::Idle));

        let last = std::iter::from_fn(|| events.try_recv().ok()).last();
        assert_eq!(last, Some(SlotEvent::Idle { slot: "rank-info" }));
    }

    #[tokio::test]
    async fn failed_restart_of_loading_slot_restores_last_value() {
        let remote = Remote::default();
        let mut holder = holder(&remote);
        let a = selection('A', 'x');

        holder.set_selection(a.clone()).unwrap();
        remote.complete("rank-info", &a, "X");
        holder.process_next().await;
        holder.set_selection(selection('B', 'x')).unwrap();
        assert_eq!(holder.state(&"rank-info"), Some(&SlotState::Loading));

        assert!(holder.set_selection(selection('!', 'x')).is_err());

        assert_eq!(
            holder.state(&"rank-info"),
            Some(&SlotState::Loaded("X".to_string()))
        );
        assert!(!holder.is_in_flight(&"rank-info"));
    }

    #[tokio::test]
    async fn unrelated_slot_keeps_its_fetch() {
        let remote = Remote::default();
        let mut holder = holder(&remote);

        holder.set_selection(selection('A', 'x')).unwrap();
        let started = holder.set_selection(selection('A', 'y')).unwrap();

        assert_eq!(started, vec!["pool-info"]);
        assert_eq!(holder.generation(&"pool-info"), Generation::new(2));
        assert_eq!(holder.generation(&"rank-info"), Generation::new(1));
        assert_eq!(
            holder.in_flight_selection(&"rank-info"),
            Some(&selection('A', 'x'))
        );
    }

    #[tokio::test]
    async fn equal_selection_is_a_no_op() {
        let remote = Remote::default();
        let mut holder = holder(&remote);

        holder.set_selection(selection('A', 'x')).unwrap();
        let started = holder.set_selection(selection('A', 'x')).unwrap();

        assert!(started.is_empty());
        assert_eq!(holder.generation(&"rank-info"), Generation::new(1));
    }

    #[tokio::test]
    async fn refresh_restarts_one_slot() {
        let remote = Remote::default();
        let mut holder = holder(&remote);
        let a = selection('A', 'x');

        assert!(matches!(
            holder.refresh(&"rank-info"),
            Err(DispatchError::InvalidSelection(_))
        ));

        holder.set_selection(a.clone()).unwrap();
        remote.complete("rank-info", &a, "X");
        holder.process_next().await;

        assert_eq!(holder.refresh(&"rank-info"), Ok(Generation::new(2)));
        assert_eq!(holder.state(&"rank-info"), Some(&SlotState::Loading));
        assert_eq!(holder.generation(&"pool-info"), Generation::new(1));
    }
}
