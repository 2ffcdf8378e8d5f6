pub mod data_loader;
pub mod source;

use std::collections::HashMap;
use std::fmt::{self, Debug, Display};
use std::future::Future;
use std::hash::Hash;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{DispatchError, FetchFailure};

/// Per-slot dispatch counter. Only the newest generation of a slot may publish.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> u64 {
        self.0
    }

    fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

/// Result of a finished fetch, tagged with the slot, generation and selection that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct ResultEnvelope<K, S, V> {
    pub slot: K,
    pub generation: Generation,
    pub selection: S,
    pub outcome: Result<V, FetchFailure>,
}

/// Handle returned to the caller of [`FetchDispatcher::dispatch`]
#[derive(Debug, Clone)]
pub struct FetchHandle {
    generation: Generation,
    cancel: CancellationToken,
}

impl FetchHandle {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

struct InFlight<S> {
    generation: Generation,
    selection: S,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Starts fetches per slot and keeps at most one of them in flight per slot.
///
/// Completions are not handled here: every spawned fetch sends a
/// [`ResultEnvelope`] to the owner's channel, and the owner decides whether the
/// result is still current (see [`crate::state::Reconciler`]).
///
/// Cancellation is a hint. Superseded fetches get their token cancelled and
/// are otherwise left alone; whatever they eventually send is discarded by
/// generation.
pub struct FetchDispatcher<K, S, V> {
    generations: HashMap<K, Generation>,
    in_flight: HashMap<K, InFlight<S>>,
    results_tx: mpsc::UnboundedSender<ResultEnvelope<K, S, V>>,
}

impl<K, S, V> FetchDispatcher<K, S, V>
where
    K: Clone + Eq + Hash + Debug + Send + 'static,
    S: Clone + Send + 'static,
    V: Send + 'static,
{
    pub fn new(results_tx: mpsc::UnboundedSender<ResultEnvelope<K, S, V>>) -> Self {
        Self {
            generations: HashMap::new(),
            in_flight: HashMap::new(),
            results_tx,
        }
    }

    /// Start a fetch for `slot`, superseding whatever was in flight for it.
    ///
    /// The generation is bumped before `fetch` is called, so even a fetch that
    /// fails to start invalidates the operation it replaced. On failure the
    /// slot is left with nothing in flight and the error is returned as is.
    pub fn dispatch<F, Fut>(
        &mut self,
        slot: K,
        selection: S,
        fetch: F,
    ) -> Result<FetchHandle, DispatchError>
    where
        F: FnOnce(S, CancellationToken) -> Result<Fut, DispatchError>,
        Fut: Future<Output = Result<V, FetchFailure>> + Send + 'static,
    {
        if let Some(previous) = self.in_flight.remove(&slot) {
            tracing::debug!(
                slot = ?slot,
                generation = %previous.generation,
                "Cancelling superseded fetch"
            );
            previous.cancel.cancel();
        }

        let generation = self.bump_generation(&slot);
        let cancel = CancellationToken::new();

        let future = match fetch(selection.clone(), cancel.clone()) {
            Ok(future) => future,
            Err(e) => {
                tracing::warn!(slot = ?slot, %generation, "Fetch could not be started: {}", e);
                return Err(e);
            }
        };

        let results_tx = self.results_tx.clone();
        let envelope_slot = slot.clone();
        let envelope_selection = selection.clone();
        let task = tokio::spawn(async move {
            let outcome = future.await;
            // The owner may already be gone (panel closed); nothing to report to then
            let _ = results_tx.send(ResultEnvelope {
                slot: envelope_slot,
                generation,
                selection: envelope_selection,
                outcome,
            });
        });

        tracing::debug!(slot = ?slot, %generation, "Dispatched fetch");
        self.in_flight.insert(
            slot,
            InFlight {
                generation,
                selection,
                cancel: cancel.clone(),
                task,
            },
        );

        Ok(FetchHandle { generation, cancel })
    }

    /// Signal cancellation to every in-flight fetch and forget them (used on teardown)
    pub fn cancel_all(&mut self) {
        for (slot, op) in self.in_flight.drain() {
            tracing::debug!(slot = ?slot, generation = %op.generation, "Cancelling fetch");
            op.cancel.cancel();
        }
    }

    fn bump_generation(&mut self, slot: &K) -> Generation {
        let generation = self.generations.entry(slot.clone()).or_default();
        *generation = generation.next();
        *generation
    }
}

impl<K, S, V> FetchDispatcher<K, S, V>
where
    K: Eq + Hash,
{
    pub fn current_generation(&self, slot: &K) -> Generation {
        self.generations.get(slot).copied().unwrap_or_default()
    }

    pub fn is_current(&self, slot: &K, generation: Generation) -> bool {
        self.current_generation(slot) == generation
    }

    /// Retire the in-flight operation of `slot` if it is `generation`.
    ///
    /// Returns `false` when the generation was superseded or was already settled,
    /// so a result can be applied at most once.
    pub fn settle(&mut self, slot: &K, generation: Generation) -> bool {
        match self.in_flight.get(slot) {
            Some(op) if op.generation == generation => {
                self.in_flight.remove(slot);
                true
            }
            _ => false,
        }
    }

    pub fn is_in_flight(&self, slot: &K) -> bool {
        self.in_flight.contains_key(slot)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn in_flight_selection(&self, slot: &K) -> Option<&S> {
        self.in_flight.get(slot).map(|op| &op.selection)
    }
}

impl<K, S, V> Drop for FetchDispatcher<K, S, V> {
    fn drop(&mut self) {
        for (_, op) in self.in_flight.drain() {
            op.cancel.cancel();
            op.task.abort();
        }
    }
}
