use hitbloq_config::ViewedEventsStore;
use tokio::sync::mpsc;

use crate::background::data_loader::DataLoader;
use crate::error::DispatchError;
use crate::events::SlotEvent;
use crate::state::reducer::reduce_slot_event;
use crate::state::{
    PanelData, PanelSelection, PanelView, ReconcileOutcome, SelectionHolder, Slot, SlotState,
};

pub const REGISTER_PROMPT: &str = "Please register for Hitbloq to see your rank";

/// The Hitbloq panel: a selection holder over the four panel slots plus the view
/// folded from their events.
///
/// Single owner; every method runs on the task that drives the panel.
pub struct Panel {
    holder: SelectionHolder<Slot, PanelSelection, PanelData>,
    events: mpsc::UnboundedReceiver<SlotEvent<Slot, PanelData>>,
    view: PanelView,
    viewed_events: Option<ViewedEventsStore>,
}

impl Panel {
    pub fn new(loader: &DataLoader) -> Self {
        let mut holder = SelectionHolder::new(loader.bindings());
        let events = holder.subscribe();

        Self {
            holder,
            events,
            view: PanelView::new(),
            viewed_events: None,
        }
    }

    /// Announce new events once, remembering them in `store`
    pub fn with_viewed_events(mut self, store: ViewedEventsStore) -> Self {
        self.viewed_events = Some(store);
        self
    }

    pub fn view(&self) -> &PanelView {
        &self.view
    }

    /// Current selection, or the empty one before anything was selected
    pub fn selection(&self) -> PanelSelection {
        self.holder.selection().cloned().unwrap_or_default()
    }

    pub fn state(&self, slot: Slot) -> Option<&SlotState<PanelData>> {
        self.holder.state(&slot)
    }

    pub fn holder(&self) -> &SelectionHolder<Slot, PanelSelection, PanelData> {
        &self.holder
    }

    pub fn apply_selection(&mut self, selection: PanelSelection) -> Result<(), DispatchError> {
        let result = self.holder.set_selection(selection).map(|started| {
            tracing::debug!("Started {:?}", started);
        });
        self.after_dispatch(result)
    }

    pub fn refresh(&mut self, slot: Slot) -> Result<(), DispatchError> {
        let result = self.holder.refresh(&slot).map(|_| ());
        self.after_dispatch(result)
    }

    /// Wait for one fetch to finish and fold its outcome into the view
    pub async fn process_next(&mut self) -> Option<ReconcileOutcome> {
        let outcome = self.holder.process_next().await;
        self.apply_events();
        outcome
    }

    pub fn process_pending(&mut self) -> usize {
        let processed = self.holder.process_pending();
        self.apply_events();
        processed
    }

    pub fn dismiss_event_modal(&mut self) {
        self.view.show_event_modal = false;
    }

    pub fn teardown(&mut self) {
        self.holder.teardown();
        self.apply_events();
    }

    pub fn is_settled(&self) -> bool {
        self.holder.is_settled()
    }

    pub fn is_disposed(&self) -> bool {
        self.holder.is_disposed()
    }

    fn after_dispatch(&mut self, result: Result<(), DispatchError>) -> Result<(), DispatchError> {
        self.apply_events();
        // After the events: a restored rank must not clear the prompt again
        if let Err(DispatchError::MissingUser) = result {
            self.view.prompt_text = REGISTER_PROMPT.to_string();
        }
        result
    }

    fn apply_events(&mut self) {
        let mut pools_loaded = false;

        while let Ok(event) = self.events.try_recv() {
            let new_event = match &event {
                SlotEvent::Loaded {
                    value: PanelData::Pools(_),
                    ..
                } => {
                    pools_loaded = true;
                    None
                }
                SlotEvent::Loaded {
                    value: PanelData::Rank(_),
                    ..
                } => {
                    self.view.prompt_text.clear();
                    None
                }
                SlotEvent::Loaded {
                    value: PanelData::Event(Some(event)),
                    ..
                } => Some(event.id),
                _ => None,
            };

            reduce_slot_event(&mut self.view, event);

            if let Some(event_id) = new_event {
                self.announce_event(event_id);
            }
        }

        if pools_loaded {
            self.select_default_pool();
        }
    }

    /// Keep the selected pool when the level is ranked in it, otherwise pick the first
    fn select_default_pool(&mut self) {
        let selection = self.selection();
        if selection
            .pool
            .as_deref()
            .is_some_and(|pool| self.view.has_pool(pool))
        {
            return;
        }
        let Some(first) = self.view.pools.first() else {
            return;
        };

        tracing::debug!("Selecting pool {}", first.id);
        let next = PanelSelection {
            pool: Some(first.id.clone()),
            ..selection
        };
        if let Err(e) = self.apply_selection(next) {
            tracing::debug!("Pool follow-up not started: {}", e);
        }
    }

    fn announce_event(&mut self, event_id: i64) {
        let Some(store) = self.viewed_events.as_mut() else {
            return;
        };
        if store.contains(event_id) {
            return;
        }

        self.view.show_event_modal = true;
        if let Err(e) = store.mark_viewed(event_id) {
            tracing::warn!("Failed to remember viewed event {}: {}", event_id, e);
        }
    }
}
