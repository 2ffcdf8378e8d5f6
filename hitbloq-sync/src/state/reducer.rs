use super::{PanelData, PanelView, Slot, CUTE_USER_ID};
use crate::events::SlotEvent;

/// Pure state transition function for slot events
pub fn reduce_slot_event(view: &mut PanelView, event: SlotEvent<Slot, PanelData>) {
    match event {
        SlotEvent::Loading { slot, .. } => {
            view.loading.insert(slot);
            view.failures.remove(&slot);
        }

        SlotEvent::Loaded { slot, value, .. } => {
            view.loading.remove(&slot);
            view.failures.remove(&slot);
            apply_data(view, value);
        }

        // Stale data would be misleading next to a failure
        SlotEvent::Failed { slot, failure, .. } => {
            view.loading.remove(&slot);
            view.failures.insert(slot, failure.to_string());
            clear_slot(view, slot);
        }

        SlotEvent::Idle { slot } | SlotEvent::Disposed { slot } => {
            view.loading.remove(&slot);
        }
    }
}

fn apply_data(view: &mut PanelView, data: PanelData) {
    match data {
        PanelData::Pools(pools) => view.pools = pools,
        PanelData::Rank(rank) => view.rank = rank,
        PanelData::Leaderboard(page) => {
            view.cute_mode = page
                .entries
                .iter()
                .any(|entry| entry.user_id.inner() == CUTE_USER_ID);
            view.leaderboard = Some(page);
        }
        PanelData::Event(event) => view.event = event,
    }
}

fn clear_slot(view: &mut PanelView, slot: Slot) {
    match slot {
        Slot::PoolInfo => view.pools.clear(),
        Slot::RankInfo => view.rank = None,
        Slot::Leaderboard => {
            view.leaderboard = None;
            view.cute_mode = false;
        }
        Slot::Event => view.event = None,
    }
}
