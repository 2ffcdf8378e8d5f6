use hitbloq_api::endpoints::LevelKey;

use crate::background::Generation;
use crate::error::FetchFailure;
use crate::state::{LeaderboardSource, Slot};

/// Notifications pushed to slot observers.
///
/// Observers may see the same value more than once and must redraw idempotently.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotEvent<K, V> {
    Loading {
        slot: K,
        generation: Generation,
    },
    Loaded {
        slot: K,
        generation: Generation,
        value: V,
    },
    Failed {
        slot: K,
        generation: Generation,
        failure: FetchFailure,
    },
    /// The fetch that was replacing the last value never started
    Idle {
        slot: K,
    },
    Disposed {
        slot: K,
    },
}

/// User actions on the panel (UI layer → selection changes)
#[derive(Debug, Clone, PartialEq)]
pub enum PanelCommand {
    // Selection
    SelectLevel { level: Option<LevelKey> },
    SelectPool { pool: String },
    SelectSource { source: LeaderboardSource },

    // Leaderboard paging
    NextPage,
    PreviousPage,
    SelectPage { page: u32 },

    // Manual reload of one slot (the sync layer never retries on its own)
    Refresh { slot: Slot },

    DismissEventModal,

    // Screen closed
    Teardown,
}
