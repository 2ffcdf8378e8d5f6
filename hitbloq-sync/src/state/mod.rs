pub mod holder;
pub mod reconciler;
pub mod reducer;

pub use holder::{FetchFuture, SelectionHolder, SlotBinding};
pub use reconciler::{ReconcileOutcome, Reconciler};

use hitbloq_api::endpoints::{
    events::Event,
    leaderboards::{LeaderboardEntry, PAGE_SIZE},
    ranks::RankInfo,
    LevelKey,
};
use itertools::Itertools;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::str::FromStr;

use crate::error::FetchFailure;

/// Lifecycle of one slot.
///
/// `Idle → Loading → Loaded | Failed`, back to `Loading` on every re-dispatch.
/// `Disposed` is terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum SlotState<V> {
    Idle,
    Loading,
    Loaded(V),
    Failed(FetchFailure),
    Disposed,
}

impl<V> Default for SlotState<V> {
    fn default() -> Self {
        Self::Idle
    }
}

impl<V> SlotState<V> {
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed)
    }

    pub fn value(&self) -> Option<&V> {
        match self {
            Self::Loaded(value) => Some(value),
            _ => None,
        }
    }
}

/// Fetch targets of the Hitbloq panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    PoolInfo,
    RankInfo,
    Leaderboard,
    Event,
}

impl Slot {
    pub const ALL: [Slot; 4] = [Slot::PoolInfo, Slot::RankInfo, Slot::Leaderboard, Slot::Event];

    pub fn name(&self) -> &'static str {
        match self {
            Self::PoolInfo => "pool-info",
            Self::RankInfo => "rank-info",
            Self::Leaderboard => "leaderboard-page",
            Self::Event => "event",
        }
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which scores the leaderboard shows
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LeaderboardSource {
    #[default]
    Global,
    AroundMe,
    Friends,
}

impl LeaderboardSource {
    /// Whether the source can be paged with up/down
    pub fn is_scrollable(&self) -> bool {
        match self {
            Self::Global | Self::Friends => true,
            Self::AroundMe => false,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Global => "Global",
            Self::AroundMe => "Around Me",
            Self::Friends => "Friends",
        }
    }
}

impl FromStr for LeaderboardSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "global" => Ok(Self::Global),
            "aroundme" | "nearby" => Ok(Self::AroundMe),
            "friends" => Ok(Self::Friends),
            _ => Err(format!("unknown leaderboard source '{}'", s)),
        }
    }
}

/// What the player currently wants to see
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct PanelSelection {
    pub level: Option<LevelKey>,
    pub pool: Option<String>,
    pub source: LeaderboardSource,
    pub page: u32,
}

/// One entry of the pool dropdown
#[derive(Debug, Clone, PartialEq)]
pub struct PoolOption {
    pub id: String,
    pub shown_name: String,
    pub stars: f64,
}

impl PoolOption {
    pub fn label(&self) -> String {
        format!("{} - {}⭐", self.shown_name, self.stars)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardPage {
    pub source: LeaderboardSource,
    pub page: u32,
    pub entries: Vec<LeaderboardEntry>,
}

/// Values published by the panel's slots
#[derive(Debug, Clone, PartialEq)]
pub enum PanelData {
    Pools(Vec<PoolOption>),
    Rank(Option<RankInfo>),
    Leaderboard(LeaderboardPage),
    Event(Option<Event>),
}

/// Hitbloq user whose presence on a leaderboard flips the logo
pub const CUTE_USER_ID: u64 = 726;

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardRow {
    pub rank: u64,
    pub username: String,
    pub score: u64,
    pub accuracy: f64,
    pub cr: Option<f64>,
}

/// Presentation state the UI binds to, folded from slot events
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PanelView {
    pub pools: Vec<PoolOption>,
    pub rank: Option<RankInfo>,
    pub leaderboard: Option<LeaderboardPage>,
    pub event: Option<Event>,
    pub show_event_modal: bool,
    pub cute_mode: bool,
    pub prompt_text: String,
    pub loading: BTreeSet<Slot>,
    pub failures: BTreeMap<Slot, String>,
}

impl PanelView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool_labels(&self) -> Vec<String> {
        if self.pools.is_empty() {
            return vec!["None".to_string()];
        }
        self.pools.iter().map(PoolOption::label).collect()
    }

    pub fn has_pool(&self, pool_id: &str) -> bool {
        self.pools.iter().any(|pool| pool.id == pool_id)
    }

    pub fn pool_ranking_text(&self) -> Option<String> {
        self.rank
            .as_ref()
            .map(|rank| format!("#{} ({:.2}cr)", rank.rank, rank.cr))
    }

    /// Leaderboard rows with absolute ranks.
    ///
    /// The service's rank is used when present, otherwise the position is
    /// derived from the page.
    pub fn rows(&self) -> Vec<LeaderboardRow> {
        let Some(page) = &self.leaderboard else {
            return Vec::new();
        };

        page.entries
            .iter()
            .enumerate()
            .map(|(i, entry)| LeaderboardRow {
                rank: if entry.rank > 0 {
                    entry.rank
                } else {
                    u64::from(page.page) * u64::from(PAGE_SIZE) + i as u64 + 1
                },
                username: entry.username.clone(),
                score: entry.score,
                accuracy: entry.accuracy,
                cr: entry.first_cr(),
            })
            .collect()
    }

    pub fn is_loading(&self, slot: Slot) -> bool {
        self.loading.contains(&slot)
    }

    pub fn loading_active(&self) -> bool {
        !self.loading.is_empty()
    }

    pub fn failure(&self, slot: Slot) -> Option<&str> {
        self.failures.get(&slot).map(String::as_str)
    }

    /// Summary of failed slots, e.g. `rank-info: Not found: user`
    pub fn failure_summary(&self) -> Option<String> {
        if self.failures.is_empty() {
            return None;
        }
        Some(
            self.failures
                .iter()
                .map(|(slot, reason)| format!("{}: {}", slot, reason))
                .join("; "),
        )
    }

    pub fn up_enabled(&self, selection: &PanelSelection) -> bool {
        selection.page != 0 && selection.source.is_scrollable()
    }

    pub fn down_enabled(&self, selection: &PanelSelection) -> bool {
        selection.source.is_scrollable()
            && self
                .leaderboard
                .as_ref()
                .is_some_and(|page| !page.entries.is_empty())
    }
}
