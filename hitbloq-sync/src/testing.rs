use async_trait::async_trait;
use hitbloq_api::endpoints::{
    events::Event, leaderboards::LeaderboardEntry, levels::LevelInfo, pools::PoolInfo,
    ranks::RankInfo, Difficulty, LevelKey, UserId,
};
use hitbloq_config::{Settings, ViewedEventsStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::background::data_loader::DataLoader;
use crate::background::source::RankingSource;
use crate::commands::executor;
use crate::error::{DispatchError, FetchFailure};
use crate::events::PanelCommand;
use crate::panel::Panel;
use crate::state::{PanelData, PanelSelection, PanelView, ReconcileOutcome, Slot, SlotState};

/// Level used throughout the tests
pub fn level() -> LevelKey {
    LevelKey::standard("2FDDB136BDA7F9E29B4CB6621D6D8E0F8A43B126", Difficulty::ExpertPlus)
}

pub fn entry(user: u64, rank: u64) -> LeaderboardEntry {
    LeaderboardEntry {
        user_id: UserId::new(user),
        username: format!("player{}", user),
        score: 1_000_000 - rank,
        accuracy: 97.25,
        cr: Default::default(),
        rank,
    }
}

pub fn event(id: i64, title: &str) -> Event {
    Event {
        id,
        title: title.to_string(),
        image: None,
        description: String::new(),
        pool: None,
    }
}

/// In-memory [`RankingSource`] for tests.
///
/// Every call is recorded under a key such as `rank:bbbear` or `scores:0`.
/// Unknown keys answer `NotFound`. A gated key blocks each call until
/// [`FakeSource::release`] lets one through.
#[derive(Default)]
pub struct FakeSource {
    levels: Mutex<HashMap<String, LevelInfo>>,
    pools: Mutex<HashMap<String, PoolInfo>>,
    ranks: Mutex<HashMap<String, RankInfo>>,
    scores: Mutex<HashMap<String, Vec<LeaderboardEntry>>>,
    event: Mutex<Option<Event>>,
    failures: Mutex<HashMap<String, FetchFailure>>,
    gates: Mutex<HashMap<String, Arc<Semaphore>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(&self, level: &LevelKey, pools: &[(&str, f64)]) {
        let info = LevelInfo {
            pools: pools
                .iter()
                .map(|(id, stars)| (id.to_string(), *stars))
                .collect(),
        };
        lock(&self.levels).insert(level.to_string(), info);
    }

    pub fn with_pool(&self, id: &str, shown_name: &str) {
        let pool = PoolInfo {
            id: id.to_string(),
            shown_name: shown_name.to_string(),
            short_description: None,
            playlist_url: None,
        };
        lock(&self.pools).insert(id.to_string(), pool);
    }

    pub fn with_rank(&self, pool_id: &str, rank: u64, cr: f64) {
        let info = RankInfo {
            rank,
            cr,
            tier: None,
            username: None,
        };
        lock(&self.ranks).insert(pool_id.to_string(), info);
    }

    pub fn with_scores(&self, page: u32, entries: Vec<LeaderboardEntry>) {
        lock(&self.scores).insert(format!("scores:{}", page), entries);
    }

    pub fn with_nearby_scores(&self, entries: Vec<LeaderboardEntry>) {
        lock(&self.scores).insert("nearby".to_string(), entries);
    }

    pub fn with_friend_scores(&self, _level: &LevelKey, entries: Vec<LeaderboardEntry>) {
        lock(&self.scores).insert("friends".to_string(), entries);
    }

    pub fn with_event(&self, event: Event) {
        *lock(&self.event) = Some(event);
    }

    /// Answer every call to `key` with `failure`
    pub fn fail(&self, key: &str, failure: FetchFailure) {
        lock(&self.failures).insert(key.to_string(), failure);
    }

    pub fn recover(&self, key: &str) {
        lock(&self.failures).remove(key);
    }

    /// Hold calls to `key` until released
    pub fn gate(&self, key: &str) {
        lock(&self.gates).insert(key.to_string(), Arc::new(Semaphore::new(0)));
    }

    /// Let one held call to `key` finish
    pub fn release(&self, key: &str) {
        if let Some(gate) = lock(&self.gates).get(key) {
            gate.add_permits(1);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, key: &str) -> usize {
        lock(&self.calls).iter().filter(|call| *call == key).count()
    }

    async fn enter(&self, key: &str) -> Result<(), FetchFailure> {
        lock(&self.calls).push(key.to_string());

        let gate = lock(&self.gates).get(key).cloned();
        if let Some(gate) = gate {
            gate.acquire()
                .await
                .map_err(|e| FetchFailure::Network(e.to_string()))?
                .forget();
        }

        match lock(&self.failures).get(key) {
            Some(failure) => Err(failure.clone()),
            None => Ok(()),
        }
    }

    fn lookup<T: Clone>(map: &Mutex<HashMap<String, T>>, key: &str) -> Result<T, FetchFailure> {
        lock(map)
            .get(key)
            .cloned()
            .ok_or_else(|| FetchFailure::NotFound(key.to_string()))
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl RankingSource for FakeSource {
    async fn level_info(&self, level: &LevelKey) -> Result<LevelInfo, FetchFailure> {
        self.enter("level").await?;
        Self::lookup(&self.levels, &level.to_string())
    }

    async fn pool_info(&self, pool_id: &str) -> Result<PoolInfo, FetchFailure> {
        let key = format!("pool:{}", pool_id);
        self.enter(&key).await?;
        Self::lookup(&self.pools, pool_id)
    }

    async fn rank_info(&self, pool_id: &str, _user: UserId) -> Result<RankInfo, FetchFailure> {
        let key = format!("rank:{}", pool_id);
        self.enter(&key).await?;
        Self::lookup(&self.ranks, pool_id)
    }

    async fn scores(
        &self,
        _level: &LevelKey,
        page: u32,
    ) -> Result<Vec<LeaderboardEntry>, FetchFailure> {
        let key = format!("scores:{}", page);
        self.enter(&key).await?;
        Ok(Self::lookup(&self.scores, &key).unwrap_or_default())
    }

    async fn nearby_scores(
        &self,
        _level: &LevelKey,
        _user: UserId,
    ) -> Result<Vec<LeaderboardEntry>, FetchFailure> {
        self.enter("nearby").await?;
        Ok(Self::lookup(&self.scores, "nearby").unwrap_or_default())
    }

    async fn friend_scores(
        &self,
        _level: &LevelKey,
        _friends: &[UserId],
    ) -> Result<Vec<LeaderboardEntry>, FetchFailure> {
        self.enter("friends").await?;
        Ok(Self::lookup(&self.scores, "friends").unwrap_or_default())
    }

    async fn current_event(&self) -> Result<Event, FetchFailure> {
        self.enter("event").await?;
        Ok(lock(&self.event).clone().unwrap_or_else(|| event(-1, "")))
    }
}

/// Settings of a registered player (user 42) with one friend
pub fn registered_settings() -> Settings {
    Settings {
        user_id: Some(42),
        friends: vec![7],
        ..Settings::default()
    }
}

/// Panel driven directly by a test, over a [`FakeSource`]
pub struct TestPanel {
    pub source: Arc<FakeSource>,
    panel: Panel,
}

impl TestPanel {
    /// Panel for a registered player
    pub fn new(source: Arc<FakeSource>) -> Self {
        Self::with_settings(source, &registered_settings())
    }

    pub fn with_settings(source: Arc<FakeSource>, settings: &Settings) -> Self {
        let loader = DataLoader::new(source.clone(), settings);
        Self {
            source,
            panel: Panel::new(&loader),
        }
    }

    pub fn with_viewed_events(mut self, store: ViewedEventsStore) -> Self {
        self.panel = self.panel.with_viewed_events(store);
        self
    }

    pub fn send(&mut self, command: PanelCommand) -> Result<(), DispatchError> {
        executor::execute_command(command, &mut self.panel)
    }

    /// Select a level the way the game does when the player picks a map
    pub fn open_level(&mut self) -> Result<(), DispatchError> {
        self.send(PanelCommand::SelectLevel {
            level: Some(level()),
        })
    }

    /// Reconcile one completion; panics if none arrives in time
    pub async fn step(&mut self) -> Option<ReconcileOutcome> {
        tokio::time::timeout(Duration::from_secs(5), self.panel.process_next())
            .await
            .expect("no fetch completed within 5s")
    }

    /// Reconcile completions until nothing is left in flight
    pub async fn settle(&mut self) {
        while !self.panel.is_settled() {
            self.step().await;
        }
    }

    pub fn view(&self) -> &PanelView {
        self.panel.view()
    }

    pub fn selection(&self) -> PanelSelection {
        self.panel.selection()
    }

    pub fn state(&self, slot: Slot) -> Option<&SlotState<PanelData>> {
        self.panel.state(slot)
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn panel_mut(&mut self) -> &mut Panel {
        &mut self.panel
    }
}
