use futures::future::{self, try_join_all};
use futures::FutureExt;
use hitbloq_api::endpoints::{pools::PoolInfo, LevelKey, UserId};
use hitbloq_config::Settings;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::source::RankingSource;
use crate::cache::Cache;
use crate::error::{DispatchError, FetchFailure};
use crate::state::{
    FetchFuture, LeaderboardPage, LeaderboardSource, PanelData, PanelSelection, PoolOption, Slot,
    SlotBinding,
};

pub type PanelBinding = SlotBinding<Slot, PanelSelection, PanelData>;

/// Builds the fetch for every panel slot from the current selection.
///
/// Pool info is read cache-first; everything else always goes to the source.
#[derive(Clone)]
pub struct DataLoader {
    source: Arc<dyn RankingSource>,
    cache: Option<Arc<Cache>>,
    user: Option<UserId>,
    friends: Vec<UserId>,
    pool_cache_ttl: Duration,
}

impl DataLoader {
    pub fn new(source: Arc<dyn RankingSource>, settings: &Settings) -> Self {
        Self {
            source,
            cache: None,
            user: settings.user_id.map(UserId::new),
            friends: settings.friends.iter().copied().map(UserId::new).collect(),
            pool_cache_ttl: settings.pool_cache_ttl(),
        }
    }

    pub fn with_cache(mut self, cache: Arc<Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn user(&self) -> Option<UserId> {
        self.user
    }

    /// Slot bindings for a [`crate::state::SelectionHolder`], with the part of the
    /// selection each slot reads
    pub fn bindings(&self) -> Vec<PanelBinding> {
        let pools = self.clone();
        let rank = self.clone();
        let leaderboard = self.clone();
        let event = self.clone();

        vec![
            SlotBinding::new(Slot::PoolInfo, move |selection, cancel| {
                pools.fetch_pools(selection, cancel)
            })
            .depends_on(|previous: &PanelSelection, next: &PanelSelection| {
                previous.level != next.level
            }),
            SlotBinding::new(Slot::RankInfo, move |selection, cancel| {
                rank.fetch_rank(selection, cancel)
            })
            .depends_on(|previous: &PanelSelection, next: &PanelSelection| {
                previous.pool != next.pool
            }),
            SlotBinding::new(Slot::Leaderboard, move |selection, cancel| {
                leaderboard.fetch_leaderboard(selection, cancel)
            })
            .depends_on(|previous: &PanelSelection, next: &PanelSelection| {
                previous.level != next.level
                    || previous.source != next.source
                    || previous.page != next.page
            }),
            // Fetched with the first selection, afterwards only on refresh
            SlotBinding::new(Slot::Event, move |selection, cancel| {
                event.fetch_event(selection, cancel)
            })
            .depends_on(|_: &PanelSelection, _: &PanelSelection| false),
        ]
    }

    pub fn fetch_pools(
        &self,
        selection: PanelSelection,
        cancel: CancellationToken,
    ) -> Result<FetchFuture<PanelData>, DispatchError> {
        let Some(level) = selection.level else {
            return Ok(ready(PanelData::Pools(Vec::new())));
        };

        let loader = self.clone();
        Ok(until_cancelled(cancel, async move {
            loader.load_pools(&level).await.map(PanelData::Pools)
        }))
    }

    pub fn fetch_rank(
        &self,
        selection: PanelSelection,
        cancel: CancellationToken,
    ) -> Result<FetchFuture<PanelData>, DispatchError> {
        let Some(pool) = selection.pool else {
            return Ok(ready(PanelData::Rank(None)));
        };
        let user = self.user.ok_or(DispatchError::MissingUser)?;

        let source = self.source.clone();
        Ok(until_cancelled(cancel, async move {
            tracing::info!("Loading rank of user {} in pool {}", user, pool);
            match source.rank_info(&pool, user).await {
                Ok(rank) => Ok(PanelData::Rank(Some(rank))),
                // Player has no score in this pool yet
                Err(FetchFailure::NotFound(_)) => Ok(PanelData::Rank(None)),
                Err(e) => Err(e),
            }
        }))
    }

    pub fn fetch_leaderboard(
        &self,
        selection: PanelSelection,
        cancel: CancellationToken,
    ) -> Result<FetchFuture<PanelData>, DispatchError> {
        let PanelSelection {
            level,
            source: kind,
            page,
            ..
        } = selection;
        let empty = |kind| {
            ready(PanelData::Leaderboard(LeaderboardPage {
                source: kind,
                page,
                entries: Vec::new(),
            }))
        };

        let Some(level) = level else {
            return Ok(empty(kind));
        };

        let source = self.source.clone();
        let fetch = match kind {
            LeaderboardSource::Global => {
                async move { source.scores(&level, page).await }.boxed()
            }
            LeaderboardSource::AroundMe => {
                let user = self.user.ok_or(DispatchError::MissingUser)?;
                async move { source.nearby_scores(&level, user).await }.boxed()
            }
            LeaderboardSource::Friends => {
                let friends = self.friend_ids();
                if friends.is_empty() {
                    return Ok(empty(kind));
                }
                async move { source.friend_scores(&level, &friends).await }.boxed()
            }
        };

        Ok(until_cancelled(cancel, async move {
            tracing::info!("Loading {} leaderboard page {}", kind.display_name(), page);
            let entries = match fetch.await {
                Ok(entries) => entries,
                // Level has no leaderboard on the service yet
                Err(FetchFailure::NotFound(_)) => {
                    tracing::debug!("No {} leaderboard for this level", kind.display_name());
                    Vec::new()
                }
                Err(e) => return Err(e),
            };
            tracing::debug!("Loaded {} leaderboard entries", entries.len());
            Ok(PanelData::Leaderboard(LeaderboardPage {
                source: kind,
                page,
                entries,
            }))
        }))
    }

    pub fn fetch_event(
        &self,
        _selection: PanelSelection,
        cancel: CancellationToken,
    ) -> Result<FetchFuture<PanelData>, DispatchError> {
        let source = self.source.clone();
        Ok(until_cancelled(cancel, async move {
            let event = source.current_event().await?;
            if !event.is_active() {
                tracing::debug!("No event running");
                return Ok(PanelData::Event(None));
            }
            Ok(PanelData::Event(Some(event)))
        }))
    }

    /// Pools the level is ranked in, in the order the service lists them
    pub async fn load_pools(&self, level: &LevelKey) -> Result<Vec<PoolOption>, FetchFailure> {
        tracing::info!("Loading pools for {}", level);

        let info = match self.source.level_info(level).await {
            Ok(info) => info,
            Err(FetchFailure::NotFound(_)) => {
                tracing::debug!("Level {} is not ranked", level);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        try_join_all(info.pools.iter().map(|(pool_id, stars)| async move {
            let pool = self.pool_info(pool_id).await?;
            Ok::<_, FetchFailure>(PoolOption {
                id: pool_id.clone(),
                shown_name: pool.shown_name,
                stars: *stars,
            })
        }))
        .await
    }

    /// Pool info with cache-first strategy
    async fn pool_info(&self, pool_id: &str) -> Result<PoolInfo, FetchFailure> {
        if let Some(cache) = &self.cache {
            match cache.get_pool_info(pool_id).await {
                Ok(Some(cached)) if cached.is_fresh(self.pool_cache_ttl) => {
                    tracing::debug!("Loaded pool {} from cache", pool_id);
                    return Ok(cached.pool);
                }
                Ok(_) => tracing::debug!("No fresh cached pool {}", pool_id),
                Err(e) => tracing::warn!("Failed to read cached pool {}: {}", pool_id, e),
            }
        }

        let pool = self.source.pool_info(pool_id).await?;

        // Update cache in background
        if let Some(cache) = self.cache.clone() {
            let pool = pool.clone();
            tokio::spawn(async move {
                if let Err(e) = cache.set_pool_info(&pool).await {
                    tracing::warn!("Failed to cache pool {}: {}", pool.id, e);
                }
            });
        }

        Ok(pool)
    }

    /// Configured friends plus the player, so the player shows up among them
    fn friend_ids(&self) -> Vec<UserId> {
        let mut ids = self.friends.clone();
        if let Some(user) = self.user {
            if !ids.contains(&user) {
                ids.push(user);
            }
        }
        ids
    }
}

fn ready(data: PanelData) -> FetchFuture<PanelData> {
    future::ready(Ok(data)).boxed()
}

/// Resolve to [`FetchFailure::Cancelled`] as soon as `cancel` fires
fn until_cancelled<T, F>(cancel: CancellationToken, fetch: F) -> FetchFuture<T>
where
    T: Send + 'static,
    F: Future<Output = Result<T, FetchFailure>> + Send + 'static,
{
    async move {
        tokio::select! {
            _ = cancel.cancelled() => Err(FetchFailure::Cancelled),
            result = fetch => result,
        }
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, FakeSource};

    fn settings(user_id: Option<u64>, friends: Vec<u64>) -> Settings {
        Settings {
            user_id,
            friends,
            ..Settings::default()
        }
    }

    fn loader(source: &Arc<FakeSource>, user_id: Option<u64>) -> DataLoader {
        DataLoader::new(source.clone(), &settings(user_id, Vec::new()))
    }

    fn selection() -> PanelSelection {
        PanelSelection {
            level: Some(testing::level()),
            pool: Some("bbbear".to_string()),
            ..PanelSelection::default()
        }
    }

    #[tokio::test]
    async fn test_pools_keep_level_order() {
        let source = Arc::new(FakeSource::new());
        source.with_level(&testing::level(), &[("tech", 9.1), ("bbbear", 4.2)]);
        source.with_pool("tech", "Tech");
        source.with_pool("bbbear", "Bbbear");

        let pools = loader(&source, None)
            .load_pools(&testing::level())
            .await
            .unwrap();

        let ids: Vec<_> = pools.iter().map(|pool| pool.id.as_str()).collect();
        assert_eq!(ids, vec!["tech", "bbbear"]);
        assert_eq!(pools[0].label(), "Tech - 9.1⭐");
    }

    #[tokio::test]
    async fn test_unranked_level_has_no_pools() {
        let source = Arc::new(FakeSource::new());

        let pools = loader(&source, None)
            .load_pools(&testing::level())
            .await
            .unwrap();

        assert!(pools.is_empty());
    }

    #[tokio::test]
    async fn test_pool_info_is_cached() {
        let source = Arc::new(FakeSource::new());
        source.with_level(&testing::level(), &[("tech", 9.1)]);
        source.with_pool("tech", "Tech");
        let dir = std::env::temp_dir().join(format!("hitbloq-loader-{}", uuid::Uuid::new_v4()));
        let cache = Arc::new(Cache::with_dir(dir).await.unwrap());
        cache
            .set_pool_info(&PoolInfo {
                id: "tech".to_string(),
                shown_name: "Cached Tech".to_string(),
                short_description: None,
                playlist_url: None,
            })
            .await
            .unwrap();

        let pools = loader(&source, None)
            .with_cache(cache)
            .load_pools(&testing::level())
            .await
            .unwrap();

        assert_eq!(pools[0].shown_name, "Cached Tech");
        assert_eq!(source.call_count("pool:tech"), 0);
    }

    #[tokio::test]
    async fn test_rank_without_user_fails_to_start() {
        let source = Arc::new(FakeSource::new());

        let result = loader(&source, None).fetch_rank(selection(), CancellationToken::new());

        assert!(matches!(result, Err(DispatchError::MissingUser)));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rank_without_pool_is_empty() {
        let source = Arc::new(FakeSource::new());
        let selection = PanelSelection {
            pool: None,
            ..selection()
        };

        let data = loader(&source, None)
            .fetch_rank(selection, CancellationToken::new())
            .unwrap()
            .await;

        assert_eq!(data, Ok(PanelData::Rank(None)));
    }

    #[tokio::test]
    async fn test_missing_rank_is_not_a_failure() {
        let source = Arc::new(FakeSource::new());

        let data = loader(&source, Some(42))
            .fetch_rank(selection(), CancellationToken::new())
            .unwrap()
            .await;

        assert_eq!(data, Ok(PanelData::Rank(None)));
        assert_eq!(source.calls(), vec!["rank:bbbear"]);
    }

    #[tokio::test]
    async fn test_cancelled_fetch_resolves_cancelled() {
        let source = Arc::new(FakeSource::new());
        source.gate("rank:bbbear");
        let cancel = CancellationToken::new();

        let fetch = loader(&source, Some(42))
            .fetch_rank(selection(), cancel.clone())
            .unwrap();
        cancel.cancel();

        assert_eq!(fetch.await, Err(FetchFailure::Cancelled));
    }

    #[tokio::test]
    async fn test_friends_leaderboard_includes_player() {
        let source = Arc::new(FakeSource::new());
        source.with_friend_scores(&testing::level(), vec![testing::entry(7, 1)]);
        let loader = DataLoader::new(source.clone(), &settings(Some(42), vec![7]));
        let selection = PanelSelection {
            source: LeaderboardSource::Friends,
            ..selection()
        };

        let data = loader
            .fetch_leaderboard(selection, CancellationToken::new())
            .unwrap()
            .await
            .unwrap();

        assert!(matches!(data, PanelData::Leaderboard(page) if page.entries.len() == 1));
        assert_eq!(loader.friend_ids(), vec![UserId::new(7), UserId::new(42)]);
    }

    #[tokio::test]
    async fn test_unknown_level_has_empty_leaderboard() {
        let source = Arc::new(FakeSource::new());
        source.fail("scores:0", FetchFailure::NotFound("leaderboard".to_string()));

        let data = loader(&source, None)
            .fetch_leaderboard(selection(), CancellationToken::new())
            .unwrap()
            .await;

        assert_eq!(
            data,
            Ok(PanelData::Leaderboard(LeaderboardPage {
                source: LeaderboardSource::Global,
                page: 0,
                entries: Vec::new(),
            }))
        );
    }

    #[tokio::test]
    async fn test_around_me_requires_user() {
        let source = Arc::new(FakeSource::new());
        let selection = PanelSelection {
            source: LeaderboardSource::AroundMe,
            ..selection()
        };

        let result = loader(&source, None).fetch_leaderboard(selection, CancellationToken::new());

        assert!(matches!(result, Err(DispatchError::MissingUser)));
    }

    #[tokio::test]
    async fn test_placeholder_event_is_none() {
        let source = Arc::new(FakeSource::new());
        source.with_event(testing::event(-1, ""));

        let data = loader(&source, None)
            .fetch_event(selection(), CancellationToken::new())
            .unwrap()
            .await;

        assert_eq!(data, Ok(PanelData::Event(None)));
    }
}
