use async_trait::async_trait;
use hitbloq_api::{
    endpoints::{
        events::Event, leaderboards::LeaderboardEntry, levels::LevelInfo, pools::PoolInfo,
        ranks::RankInfo, LevelKey, UserId,
    },
    Client, Request,
};

use crate::error::FetchFailure;

/// Remote side of every slot fetch.
///
/// Implementations may be slow; callers race them against a cancellation
/// token, so they do not need to watch for cancellation themselves.
#[async_trait]
pub trait RankingSource: Send + Sync {
    async fn level_info(&self, level: &LevelKey) -> Result<LevelInfo, FetchFailure>;

    async fn pool_info(&self, pool_id: &str) -> Result<PoolInfo, FetchFailure>;

    async fn rank_info(&self, pool_id: &str, user: UserId) -> Result<RankInfo, FetchFailure>;

    async fn scores(
        &self,
        level: &LevelKey,
        page: u32,
    ) -> Result<Vec<LeaderboardEntry>, FetchFailure>;

    async fn nearby_scores(
        &self,
        level: &LevelKey,
        user: UserId,
    ) -> Result<Vec<LeaderboardEntry>, FetchFailure>;

    async fn friend_scores(
        &self,
        level: &LevelKey,
        friends: &[UserId],
    ) -> Result<Vec<LeaderboardEntry>, FetchFailure>;

    async fn current_event(&self) -> Result<Event, FetchFailure>;
}

/// [`RankingSource`] backed by the Hitbloq HTTP API
pub struct ApiSource {
    client: Client,
}

impl ApiSource {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self::new(Client::new(base_url))
    }
}

#[async_trait]
impl RankingSource for ApiSource {
    async fn level_info(&self, level: &LevelKey) -> Result<LevelInfo, FetchFailure> {
        let req = Request::levels().info(level.clone());
        Ok(self.client.send(req).await?)
    }

    async fn pool_info(&self, pool_id: &str) -> Result<PoolInfo, FetchFailure> {
        let req = Request::pools().info(pool_id);
        Ok(self.client.send(req).await?)
    }

    async fn rank_info(&self, pool_id: &str, user: UserId) -> Result<RankInfo, FetchFailure> {
        let req = Request::ranks().player(pool_id, user);
        Ok(self.client.send(req).await?)
    }

    async fn scores(
        &self,
        level: &LevelKey,
        page: u32,
    ) -> Result<Vec<LeaderboardEntry>, FetchFailure> {
        let req = Request::leaderboards().with_level(level.clone()).page(page);
        Ok(self.client.send(req).await?)
    }

    async fn nearby_scores(
        &self,
        level: &LevelKey,
        user: UserId,
    ) -> Result<Vec<LeaderboardEntry>, FetchFailure> {
        let req = Request::leaderboards().with_level(level.clone()).around(user);
        Ok(self.client.send(req).await?)
    }

    async fn friend_scores(
        &self,
        level: &LevelKey,
        friends: &[UserId],
    ) -> Result<Vec<LeaderboardEntry>, FetchFailure> {
        let req = Request::leaderboards()
            .with_level(level.clone())
            .friends(friends.to_vec());
        Ok(self.client.send(req).await?)
    }

    async fn current_event(&self) -> Result<Event, FetchFailure> {
        let req = Request::events().current();
        Ok(self.client.send(req).await?)
    }
}
