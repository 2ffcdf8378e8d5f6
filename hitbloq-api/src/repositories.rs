use crate::endpoints::{
    LevelKey, UserId,
    events::GetCurrentEvent,
    leaderboards::{ListFriendScores, ListNearbyScores, ListScores},
    levels::GetLevelInfo,
    pools::GetPoolInfo,
    ranks::GetPlayerRank,
};

pub struct EventRepository;

impl EventRepository {
    pub fn new() -> Self {
        Self {}
    }

    pub fn current(&self) -> GetCurrentEvent {
        GetCurrentEvent::new()
    }
}

pub struct LeaderboardRepository;

impl LeaderboardRepository {
    pub fn new() -> Self {
        Self {}
    }

    pub fn with_level(&self, level: LevelKey) -> LevelLeaderboardRepository {
        LevelLeaderboardRepository { level }
    }
}

pub struct LevelLeaderboardRepository {
    level: LevelKey,
}

impl LevelLeaderboardRepository {
    pub fn page(self, page: u32) -> ListScores {
        ListScores::new(self.level).page(page)
    }

    pub fn around(self, user: UserId) -> ListNearbyScores {
        ListNearbyScores::new(self.level, user)
    }

    pub fn friends(self, friends: Vec<UserId>) -> ListFriendScores {
        ListFriendScores::new(self.level).friends(friends)
    }
}

pub struct LevelRepository;

impl LevelRepository {
    pub fn new() -> Self {
        Self {}
    }

    pub fn info(&self, level: LevelKey) -> GetLevelInfo {
        GetLevelInfo::new(level)
    }
}

pub struct PoolRepository;

impl PoolRepository {
    pub fn new() -> Self {
        Self {}
    }

    pub fn info(&self, pool_id: impl Into<String>) -> GetPoolInfo {
        GetPoolInfo::new(pool_id)
    }
}

pub struct RankRepository;

impl RankRepository {
    pub fn new() -> Self {
        Self {}
    }

    pub fn player(&self, pool_id: impl Into<String>, user: UserId) -> GetPlayerRank {
        GetPlayerRank::new(pool_id, user)
    }
}
