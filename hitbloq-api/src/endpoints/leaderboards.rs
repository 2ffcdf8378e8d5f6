use super::{LevelKey, UserId};
use crate::macros::setter;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tower_api_client::{Method, Request, RequestData};

/// Scores per leaderboard page on the service
pub const PAGE_SIZE: u32 = 10;

// Common

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    #[serde(rename = "user")]
    pub user_id: UserId,
    pub username: String,
    pub score: u64,
    pub accuracy: f64,
    /// CR awarded per pool
    #[serde(default)]
    pub cr: IndexMap<String, f64>,
    pub rank: u64,
}

impl LeaderboardEntry {
    /// CR for the first pool the score counts in
    pub fn first_cr(&self) -> Option<f64> {
        self.cr.values().next().copied()
    }
}

// Requests

#[derive(Debug, Clone)]
pub struct ListScores {
    level: LevelKey,
    page: u32,
}

impl ListScores {
    pub fn new(level: LevelKey) -> Self {
        Self { level, page: 0 }
    }

    setter!(page: u32);
}

impl Request for ListScores {
    type Data = ();
    type Response = Vec<LeaderboardEntry>;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/api/leaderboard/{}/scores_extended/{}", self.level, self.page).into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Empty
    }
}

#[derive(Debug, Clone)]
pub struct ListNearbyScores {
    level: LevelKey,
    user: UserId,
}

impl ListNearbyScores {
    pub fn new(level: LevelKey, user: UserId) -> Self {
        Self { level, user }
    }
}

impl Request for ListNearbyScores {
    type Data = ();
    type Response = Vec<LeaderboardEntry>;

    fn endpoint(&self) -> Cow<'_, str> {
        format!(
            "/api/leaderboard/{}/nearby_scores_extended/{}",
            self.level, self.user
        )
        .into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Empty
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ListFriendScores {
    #[serde(skip)]
    level: LevelKey,
    friends: Vec<UserId>,
}

impl ListFriendScores {
    pub fn new(level: LevelKey) -> Self {
        Self {
            level,
            friends: Vec::new(),
        }
    }

    setter!(friends: Vec<UserId>);
}

impl Request for ListFriendScores {
    type Data = Self;
    type Response = Vec<LeaderboardEntry>;
    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/api/leaderboard/{}/friends_extended", self.level).into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Json(self)
    }
}
