use super::UserId;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tower_api_client::{Request, RequestData};

// Common

/// A player's standing in one pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankInfo {
    pub rank: u64,
    pub cr: f64,
    #[serde(default)]
    pub tier: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

// Requests

#[derive(Debug, Clone)]
pub struct GetPlayerRank {
    pool_id: String,
    user: UserId,
}

impl GetPlayerRank {
    pub fn new(pool_id: impl Into<String>, user: UserId) -> Self {
        Self {
            pool_id: pool_id.into(),
            user,
        }
    }
}

impl Request for GetPlayerRank {
    type Data = ();
    type Response = RankInfo;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/api/player_rank/{}/{}", self.pool_id, self.user).into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Empty
    }
}
