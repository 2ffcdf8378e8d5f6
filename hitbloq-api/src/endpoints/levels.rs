use super::LevelKey;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tower_api_client::{Request, RequestData};

// Common

/// Ranking metadata of a level: the pools it belongs to, in the order the
/// service lists them, with the star rating it has in each.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelInfo {
    #[serde(rename = "star_rating", default)]
    pub pools: IndexMap<String, f64>,
}

impl LevelInfo {
    pub fn is_ranked(&self) -> bool {
        !self.pools.is_empty()
    }
}

// Requests

#[derive(Debug, Clone)]
pub struct GetLevelInfo {
    level: LevelKey,
}

impl GetLevelInfo {
    pub fn new(level: LevelKey) -> Self {
        Self { level }
    }
}

impl Request for GetLevelInfo {
    type Data = ();
    type Response = LevelInfo;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/api/leaderboard/{}/info", self.level).into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Empty
    }
}
