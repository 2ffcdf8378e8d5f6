use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use tower_api_client::{Request, RequestData};

// Common

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolInfo {
    #[serde(rename = "_id")]
    pub id: String,
    pub shown_name: String,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub playlist_url: Option<String>,
}

// Requests

#[derive(Debug, Clone)]
pub struct GetPoolInfo {
    pool_id: String,
}

impl GetPoolInfo {
    pub fn new(pool_id: impl Into<String>) -> Self {
        Self {
            pool_id: pool_id.into(),
        }
    }
}

impl Request for GetPoolInfo {
    type Data = ();
    type Response = PoolInfo;

    fn endpoint(&self) -> Cow<'_, str> {
        format!("/api/ranked_list/{}", self.pool_id).into()
    }

    fn data(&self) -> RequestData<&Self::Data> {
        RequestData::Empty
    }
}
