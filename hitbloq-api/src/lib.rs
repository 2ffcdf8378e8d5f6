pub mod endpoints;
mod error;
mod macros;
pub mod repositories;

pub use crate::error::HitbloqApiError;
use repositories::*;
use tower_api_client::{Client as ApiClient, Request as ApiRequest};

pub const DEFAULT_BASE_URL: &str = "https://hitbloq.com";

pub struct Client {
    inner: ApiClient,
}

impl Client {
    pub fn new(base_url: &str) -> Self {
        Self {
            inner: ApiClient::new(base_url),
        }
    }

    pub async fn send<R>(&self, request: R) -> Result<R::Response, HitbloqApiError>
    where
        R: ApiRequest,
    {
        self.inner.send(request).await.map_err(From::from)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

pub struct Request;

impl Request {
    pub fn events() -> EventRepository {
        EventRepository::new()
    }

    pub fn leaderboards() -> LeaderboardRepository {
        LeaderboardRepository::new()
    }

    pub fn levels() -> LevelRepository {
        LevelRepository::new()
    }

    pub fn pools() -> PoolRepository {
        PoolRepository::new()
    }

    pub fn ranks() -> RankRepository {
        RankRepository::new()
    }
}
