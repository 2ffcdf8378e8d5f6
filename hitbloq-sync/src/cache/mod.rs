use hitbloq_api::endpoints::pools::PoolInfo;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

#[derive(Debug)]
pub enum CacheError {
    Io(std::io::Error),
    Serialization(serde_json::Error),
    MissingDirectory,
}

impl std::fmt::Display for CacheError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheError::Io(e) => write!(f, "IO error: {}", e),
            CacheError::Serialization(e) => write!(f, "Serialization error: {}", e),
            CacheError::MissingDirectory => write!(f, "No cache directory on this platform"),
        }
    }
}

impl std::error::Error for CacheError {}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        CacheError::Io(err)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        CacheError::Serialization(err)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedPool {
    pub pool: PoolInfo,
    pub cached_at: i64, // Unix timestamp
}

impl CachedPool {
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        let age = chrono::Utc::now().timestamp() - self.cached_at;
        age >= 0 && (age as u64) < ttl.as_secs()
    }
}

/// Async cache layer using tokio::fs for non-blocking file I/O
#[derive(Debug, Clone)]
pub struct Cache {
    cache_dir: PathBuf,
}

impl Cache {
    pub async fn new() -> Result<Self, CacheError> {
        let cache_dir = Self::get_cache_dir()?;
        Self::with_dir(cache_dir).await
    }

    pub async fn with_dir(cache_dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir).await?;

        Ok(Self { cache_dir })
    }

    fn get_cache_dir() -> Result<PathBuf, CacheError> {
        let cache_dir = hitbloq_config::cache_dir()
            .map_err(|_| CacheError::MissingDirectory)?
            .join("pools");

        Ok(cache_dir)
    }

    fn pool_path(&self, pool_id: &str) -> PathBuf {
        let name: String = pool_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.cache_dir.join(format!("pool_{}.json", name))
    }

    // Pool info cache
    pub async fn get_pool_info(&self, pool_id: &str) -> Result<Option<CachedPool>, CacheError> {
        let path = self.pool_path(pool_id);
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read_to_string(&path).await?;
        let cached: CachedPool = serde_json::from_str(&data)?;
        Ok(Some(cached))
    }

    pub async fn set_pool_info(&self, pool: &PoolInfo) -> Result<(), CacheError> {
        let cached = CachedPool {
            pool: pool.clone(),
            cached_at: chrono::Utc::now().timestamp(),
        };

        let path = self.pool_path(&pool.id);
        let json = serde_json::to_string_pretty(&cached)?;
        fs::write(&path, json).await?;
        Ok(())
    }
}
