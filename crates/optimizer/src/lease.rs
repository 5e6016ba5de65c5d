//! Per-campaign leases so no two passes act on one campaign at once.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::time::{Duration as StdDuration, Instant};
use tracing::debug;
use uuid::Uuid;

use crate::error::Result;

/// Opaque proof of lease ownership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseToken(String);

impl LeaseToken {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Mutual exclusion for campaign passes.
#[async_trait]
pub trait CampaignLease: Send + Sync {
    /// `None` when another holder owns a live lease.
    async fn try_acquire(&self, campaign_id: Uuid, ttl: StdDuration) -> Result<Option<LeaseToken>>;

    /// Release only if `token` still owns the lease.
    async fn release(&self, campaign_id: Uuid, token: &LeaseToken) -> Result<()>;
}

/// Process-local leases, for a single worker or tests.
#[derive(Default)]
pub struct MemoryLease {
    held: DashMap<Uuid, (LeaseToken, Instant)>,
}

impl MemoryLease {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_held(&self, campaign_id: Uuid) -> bool {
        self.held
            .get(&campaign_id)
            .map(|entry| entry.1 > Instant::now())
            .unwrap_or(false)
    }
}

#[async_trait]
impl CampaignLease for MemoryLease {
    async fn try_acquire(&self, campaign_id: Uuid, ttl: StdDuration) -> Result<Option<LeaseToken>> {
        let now = Instant::now();
        let token = LeaseToken::generate();

        match self.held.entry(campaign_id) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().1 > now {
                    return Ok(None);
                }
                debug!(campaign_id = %campaign_id, "Taking over expired lease");
                occupied.insert((token.clone(), now + ttl));
            }
            Entry::Vacant(vacant) => {
                vacant.insert((token.clone(), now + ttl));
            }
        }

        Ok(Some(token))
    }

    async fn release(&self, campaign_id: Uuid, token: &LeaseToken) -> Result<()> {
        self.held.remove_if(&campaign_id, |_, (held, _)| held == token);
        Ok(())
    }
}

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Leases shared across workers through Redis.
pub struct RedisLease {
    conn: redis::aio::ConnectionManager,
}

impl RedisLease {
    pub fn new(conn: redis::aio::ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(campaign_core::Error::from)?;
        let conn = redis::aio::ConnectionManager::new(client)
            .await
            .map_err(campaign_core::Error::from)?;
        Ok(Self::new(conn))
    }

    pub fn key(campaign_id: Uuid) -> String {
        format!("adpilot:lease:campaign:{}", campaign_id)
    }
}

#[async_trait]
impl CampaignLease for RedisLease {
    async fn try_acquire(&self, campaign_id: Uuid, ttl: StdDuration) -> Result<Option<LeaseToken>> {
        let token = LeaseToken::generate();
        let mut conn = self.conn.clone();

        let acquired: Option<String> = redis::cmd("SET")
            .arg(Self::key(campaign_id))
            .arg(token.as_str())
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(campaign_core::Error::from)?;

        Ok(acquired.map(|_| token))
    }

    async fn release(&self, campaign_id: Uuid, token: &LeaseToken) -> Result<()> {
        let mut conn = self.conn.clone();

        let removed: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(Self::key(campaign_id))
            .arg(token.as_str())
            .invoke_async(&mut conn)
            .await
            .map_err(campaign_core::Error::from)?;

        if removed == 0 {
            debug!(campaign_id = %campaign_id, "Lease already expired or taken over");
        }
        Ok(())
    }
}
