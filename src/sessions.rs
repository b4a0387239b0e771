//! Single-slot refresh session per user.
//!
//! Storing a new token for a user overwrites the previous one, which revokes
//! it even though it still verifies cryptographically.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::Context;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub fn refresh_key(user_id: Uuid) -> String {
    format!("refresh:{user_id}")
}

#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// Unconditionally replaces the user's entry; it expires after `ttl`.
    async fn store(&self, user_id: Uuid, token: &str, ttl: Duration) -> AppResult<()>;

    /// True iff a live entry exists and equals `token` byte for byte.
    async fn matches(&self, user_id: Uuid, token: &str) -> AppResult<bool>;

    async fn delete(&self, user_id: Uuid) -> AppResult<()>;
}

/// Redis-backed registry: `SET refresh:<id> <token> EX <ttl>`.
#[derive(Clone)]
pub struct RedisSessions {
    conn: ConnectionManager,
}

impl RedisSessions {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(url).context("parse REDIS_URL")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("connect to redis")?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl SessionRegistry for RedisSessions {
    async fn store(&self, user_id: Uuid, token: &str, ttl: Duration) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1);
        redis::cmd("SET")
            .arg(refresh_key(user_id))
            .arg(token)
            .arg("EX")
            .arg(seconds)
            .query_async::<_, ()>(&mut conn)
            .await?;
        debug!(user_id = %user_id, ttl_secs = seconds, "refresh session stored");
        Ok(())
    }

    async fn matches(&self, user_id: Uuid, token: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let stored: Option<String> = conn.get(refresh_key(user_id)).await?;
        Ok(stored.as_deref() == Some(token))
    }

    async fn delete(&self, user_id: Uuid) -> AppResult<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(refresh_key(user_id)).await?;
        debug!(user_id = %user_id, "refresh session deleted");
        Ok(())
    }
}

/// In-process registry; expired entries never match and are dropped lazily.
#[derive(Clone, Default)]
pub struct MemorySessions {
    entries: Arc<RwLock<HashMap<Uuid, (String, Instant)>>>,
}

impl MemorySessions {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRegistry for MemorySessions {
    async fn store(&self, user_id: Uuid, token: &str, ttl: Duration) -> AppResult<()> {
        let deadline = Instant::now()
            .checked_add(ttl)
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("session ttl {ttl:?} out of range")))?;
        self.entries
            .write()
            .await
            .insert(user_id, (token.to_string(), deadline));
        Ok(())
    }

    async fn matches(&self, user_id: Uuid, token: &str) -> AppResult<bool> {
        let mut entries = self.entries.write().await;
        match entries.get(&user_id) {
            None => return Ok(false),
            Some((stored, deadline)) if *deadline > Instant::now() => {
                return Ok(stored.as_bytes() == token.as_bytes());
            }
            Some(_) => {}
        }
        entries.remove(&user_id);
        Ok(false)
    }

    async fn delete(&self, user_id: Uuid) -> AppResult<()> {
        self.entries.write().await.remove(&user_id);
        Ok(())
    }
}
