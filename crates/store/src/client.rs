//! Redis-backed state store.
//!
//! Every operation there wraps its Redis call in a broad try/except that
//! logs and returns a falsy/empty value on failure; here that's expressed
//! as `Result<T>` with the failure surfaced to the caller instead of
//! swallowed, since a background worker should react to store failures
//! rather than silently continue.

use orc_domain::conversation::ConversationRecord;
use orc_domain::error::{Error, Result};
use orc_domain::topic::Topic;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

const ACTIVE_SET_KEY: &str = "active_conversations";
const LOCK_PREFIX: &str = "lock:conversation:";
const STATE_PREFIX: &str = "conversation:";
const DEFAULT_LOCK_TIMEOUT_SECONDS: u64 = 30;

pub struct RedisStore {
    conn: ConnectionManager,
    conversation_ttl_seconds: u64,
}

impl RedisStore {
    pub async fn connect(url: &str, conversation_ttl_seconds: u64) -> Result<Self> {
        let client = redis::Client::open(url).map_err(|e| Error::Store(e.to_string()))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(Self {
            conn,
            conversation_ttl_seconds,
        })
    }

    fn state_key(conversation_id: &str) -> String {
        format!("{STATE_PREFIX}{conversation_id}")
    }

    fn lock_key(conversation_id: &str) -> String {
        format!("{LOCK_PREFIX}{conversation_id}")
    }

    pub async fn save_conversation(&self, record: &ConversationRecord) -> Result<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(record)?;
        let key = Self::state_key(&record.conversation_id);
        let _: () = conn
            .set_ex(&key, json, self.conversation_ttl_seconds)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let _: () = conn
            .sadd(ACTIVE_SET_KEY, &record.conversation_id)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    pub async fn get_conversation(&self, conversation_id: &str) -> Result<Option<ConversationRecord>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(Self::state_key(conversation_id))
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    /// Read-merge-write. The merge is a shallow field replacement, not a
    /// deep merge.
    pub async fn update_conversation(
        &self,
        conversation_id: &str,
        apply: impl FnOnce(&mut ConversationRecord),
    ) -> Result<bool> {
        let existing = self.get_conversation(conversation_id).await?;
        let mut record = match existing {
            Some(r) => r,
            None => return Ok(false),
        };
        apply(&mut record);
        self.save_conversation(&record).await?;
        Ok(true)
    }

    pub async fn delete_conversation(&self, conversation_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(Self::state_key(conversation_id))
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let _: () = conn
            .srem(ACTIVE_SET_KEY, conversation_id)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    pub async fn list_active(&self) -> Result<Vec<String>> {
        let mut conn = self.conn.clone();
        conn.smembers(ACTIVE_SET_KEY)
            .await
            .map_err(|e| Error::Store(e.to_string()))
    }

    /// `SET key "locked" NX EX timeout`. Default timeout is 30 seconds.
    pub async fn acquire_lock(&self, conversation_id: &str, timeout_seconds: Option<u64>) -> Result<bool> {
        let mut conn = self.conn.clone();
        let timeout = timeout_seconds.unwrap_or(DEFAULT_LOCK_TIMEOUT_SECONDS);
        let result: Option<String> = redis::cmd("SET")
            .arg(Self::lock_key(conversation_id))
            .arg("locked")
            .arg("NX")
            .arg("EX")
            .arg(timeout)
            .query_async(&mut conn)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(result.is_some())
    }

    /// Unconditional delete — best-effort, no fencing token. See
    /// DESIGN.md for the fencing-token upgrade left as an Open Question.
    pub async fn release_lock(&self, conversation_id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = conn
            .del(Self::lock_key(conversation_id))
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(deleted > 0)
    }

    pub async fn pop_topic(&self, queue_key: &str) -> Result<Option<Topic>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .lpop(queue_key, None)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    /// Ambient counterpart to `pop_topic` for tests and local seeding —
    /// production topics arrive from the external ingestion service.
    pub async fn push_topic(&self, queue_key: &str, topic: &Topic) -> Result<()> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(topic)?;
        let _: () = conn
            .rpush(queue_key, json)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(())
    }

    pub async fn topic_queue_length(&self, queue_key: &str) -> Result<i64> {
        let mut conn = self.conn.clone();
        conn.llen(queue_key).await.map_err(|e| Error::Store(e.to_string()))
    }

    /// Case-insensitive substring match on topic, exact match on status.
    pub async fn search_conversations(
        &self,
        query: &str,
        status: Option<&str>,
    ) -> Result<Vec<ConversationRecord>> {
        let ids = self.list_active().await?;
        let query_lower = query.to_lowercase();
        let mut matches = Vec::new();
        for id in ids {
            if let Some(record) = self.get_conversation(&id).await? {
                let topic_matches = record.topic.to_lowercase().contains(&query_lower);
                let status_matches = status.is_none_or(|s| {
                    serde_json::to_value(record.status)
                        .ok()
                        .and_then(|v| v.as_str().map(str::to_string))
                        .as_deref()
                        == Some(s)
                });
                if topic_matches && status_matches {
                    matches.push(record);
                }
            }
        }
        Ok(matches)
    }

    /// Removes active-set members whose backing key has already expired.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let mut conn = self.conn.clone();
        let ids = self.list_active().await?;
        let mut removed = 0u64;
        for id in ids {
            let exists: bool = conn
                .exists(Self::state_key(&id))
                .await
                .map_err(|e| Error::Store(e.to_string()))?;
            if !exists {
                let _: () = conn
                    .srem(ACTIVE_SET_KEY, &id)
                    .await
                    .map_err(|e| Error::Store(e.to_string()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
