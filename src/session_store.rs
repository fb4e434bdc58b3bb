//! # Session Store Module
//!
//! In-memory dialogue storage that remembers when each chat was last active,
//! so idle conversations can be dropped by a periodic cleanup task.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::{Duration, Instant};
use teloxide::dispatching::dialogue::Storage;
use teloxide::types::ChatId;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug)]
struct SessionEntry<D> {
    state: D,
    last_activity: Instant,
}

/// Dialogue storage with per-chat idle expiry
#[derive(Debug)]
pub struct ExpiringStorage<D> {
    entries: Mutex<HashMap<ChatId, SessionEntry<D>>>,
    ttl: Duration,
}

impl<D> ExpiringStorage<D> {
    #[must_use]
    pub fn new(ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        })
    }

    /// Number of chats with a stored state, expired ones included
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop every state idle for longer than the TTL as of `now`
    pub async fn purge_expired_at(&self, now: Instant) -> usize {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.last_activity) <= self.ttl);
        before - entries.len()
    }

    /// Drop every state idle for longer than the TTL
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now()).await
    }
}

impl<D> ExpiringStorage<D>
where
    D: Send + 'static,
{
    /// Run [`purge_expired`](Self::purge_expired) every `interval`
    pub fn spawn_cleanup(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        info!(
            interval_secs = interval.as_secs(),
            ttl_secs = self.ttl.as_secs(),
            "Starting conversation state cleanup"
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = self.purge_expired().await;
                if removed > 0 {
                    info!(removed, "Dropped idle conversation states");
                } else {
                    debug!("No idle conversation states to drop");
                }
            }
        })
    }
}

impl<D> Storage<D> for ExpiringStorage<D>
where
    D: Clone + Send + 'static,
{
    type Error = Infallible;

    fn remove_dialogue(
        self: Arc<Self>,
        chat_id: ChatId,
    ) -> BoxFuture<'static, Result<(), Self::Error>>
    where
        D: Send + 'static,
    {
        Box::pin(async move {
            self.entries.lock().await.remove(&chat_id);
            Ok(())
        })
    }

    fn update_dialogue(
        self: Arc<Self>,
        chat_id: ChatId,
        dialogue: D,
    ) -> BoxFuture<'static, Result<(), Self::Error>>
    where
        D: Send + 'static,
    {
        Box::pin(async move {
            self.entries.lock().await.insert(
                chat_id,
                SessionEntry {
                    state: dialogue,
                    last_activity: Instant::now(),
                },
            );
            Ok(())
        })
    }

    fn get_dialogue(self: Arc<Self>, chat_id: ChatId) -> BoxFuture<'static, Result<Option<D>, Self::Error>> {
        Box::pin(async move {
            let entries = self.entries.lock().await;
            let state = entries
                .get(&chat_id)
                .filter(|entry| entry.last_activity.elapsed() <= self.ttl)
                .map(|entry| entry.state.clone());
            Ok(state)
        })
    }
}
