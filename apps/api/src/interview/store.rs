//! In-memory session registry.
//!
//! Each session sits behind its own async mutex. Mutating requests use `acquire`,
//! which fails fast with `Busy` while another request holds the session, so two
//! model calls for one session can never overlap.
//!
//! Sessions nobody has touched for the configured idle timeout are dropped by
//! a background sweep, so abandoned sessions do not pile up.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use crate::interview::session::InterviewSession;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Session {0} not found")]
    NotFound(Uuid),

    #[error("Session {0} is busy with another request")]
    Busy(Uuid),
}

type SharedSession = Arc<Mutex<InterviewSession>>;

struct Entry {
    session: SharedSession,
    last_used: StdMutex<Instant>,
}

impl Entry {
    fn new(session: InterviewSession) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            last_used: StdMutex::new(Instant::now()),
        }
    }

    fn touch(&self) {
        *self.last_used.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    /// Idle means untouched for `max_idle` and not held by any request.
    fn is_idle(&self, now: Instant, max_idle: Duration) -> bool {
        let last_used = *self.last_used.lock().unwrap_or_else(PoisonError::into_inner);
        now.duration_since(last_used) >= max_idle && self.session.try_lock().is_ok()
    }
}

#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: InterviewSession) -> Uuid {
        let id = session.id();
        let mut sessions = self.sessions.write().await;
        sessions.insert(id, Entry::new(session));
        info!("Session {id} created ({} active)", sessions.len());
        id
    }

    /// Drops the session. A request still holding it finishes on its own copy.
    pub async fn remove(&self, id: Uuid) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        match sessions.remove(&id) {
            Some(_) => {
                info!("Session {id} discarded ({} active)", sessions.len());
                Ok(())
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Exclusive access for a mutating operation; `Busy` if the session is in use.
    pub async fn acquire(&self, id: Uuid) -> Result<OwnedMutexGuard<InterviewSession>, StoreError> {
        self.shared(id)
            .await?
            .try_lock_owned()
            .map_err(|_| StoreError::Busy(id))
    }

    /// Waits for the session to be free. Used for read-only snapshots.
    pub async fn wait(&self, id: Uuid) -> Result<OwnedMutexGuard<InterviewSession>, StoreError> {
        Ok(self.shared(id).await?.lock_owned().await)
    }

    /// Drops every idle session. Returns how many were dropped.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let idle = entry.is_idle(now, max_idle);
            if idle {
                debug!("Session {id} evicted after {}s idle", max_idle.as_secs());
            }
            !idle
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("Evicted {evicted} idle sessions ({} active)", sessions.len());
        }
        evicted
    }

    /// Sweeps idle sessions every `every` until the runtime shuts down.
    pub fn spawn_eviction(&self, max_idle: Duration, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.evict_idle(max_idle).await;
            }
        })
    }

    async fn shared(&self, id: Uuid) -> Result<SharedSession, StoreError> {
        let sessions = self.sessions.read().await;
        let entry = sessions.get(&id).ok_or(StoreError::NotFound(id))?;
        entry.touch();
        Ok(entry.session.clone())
    }
}
