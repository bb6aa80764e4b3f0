use std::collections::VecDeque;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::timeout;

use crate::error::Error;
use crate::session::{SessionFactory, SessionHandle};

/// SessionPool hands out server sessions under a concurrency bound.
///
/// Admission is a counting semaphore sized to `max_concurrent_transactions`;
/// the idle queue is tracked separately so that a fresh-session creation
/// path can hold a permit while no idle session exists. A capacity of `0`
/// means no explicit limit: admission is then governed by whatever the
/// transport itself enforces.
#[derive(Clone)]
pub struct SessionPool {
    inner: Arc<PoolCore>,
}

struct PoolCore {
    factory: SessionFactory,
    idle: Mutex<VecDeque<SessionHandle>>,
    permits: Arc<Semaphore>,
    closed: AtomicBool,
    acquire_timeout: Duration,
}

impl SessionPool {
    pub fn new(
        factory: SessionFactory,
        max_concurrent_transactions: usize,
        acquire_timeout: Duration,
    ) -> Self {
        let permits = if max_concurrent_transactions == 0 {
            Semaphore::MAX_PERMITS
        } else {
            max_concurrent_transactions
        };
        SessionPool {
            inner: Arc::new(PoolCore {
                factory,
                idle: Mutex::new(VecDeque::new()),
                permits: Arc::new(Semaphore::new(permits)),
                closed: AtomicBool::new(false),
                acquire_timeout,
            }),
        }
    }

    /// acquire waits for a permit, then hands out an idle session or opens
    /// a fresh one through the factory. Saturation fails fast with
    /// [Error::PoolTimeout] instead of blocking indefinitely.
    pub async fn acquire(&self) -> Result<ManagedSession, Error> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(Error::Closed);
        }
        let permit = match timeout(
            self.inner.acquire_timeout,
            Arc::clone(&self.inner.permits).acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Err(Error::Closed),
            Err(_) => {
                tracing::debug!(
                    timeout = ?self.inner.acquire_timeout,
                    "timeout acquiring session permit"
                );
                return Err(Error::PoolTimeout(self.inner.acquire_timeout));
            }
        };

        let idle = { self.inner.idle.lock().pop_front() };
        let session = match idle {
            Some(session) => session,
            None => match self.inner.factory.open().await {
                Ok(session) => session,
                Err(e) => {
                    // Permit released on drop; the caller classifies the
                    // creation failure for retry.
                    drop(permit);
                    return Err(e);
                }
            },
        };
        Ok(ManagedSession {
            pool: self.clone(),
            session: Some(session),
            _permit: permit,
        })
    }

    /// close drains and ends every idle session. Checked-out sessions are
    /// not force-closed; they are discarded when released. Idempotent.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.permits.close();
        let drained: Vec<SessionHandle> = { self.inner.idle.lock().drain(..).collect() };
        tracing::debug!(count = drained.len(), "closing pool, ending idle sessions");
        for mut session in drained {
            session.end().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().len()
    }

    pub fn available_permits(&self) -> usize {
        self.inner.permits.available_permits()
    }

    fn recycle(&self, session: SessionHandle) {
        if session.is_alive() && !self.inner.closed.load(Ordering::SeqCst) {
            tracing::trace!(session_id = %session.id(), "session returned to pool");
            self.inner.idle.lock().push_back(session);
        } else {
            // Dead sessions no longer exist server-side; sessions released
            // after close are cleaned up by session expiry.
            tracing::trace!(session_id = %session.id(), "session discarded");
        }
    }
}

/// ManagedSession is a checked-out session. The permit is held for exactly
/// as long as the guard lives; dropping the guard returns a live session to
/// the pool and discards a dead one.
pub struct ManagedSession {
    pool: SessionPool,
    session: Option<SessionHandle>,
    _permit: OwnedSemaphorePermit,
}

impl std::fmt::Debug for ManagedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedSession")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl ManagedSession {
    /// discard ends the session (best-effort, skipped when it is already
    /// dead) and releases the permit without returning it to the pool.
    pub async fn discard(mut self) {
        if let Some(mut session) = self.session.take() {
            session.end().await;
        }
    }
}

impl Drop for ManagedSession {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.recycle(session);
        }
    }
}

impl Deref for ManagedSession {
    type Target = SessionHandle;

    fn deref(&self) -> &Self::Target {
        self.session.as_ref().unwrap()
    }
}

impl DerefMut for ManagedSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_mut().unwrap()
    }
}
