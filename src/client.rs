use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::error::{AttemptError, Error};
use crate::retry::RetryPolicy;
use crate::session::SessionFactory;
use crate::session_pool::{ManagedSession, SessionPool};
use crate::statement::Statement;
use crate::transaction::{Transaction, TransactionState};
use crate::transport::Transport;

/// Statement used by [Client::list_table_names].
pub const ACTIVE_TABLES_STATEMENT: &str =
    "SELECT VALUE name FROM information_schema.user_tables WHERE status = 'ACTIVE'";

/// Default timeout for acquiring a session from the pool. Kept short so
/// that a saturated pool surfaces an error immediately instead of hanging.
pub const DEFAULT_SESSION_ACQUIRE_TIMEOUT: Duration = Duration::from_millis(1);

/// ClientConfig has configurations for the client.
#[derive(Clone)]
pub struct ClientConfig {
    /// Maximum number of concurrently checked-out sessions, and therefore
    /// of concurrently open transactions. `0` means no explicit limit
    /// beyond what the transport enforces.
    pub max_concurrent_transactions: usize,

    /// Policy applied by [Client::execute] when the caller does not
    /// provide one.
    pub retry_policy: RetryPolicy,

    /// Maximum wait for a pool permit before failing with
    /// [Error::PoolTimeout].
    pub session_acquire_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            max_concurrent_transactions: 0,
            retry_policy: RetryPolicy::default(),
            session_acquire_timeout: DEFAULT_SESSION_ACQUIRE_TIMEOUT,
        }
    }
}

/// Client executes PartiQL statements against one ledger inside ACID
/// transactions, transparently handling session lifecycle, optimistic
/// concurrency retries, session expiry and backoff.
///
/// A client is safe to use from many tasks concurrently, except for
/// `close`.
pub struct Client {
    pool: SessionPool,
    retry_policy: RetryPolicy,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

impl Client {
    /// new creates a client for the named ledger on top of the given
    /// transport.
    pub fn new(
        transport: Arc<dyn Transport>,
        ledger_name: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self, Error> {
        let ledger_name = ledger_name.into();
        if ledger_name.is_empty() {
            return Err(Error::InvalidConfig("ledger name must not be empty"));
        }
        let factory = SessionFactory::new(transport, ledger_name);
        let pool = SessionPool::new(
            factory,
            config.max_concurrent_transactions,
            config.session_acquire_timeout,
        );
        Ok(Client {
            pool,
            retry_policy: config.retry_policy,
        })
    }

    /// execute runs the lambda inside a transaction and commits it when the
    /// lambda returns cleanly, retrying per the client's default policy.
    ///
    /// The lambda may be invoked more than once and must not keep state
    /// between invocations, nor retain the transaction handle after
    /// returning. Inside the lambda, `Transaction::execute` runs statements
    /// and `Transaction::abort` abandons the transaction; committing is the
    /// driver's job alone.
    pub async fn execute<T, F, Fut>(&self, f: F) -> Result<T, Error>
    where
        F: Fn(Arc<Mutex<Transaction>>) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        self.execute_with_options(f, None, None).await
    }

    /// execute_with_policy is [Client::execute] under the caller's policy.
    pub async fn execute_with_policy<T, F, Fut>(
        &self,
        f: F,
        policy: RetryPolicy,
    ) -> Result<T, Error>
    where
        F: Fn(Arc<Mutex<Transaction>>) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        self.execute_with_options(f, Some(policy), None).await
    }

    /// execute_with_options additionally accepts a cancellation token.
    /// Cancellation at any suspension point releases the permit, settles
    /// the session and surfaces [Error::Cancelled]; cancellation while the
    /// commit command is in flight surfaces [Error::CommitIndeterminate]
    /// because the transaction may have committed server-side.
    pub async fn execute_with_options<T, F, Fut>(
        &self,
        f: F,
        policy: Option<RetryPolicy>,
        cancel: Option<CancellationToken>,
    ) -> Result<T, Error>
    where
        F: Fn(Arc<Mutex<Transaction>>) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let policy = policy.unwrap_or_else(|| self.retry_policy.clone());
        let cancel = cancel.unwrap_or_default();
        let mut session: Option<ManagedSession> = None;
        let mut retries_used: u32 = 0;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match self.run_attempt(&f, session.take(), &cancel).await {
                Ok(value) => return Ok(value),
                Err((envelope, returned_session)) => {
                    session = returned_session;
                    if !envelope.retriable {
                        return Err(envelope.cause);
                    }
                    // A pooled session may have expired silently; the first
                    // attempt's invalid-session failure gets one retry that
                    // does not count against the caller's budget.
                    let free_retry = attempt == 1 && envelope.cause.is_invalid_session();
                    if !free_retry {
                        if retries_used >= policy.max_retries() {
                            return Err(envelope.cause);
                        }
                        retries_used += 1;
                    }
                    let delay = policy.delay(attempt, &envelope.cause);
                    tracing::debug!(
                        attempt,
                        transaction_id = ?envelope.transaction_id,
                        session_alive = envelope.session_alive,
                        delay = ?delay,
                        error = %envelope.cause,
                        "retrying transaction"
                    );
                    let slept = tokio::select! {
                        _ = cancel.cancelled() => false,
                        _ = tokio::time::sleep(delay) => true,
                    };
                    if !slept {
                        // a live session flows back to the pool on drop
                        return Err(Error::Cancelled);
                    }
                }
            }
        }
    }

    /// list_table_names returns the names of all tables currently active in
    /// the ledger, in server-defined order.
    pub async fn list_table_names(&self) -> Result<Vec<String>, Error> {
        let result = self
            .execute(|tx| async move {
                let mut guard = tx.lock().await;
                let stream = guard.execute(Statement::new(ACTIVE_TABLES_STATEMENT)).await?;
                stream.buffer().await
            })
            .await?;
        result
            .into_iter()
            .map(|document| {
                document
                    .as_text()
                    .map(str::to_owned)
                    .ok_or(Error::UnexpectedResponse {
                        expected: "text document",
                    })
            })
            .collect()
    }

    /// close ends every idle session and rejects further work. Idempotent;
    /// sessions checked out by in-flight calls are discarded when those
    /// calls finish.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    pub fn idle_session_count(&self) -> usize {
        self.pool.idle_count()
    }

    pub fn available_permits(&self) -> usize {
        self.pool.available_permits()
    }

    /// run_attempt performs one transaction attempt. On failure it returns
    /// the classified envelope together with the session when it is worth
    /// keeping for the next attempt.
    async fn run_attempt<T, F, Fut>(
        &self,
        f: &F,
        session: Option<ManagedSession>,
        cancel: &CancellationToken,
    ) -> Result<T, (AttemptError, Option<ManagedSession>)>
    where
        F: Fn(Arc<Mutex<Transaction>>) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let session = match session {
            Some(session) => session,
            None => {
                let acquired = tokio::select! {
                    _ = cancel.cancelled() => {
                        return Err((AttemptError::classify(None, Error::Cancelled), None));
                    }
                    r = self.pool.acquire() => r,
                };
                match acquired {
                    Ok(session) => session,
                    Err(e) => return Err((AttemptError::classify(None, e), None)),
                }
            }
        };

        let begin = tokio::select! {
            _ = cancel.cancelled() => {
                // dropping the begin future settles the session by liveness
                return Err((AttemptError::classify(None, Error::Cancelled), None));
            }
            r = Transaction::begin(session) => r,
        };
        let transaction = match begin {
            Ok(transaction) => transaction,
            Err((e, session)) => {
                let envelope = AttemptError::classify(None, e);
                return Err((envelope, Self::settle(session).await));
            }
        };

        let transaction_id = transaction.id().to_string();
        let tx = Arc::new(Mutex::new(transaction));

        let lambda_result = {
            let fut = f(Arc::clone(&tx));
            tokio::select! {
                _ = cancel.cancelled() => None,
                r = fut => Some(r),
            }
        };
        let lambda_result = match lambda_result {
            Some(result) => result,
            None => {
                let mut guard = tx.lock().await;
                if guard.session_alive()
                    && matches!(
                        guard.state(),
                        TransactionState::Open | TransactionState::Errored
                    )
                {
                    let _ = guard.abort().await;
                }
                let session = guard.take_session();
                drop(guard);
                drop(session);
                return Err((
                    AttemptError::classify(Some(transaction_id), Error::Cancelled),
                    None,
                ));
            }
        };

        let mut guard = tx.lock().await;

        // An explicit abort inside the lambda is terminal no matter what
        // the lambda returned; the transaction must not be committed.
        if guard.state() == TransactionState::Aborted {
            let session = guard.take_session();
            drop(guard);
            let settled = match session {
                Some(session) => Self::settle(session).await,
                None => None,
            };
            return Err((
                AttemptError::classify(Some(transaction_id), Error::Aborted),
                settled,
            ));
        }

        match lambda_result {
            Ok(value) => {
                let commit = {
                    tokio::select! {
                        _ = cancel.cancelled() => None,
                        r = guard.commit() => Some(r),
                    }
                };
                match commit {
                    Some(Ok(())) => {
                        let session = guard.take_session();
                        drop(guard);
                        drop(session);
                        Ok(value)
                    }
                    Some(Err(e)) => Err(Self::fail_attempt(guard, transaction_id, e).await),
                    None => {
                        let session = guard.take_session();
                        drop(guard);
                        if let Some(session) = session {
                            session.discard().await;
                        }
                        let cause = Error::CommitIndeterminate {
                            transaction_id: transaction_id.clone(),
                        };
                        Err((AttemptError::classify(Some(transaction_id), cause), None))
                    }
                }
            }
            Err(e) => Err(Self::fail_attempt(guard, transaction_id, e).await),
        }
    }

    /// fail_attempt classifies the error, aborts best-effort while the
    /// session is still usable, and settles the session for the retry loop.
    async fn fail_attempt(
        mut guard: tokio::sync::MutexGuard<'_, Transaction>,
        transaction_id: String,
        cause: Error,
    ) -> (AttemptError, Option<ManagedSession>) {
        let envelope = AttemptError::classify(Some(transaction_id), cause);
        if guard.session_alive()
            && matches!(
                guard.state(),
                TransactionState::Open | TransactionState::Errored
            )
        {
            let _ = guard.abort().await;
        }
        let session = guard.take_session();
        drop(guard);
        let settled = match session {
            Some(session) => Self::settle(session).await,
            None => None,
        };
        (envelope, settled)
    }

    /// settle keeps a live session for reuse and discards a dead one,
    /// releasing its permit.
    async fn settle(session: ManagedSession) -> Option<ManagedSession> {
        if session.is_alive() {
            Some(session)
        } else {
            session.discard().await;
            None
        }
    }
}
