//! A synchronous facade over the asynchronous client.
//!
//! The blocking client owns its own multi-thread runtime and drives the
//! same orchestrator as the asynchronous [crate::client::Client]; only the
//! waiting primitive differs. Statement results are returned fully
//! buffered, since a lazy stream has no meaningful lifetime across the
//! sync/async boundary.

use std::sync::Arc;

use tokio::runtime::{Handle, Runtime};

use crate::client::ClientConfig;
use crate::error::Error;
use crate::reader::BufferedResult;
use crate::retry::RetryPolicy;
use crate::statement::Statement;
use crate::transport::Transport;

/// Client is a blocking ledger client. See [crate::client::Client] for the
/// execution semantics; they are identical.
pub struct Client {
    inner: Arc<crate::client::Client>,
    runtime: Runtime,
}

impl Client {
    pub fn new(
        transport: Arc<dyn Transport>,
        ledger_name: impl Into<String>,
        config: ClientConfig,
    ) -> Result<Self, Error> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .map_err(Error::Runtime)?;
        let inner = crate::client::Client::new(transport, ledger_name, config)?;
        Ok(Client {
            inner: Arc::new(inner),
            runtime,
        })
    }

    /// execute runs the closure inside a transaction and commits when it
    /// returns cleanly, retrying per the client's default policy. The
    /// closure may be invoked multiple times and must not keep state
    /// between invocations.
    pub fn execute<T, F>(&self, f: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: Fn(&mut TransactionView) -> Result<T, Error> + Send + Sync + 'static,
    {
        self.execute_with_policy(f, None)
    }

    pub fn execute_with_policy<T, F>(&self, f: F, policy: Option<RetryPolicy>) -> Result<T, Error>
    where
        T: Send + 'static,
        F: Fn(&mut TransactionView) -> Result<T, Error> + Send + Sync + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let handle = self.runtime.handle().clone();
        self.runtime.block_on(async move {
            // The lambda runs on a worker thread so it may block on
            // transaction commands through the runtime handle.
            tokio::spawn(async move {
                let f = Arc::new(f);
                inner
                    .execute_with_options(
                        move |tx| {
                            let f = Arc::clone(&f);
                            let handle = handle.clone();
                            async move {
                                tokio::task::block_in_place(move || {
                                    let mut view = TransactionView { tx, handle };
                                    f(&mut view)
                                })
                            }
                        },
                        policy,
                        None,
                    )
                    .await
            })
            .await
            .unwrap_or_else(|e| {
                Err(Error::Runtime(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    e,
                )))
            })
        })
    }

    /// list_table_names returns the names of all tables currently active in
    /// the ledger.
    pub fn list_table_names(&self) -> Result<Vec<String>, Error> {
        let inner = Arc::clone(&self.inner);
        self.runtime
            .block_on(async move { inner.list_table_names().await })
    }

    /// close ends every idle session and rejects further work. Idempotent.
    pub fn close(&self) {
        let inner = Arc::clone(&self.inner);
        self.runtime.block_on(async move { inner.close().await });
    }
}

/// TransactionView is the blocking counterpart of [crate::transaction::Transaction]:
/// it permits executing statements and aborting, never committing.
pub struct TransactionView {
    tx: Arc<tokio::sync::Mutex<crate::transaction::Transaction>>,
    handle: Handle,
}

impl TransactionView {
    /// id returns the server-issued transaction id.
    pub fn id(&self) -> String {
        let tx = Arc::clone(&self.tx);
        self.handle
            .block_on(async move { tx.lock().await.id().to_string() })
    }

    /// execute runs one statement and returns its fully buffered result.
    pub fn execute(&mut self, statement: Statement) -> Result<BufferedResult, Error> {
        let tx = Arc::clone(&self.tx);
        self.handle.block_on(async move {
            let mut guard = tx.lock().await;
            let stream = guard.execute(statement).await?;
            stream.buffer().await
        })
    }

    /// abort abandons the transaction; the pending call then fails with
    /// [Error::Aborted] and is not retried.
    pub fn abort(&mut self) -> Result<(), Error> {
        let tx = Arc::clone(&self.tx);
        self.handle
            .block_on(async move { tx.lock().await.abort().await })
    }
}
