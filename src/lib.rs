//! # ledger-driver
//!
//! Client driver for a managed, append-only journal database that serves
//! PartiQL statements over a session-oriented protocol. The driver lets
//! application code run one or more statements inside an ACID transaction
//! while it transparently handles session pooling, optimistic-concurrency
//! retries, server-side session expiry, backoff and concurrency limits.
//!
//! ## Quickstart
//!
//! ```
//! use std::sync::Arc;
//!
//! use ledger_driver::client::{Client, ClientConfig};
//! use ledger_driver::statement::Statement;
//! use ledger_driver::error::Error;
//! use ledger_driver::transport::Transport;
//!
//! async fn run(transport: Arc<dyn Transport>) -> Result<(), Error> {
//!     let client = Client::new(transport, "my-ledger", ClientConfig::default())?;
//!
//!     // Each lambda runs inside one transaction; the driver commits when
//!     // the lambda returns cleanly and replays it on retriable failures.
//!     let count = client
//!         .execute(|tx| async move {
//!             let mut tx = tx.lock().await;
//!             let mut stmt = Statement::new("SELECT * FROM people WHERE name = ?");
//!             stmt.add_param("alice");
//!             let mut rows = tx.execute(stmt).await?;
//!             let mut count = 0;
//!             while let Some(_row) = rows.next().await? {
//!                 count += 1;
//!             }
//!             Ok(count)
//!         })
//!         .await?;
//!     println!("{count} rows");
//!
//!     // Convenience listing of active tables.
//!     let tables = client.list_table_names().await?;
//!     println!("{tables:?}");
//!
//!     // Release all pooled sessions.
//!     client.close().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Transactions
//!
//! The lambda receives a transaction handle that can `execute` statements
//! and `abort`, but never commit: committing (including transmission and
//! verification of the accumulated commit digest) is the driver's job and
//! happens exactly once per successful call. The lambda may be invoked more
//! than once, so it must not keep state between invocations.
//!
//! ## Blocking facade
//!
//! [blocking::Client] offers the same semantics behind a synchronous API
//! for callers without an async runtime.

pub mod blocking;
pub mod client;
pub mod digest;
pub mod error;
pub mod reader;
pub mod retry;
pub mod session;
pub mod session_pool;
pub mod statement;
pub mod transaction;
pub mod transport;
pub mod value;
