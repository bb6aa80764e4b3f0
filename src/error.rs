use std::time::Duration;

use crate::transport::{TransportError, TransportErrorKind};

/// Error is the driver's public error taxonomy.
///
/// Classification into "retriable" and "session still alive" happens once,
/// at the boundary between the transport and the retry loop
/// ([Error::disposition]); every other layer re-raises unchanged.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The client has been closed; no further work is accepted.
    #[error("client has been closed")]
    Closed,

    /// No pool permit became available within the acquisition timeout.
    #[error("no session available within {0:?}")]
    PoolTimeout(Duration),

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The transport answered a command with the wrong payload variant.
    #[error("unexpected response payload, expected {expected}")]
    UnexpectedResponse { expected: &'static str },

    /// The server's commit digest disagrees with the locally accumulated
    /// one; the transaction outcome cannot be trusted.
    #[error("commit digest mismatch for transaction {transaction_id}")]
    DigestMismatch { transaction_id: String },

    /// The caller explicitly aborted the transaction inside the lambda.
    #[error("transaction was explicitly aborted")]
    Aborted,

    /// An operation was attempted on a committed, aborted or failed
    /// transaction.
    #[error("transaction is no longer open")]
    TransactionClosed,

    #[error("result stream already consumed")]
    StreamConsumed,

    #[error("operation cancelled")]
    Cancelled,

    /// Cancellation fired while a commit command was in flight; the
    /// transaction may or may not have committed server-side.
    #[error("commit outcome unknown for transaction {transaction_id}")]
    CommitIndeterminate { transaction_id: String },

    #[error("failed to start blocking runtime")]
    Runtime(#[source] std::io::Error),
}

/// What the retry loop is allowed to do with an error, and whether the
/// session that produced it can still be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Disposition {
    pub retriable: bool,
    pub session_alive: bool,
}

impl Error {
    /// is_retriable reports whether the retry loop may replay the
    /// transaction after this error.
    pub fn is_retriable(&self) -> bool {
        self.disposition().retriable
    }

    pub(crate) fn disposition(&self) -> Disposition {
        match self {
            Error::Transport(e) => transport_disposition(e),
            Error::Aborted => Disposition {
                retriable: false,
                session_alive: true,
            },
            Error::DigestMismatch { .. } => Disposition {
                retriable: false,
                session_alive: true,
            },
            // An interrupted command has an unknown outcome; the session
            // must not carry another command.
            Error::Cancelled | Error::CommitIndeterminate { .. } => Disposition {
                retriable: false,
                session_alive: false,
            },
            Error::UnexpectedResponse { .. } => Disposition {
                retriable: false,
                session_alive: false,
            },
            Error::Closed
            | Error::PoolTimeout(_)
            | Error::InvalidConfig(_)
            | Error::TransactionClosed
            | Error::StreamConsumed
            | Error::Runtime(_) => Disposition {
                retriable: false,
                session_alive: true,
            },
        }
    }

    pub(crate) fn is_invalid_session(&self) -> bool {
        matches!(
            self,
            Error::Transport(e) if e.kind == TransportErrorKind::InvalidSession
        )
    }
}

fn transport_disposition(error: &TransportError) -> Disposition {
    match error.kind {
        TransportErrorKind::OccConflict => Disposition {
            retriable: true,
            session_alive: true,
        },
        TransportErrorKind::CapacityExceeded => Disposition {
            retriable: true,
            session_alive: true,
        },
        TransportErrorKind::InvalidSession => Disposition {
            // A session whose transaction already expired cannot be
            // replayed: the work it saw is gone for good.
            retriable: !is_transaction_expired(&error.message),
            session_alive: false,
        },
        TransportErrorKind::Api => Disposition {
            retriable: error.is_server_failure(),
            session_alive: false,
        },
    }
}

fn is_transaction_expired(message: &str) -> bool {
    message.contains("Transaction") && message.contains("has expired")
}

/// AttemptError is the retry envelope produced for one failed attempt and
/// consumed by the retry loop, which unwraps `cause` when surfacing to the
/// caller.
#[derive(Debug)]
pub(crate) struct AttemptError {
    pub transaction_id: Option<String>,
    pub session_alive: bool,
    pub retriable: bool,
    pub cause: Error,
}

impl AttemptError {
    pub(crate) fn classify(transaction_id: Option<String>, cause: Error) -> Self {
        let disposition = cause.disposition();
        AttemptError {
            transaction_id,
            session_alive: disposition.session_alive,
            retriable: disposition.retriable,
            cause,
        }
    }
}
