use async_trait::async_trait;

use crate::value::Document;

/// Command is the discriminated union accepted by the session-oriented
/// request/response channel to the ledger service. One command translates
/// to exactly one request on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    StartSession {
        ledger_name: String,
    },
    StartTransaction {
        session_token: String,
    },
    ExecuteStatement {
        session_token: String,
        transaction_id: String,
        statement: String,
        parameters: Vec<Document>,
    },
    FetchPage {
        session_token: String,
        transaction_id: String,
        page_token: String,
    },
    CommitTransaction {
        session_token: String,
        transaction_id: String,
        commit_digest: Vec<u8>,
    },
    AbortTransaction {
        session_token: String,
    },
    EndSession {
        session_token: String,
    },
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Command::StartSession { .. } => "StartSession",
            Command::StartTransaction { .. } => "StartTransaction",
            Command::ExecuteStatement { .. } => "ExecuteStatement",
            Command::FetchPage { .. } => "FetchPage",
            Command::CommitTransaction { .. } => "CommitTransaction",
            Command::AbortTransaction { .. } => "AbortTransaction",
            Command::EndSession { .. } => "EndSession",
        }
    }
}

/// Response to a single command. `request_id` identifies the request on the
/// server side; the response to a start-session command doubles as the
/// client-visible session id.
#[derive(Debug, Clone)]
pub struct Response {
    pub request_id: String,
    pub payload: Payload,
}

/// Payload mirrors [Command] with the matching result variant.
#[derive(Debug, Clone)]
pub enum Payload {
    SessionStarted { session_token: String },
    TransactionStarted { transaction_id: String },
    StatementExecuted(ExecuteResult),
    PageFetched(FetchPageResult),
    TransactionCommitted(CommitResult),
    TransactionAborted,
    SessionEnded,
}

/// One page of statement output.
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub values: Vec<Document>,
    pub next_page_token: Option<String>,
}

/// Server-reported I/O consumption for one command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoUsage {
    pub read_ios: i64,
    pub write_ios: i64,
}

/// Server-reported processing time for one command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingInformation {
    pub processing_time_ms: i64,
}

#[derive(Debug, Clone)]
pub struct ExecuteResult {
    pub first_page: Page,
    pub consumed_ios: Option<IoUsage>,
    pub timing_information: Option<TimingInformation>,
}

#[derive(Debug, Clone)]
pub struct FetchPageResult {
    pub page: Page,
    pub consumed_ios: Option<IoUsage>,
    pub timing_information: Option<TimingInformation>,
}

/// Commit acknowledgement. The server echoes the digest it computed
/// independently; callers must verify it against the local digest.
#[derive(Debug, Clone)]
pub struct CommitResult {
    pub transaction_id: String,
    pub commit_digest: Vec<u8>,
}

/// The error classes a transport can raise. Everything the driver needs to
/// decide retriability and session liveness is carried here; the rest of the
/// crate never inspects transport messages beyond this classification point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Optimistic-concurrency rejection at commit.
    OccConflict,
    /// The server no longer recognizes the session token.
    InvalidSession,
    /// The service refused the command due to concurrent transaction limits.
    CapacityExceeded,
    /// Any other service or connection failure; `http_status` carries the
    /// HTTP status when one was observed.
    Api,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    pub http_status: Option<u16>,
}

impl TransportError {
    pub fn occ_conflict(message: impl Into<String>) -> Self {
        TransportError {
            kind: TransportErrorKind::OccConflict,
            message: message.into(),
            http_status: None,
        }
    }

    pub fn invalid_session(message: impl Into<String>) -> Self {
        TransportError {
            kind: TransportErrorKind::InvalidSession,
            message: message.into(),
            http_status: None,
        }
    }

    pub fn capacity_exceeded(message: impl Into<String>) -> Self {
        TransportError {
            kind: TransportErrorKind::CapacityExceeded,
            message: message.into(),
            http_status: None,
        }
    }

    pub fn api(message: impl Into<String>, http_status: Option<u16>) -> Self {
        TransportError {
            kind: TransportErrorKind::Api,
            message: message.into(),
            http_status,
        }
    }

    pub fn is_server_failure(&self) -> bool {
        matches!(self.http_status, Some(status) if (500..600).contains(&status))
    }
}

/// Transport is the opaque request/response channel to the ledger service.
/// Implementations own endpoint configuration, credentials and signing;
/// the driver only sequences commands through it. A transport must be safe
/// to share across sessions; the driver guarantees at most one in-flight
/// command per session.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, command: Command) -> Result<Response, TransportError>;
}
