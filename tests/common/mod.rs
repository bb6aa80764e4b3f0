#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use ledger_driver::digest::CommitDigest;
use ledger_driver::transport::{
    Command, CommitResult, ExecuteResult, FetchPageResult, IoUsage, Page, Payload, Response,
    TimingInformation, Transport, TransportError,
};
use ledger_driver::value::Document;

/// One scripted transport reaction; the script is consumed front to back,
/// one step per command.
pub enum ScriptStep {
    Respond(Payload),
    Fail(TransportError),
}

/// ScriptedTransport answers commands from a fixed script and records every
/// command it saw, playing the role the emulator plays for a real backend.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<ScriptStep>>,
    commands: Mutex<Vec<Command>>,
    sequence: AtomicU64,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<ScriptStep>) -> Arc<Self> {
        Arc::new(ScriptedTransport {
            script: Mutex::new(steps.into()),
            commands: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(0),
        })
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().clone()
    }

    pub fn command_count(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn remaining_steps(&self) -> usize {
        self.script.lock().len()
    }

    pub fn count_start_sessions(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| matches!(c, Command::StartSession { .. }))
            .count()
    }

    pub fn count_start_transactions(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| matches!(c, Command::StartTransaction { .. }))
            .count()
    }

    pub fn distinct_session_tokens(&self) -> usize {
        let mut tokens: Vec<String> = self
            .commands()
            .iter()
            .filter_map(|c| match c {
                Command::StartTransaction { session_token } => Some(session_token.clone()),
                _ => None,
            })
            .collect();
        tokens.sort();
        tokens.dedup();
        tokens.len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, command: Command) -> Result<Response, TransportError> {
        self.commands.lock().push(command);
        let step = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| ScriptStep::Fail(TransportError::api("mock script exhausted", None)));
        let request_id = format!("request-{}", self.sequence.fetch_add(1, Ordering::SeqCst) + 1);
        match step {
            ScriptStep::Respond(payload) => Ok(Response {
                request_id,
                payload,
            }),
            ScriptStep::Fail(error) => Err(error),
        }
    }
}

/// EchoTransport answers every command generically: fresh tokens and ids,
/// the configured values for every statement, and a commit acknowledgement
/// echoing the digest from the request. Useful for concurrency tests where
/// the exact command sequence is not under test.
pub struct EchoTransport {
    sequence: AtomicU64,
    commands: Mutex<Vec<Command>>,
    statement_values: Vec<String>,
    response_delay: Option<Duration>,
}

impl EchoTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(EchoTransport {
            sequence: AtomicU64::new(0),
            commands: Mutex::new(Vec::new()),
            statement_values: Vec::new(),
            response_delay: None,
        })
    }

    pub fn with_values(values: &[&str]) -> Arc<Self> {
        Arc::new(EchoTransport {
            sequence: AtomicU64::new(0),
            commands: Mutex::new(Vec::new()),
            statement_values: values.iter().map(|v| v.to_string()).collect(),
            response_delay: None,
        })
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(EchoTransport {
            sequence: AtomicU64::new(0),
            commands: Mutex::new(Vec::new()),
            statement_values: Vec::new(),
            response_delay: Some(delay),
        })
    }

    pub fn command_count(&self) -> usize {
        self.commands.lock().len()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl Transport for EchoTransport {
    async fn send(&self, command: Command) -> Result<Response, TransportError> {
        if let Some(delay) = self.response_delay {
            tokio::time::sleep(delay).await;
        }
        let n = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let payload = match &command {
            Command::StartSession { .. } => Payload::SessionStarted {
                session_token: format!("token-{n}"),
            },
            Command::StartTransaction { .. } => Payload::TransactionStarted {
                transaction_id: format!("txn-{n}"),
            },
            Command::ExecuteStatement { .. } => Payload::StatementExecuted(ExecuteResult {
                first_page: text_page(
                    &self
                        .statement_values
                        .iter()
                        .map(String::as_str)
                        .collect::<Vec<_>>(),
                    None,
                ),
                consumed_ios: Some(IoUsage {
                    read_ios: 1,
                    write_ios: 0,
                }),
                timing_information: Some(TimingInformation {
                    processing_time_ms: 1,
                }),
            }),
            Command::FetchPage { .. } => Payload::PageFetched(FetchPageResult {
                page: Page::default(),
                consumed_ios: None,
                timing_information: None,
            }),
            Command::CommitTransaction {
                transaction_id,
                commit_digest,
                ..
            } => Payload::TransactionCommitted(CommitResult {
                transaction_id: transaction_id.clone(),
                commit_digest: commit_digest.clone(),
            }),
            Command::AbortTransaction { .. } => Payload::TransactionAborted,
            Command::EndSession { .. } => Payload::SessionEnded,
        };
        self.commands.lock().push(command);
        Ok(Response {
            request_id: format!("request-{n}"),
            payload,
        })
    }
}

pub fn text_page(values: &[&str], next_page_token: Option<&str>) -> Page {
    Page {
        values: values.iter().map(|v| Document::from(*v)).collect(),
        next_page_token: next_page_token.map(str::to_string),
    }
}

pub fn session_started(token: &str) -> ScriptStep {
    ScriptStep::Respond(Payload::SessionStarted {
        session_token: token.to_string(),
    })
}

pub fn transaction_started(transaction_id: &str) -> ScriptStep {
    ScriptStep::Respond(Payload::TransactionStarted {
        transaction_id: transaction_id.to_string(),
    })
}

pub fn statement_executed(values: &[&str], next_page_token: Option<&str>) -> ScriptStep {
    ScriptStep::Respond(Payload::StatementExecuted(ExecuteResult {
        first_page: text_page(values, next_page_token),
        consumed_ios: None,
        timing_information: None,
    }))
}

pub fn transaction_committed(transaction_id: &str, commit_digest: Vec<u8>) -> ScriptStep {
    ScriptStep::Respond(Payload::TransactionCommitted(CommitResult {
        transaction_id: transaction_id.to_string(),
        commit_digest,
    }))
}

pub fn transaction_aborted() -> ScriptStep {
    ScriptStep::Respond(Payload::TransactionAborted)
}

pub fn session_ended() -> ScriptStep {
    ScriptStep::Respond(Payload::SessionEnded)
}

pub fn occ_conflict() -> ScriptStep {
    ScriptStep::Fail(TransportError::occ_conflict("optimistic concurrency conflict"))
}

pub fn invalid_session(message: &str) -> ScriptStep {
    ScriptStep::Fail(TransportError::invalid_session(message))
}

pub fn capacity_exceeded() -> ScriptStep {
    ScriptStep::Fail(TransportError::capacity_exceeded("transaction capacity exceeded"))
}

pub fn server_failure(status: u16) -> ScriptStep {
    ScriptStep::Fail(TransportError::api("internal failure", Some(status)))
}

pub fn statement_executed_with_stats(
    values: &[&str],
    next_page_token: Option<&str>,
    ios: IoUsage,
    timing: TimingInformation,
) -> ScriptStep {
    ScriptStep::Respond(Payload::StatementExecuted(ExecuteResult {
        first_page: text_page(values, next_page_token),
        consumed_ios: Some(ios),
        timing_information: Some(timing),
    }))
}

pub fn page_fetched_with_stats(
    values: &[&str],
    next_page_token: Option<&str>,
    ios: IoUsage,
    timing: TimingInformation,
) -> ScriptStep {
    ScriptStep::Respond(Payload::PageFetched(FetchPageResult {
        page: text_page(values, next_page_token),
        consumed_ios: Some(ios),
        timing_information: Some(timing),
    }))
}

/// digest_for computes the commit digest a client accumulates for the given
/// transaction id and parameterless statement sequence.
pub fn digest_for(transaction_id: &str, statements: &[&str]) -> Vec<u8> {
    let mut digest = CommitDigest::seed(transaction_id);
    for text in statements {
        digest.update(text, &[]);
    }
    digest.to_vec()
}
