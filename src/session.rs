use std::sync::Arc;

use crate::error::Error;
use crate::statement::Statement;
use crate::transport::{
    Command, CommitResult, ExecuteResult, FetchPageResult, Payload, Response, Transport,
};

/// SessionHandle is a one-to-one handle to a server-side session. Each
/// method translates to exactly one protocol command; callers must not
/// issue overlapping commands on the same handle.
///
/// The `session_id` visible to users is the request id of the start-session
/// response; the session token used on the wire is never exposed.
pub struct SessionHandle {
    transport: Arc<dyn Transport>,
    session_token: String,
    session_id: String,
    alive: bool,
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("session_id", &self.session_id)
            .field("alive", &self.alive)
            .finish_non_exhaustive()
    }
}

impl SessionHandle {
    pub(crate) async fn open(
        transport: Arc<dyn Transport>,
        ledger_name: &str,
    ) -> Result<SessionHandle, Error> {
        let response = transport
            .send(Command::StartSession {
                ledger_name: ledger_name.to_string(),
            })
            .await?;
        match response.payload {
            Payload::SessionStarted { session_token } => {
                tracing::debug!(session_id = %response.request_id, "session opened");
                Ok(SessionHandle {
                    transport,
                    session_token,
                    session_id: response.request_id,
                    alive: true,
                })
            }
            _ => Err(Error::UnexpectedResponse {
                expected: "session start acknowledgement",
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.session_id
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub(crate) fn mark_dead(&mut self) {
        self.alive = false;
    }

    /// send issues one command. Liveness is pessimistically cleared for the
    /// duration of the send: a send interrupted by cancellation leaves the
    /// session unusable, and only a classified completion restores it.
    async fn send(&mut self, command: Command) -> Result<Response, Error> {
        let name = command.name();
        self.alive = false;
        match self.transport.send(command).await {
            Ok(response) => {
                self.alive = true;
                Ok(response)
            }
            Err(e) => {
                let error = Error::from(e);
                self.alive = error.disposition().session_alive;
                if !self.alive {
                    tracing::debug!(session_id = %self.session_id, command = name, "session invalidated");
                }
                Err(error)
            }
        }
    }

    pub(crate) async fn start_transaction(&mut self) -> Result<String, Error> {
        let response = self
            .send(Command::StartTransaction {
                session_token: self.session_token.clone(),
            })
            .await?;
        match response.payload {
            Payload::TransactionStarted { transaction_id } => Ok(transaction_id),
            _ => {
                self.alive = false;
                Err(Error::UnexpectedResponse {
                    expected: "transaction start acknowledgement",
                })
            }
        }
    }

    pub(crate) async fn execute_statement(
        &mut self,
        transaction_id: &str,
        statement: &Statement,
    ) -> Result<ExecuteResult, Error> {
        let response = self
            .send(Command::ExecuteStatement {
                session_token: self.session_token.clone(),
                transaction_id: transaction_id.to_string(),
                statement: statement.text().to_string(),
                parameters: statement.parameters().to_vec(),
            })
            .await?;
        match response.payload {
            Payload::StatementExecuted(result) => Ok(result),
            _ => {
                self.alive = false;
                Err(Error::UnexpectedResponse {
                    expected: "statement result",
                })
            }
        }
    }

    pub(crate) async fn fetch_page(
        &mut self,
        transaction_id: &str,
        page_token: &str,
    ) -> Result<FetchPageResult, Error> {
        let response = self
            .send(Command::FetchPage {
                session_token: self.session_token.clone(),
                transaction_id: transaction_id.to_string(),
                page_token: page_token.to_string(),
            })
            .await?;
        match response.payload {
            Payload::PageFetched(result) => Ok(result),
            _ => {
                self.alive = false;
                Err(Error::UnexpectedResponse { expected: "page" })
            }
        }
    }

    pub(crate) async fn commit_transaction(
        &mut self,
        transaction_id: &str,
        commit_digest: &[u8],
    ) -> Result<CommitResult, Error> {
        let response = self
            .send(Command::CommitTransaction {
                session_token: self.session_token.clone(),
                transaction_id: transaction_id.to_string(),
                commit_digest: commit_digest.to_vec(),
            })
            .await?;
        match response.payload {
            Payload::TransactionCommitted(result) => Ok(result),
            _ => {
                self.alive = false;
                Err(Error::UnexpectedResponse {
                    expected: "commit acknowledgement",
                })
            }
        }
    }

    pub(crate) async fn abort_transaction(&mut self) -> Result<(), Error> {
        let response = self
            .send(Command::AbortTransaction {
                session_token: self.session_token.clone(),
            })
            .await?;
        match response.payload {
            Payload::TransactionAborted => Ok(()),
            _ => {
                self.alive = false;
                Err(Error::UnexpectedResponse {
                    expected: "abort acknowledgement",
                })
            }
        }
    }

    /// end closes the server-side session, best-effort. Dead sessions are
    /// skipped: the server has already invalidated them.
    pub(crate) async fn end(&mut self) {
        if !self.alive {
            return;
        }
        self.alive = false;
        let request = Command::EndSession {
            session_token: self.session_token.clone(),
        };
        if let Err(e) = self.transport.send(request).await {
            tracing::debug!(session_id = %self.session_id, error = %e, "failed to end session");
        }
    }
}

/// SessionFactory opens fresh sessions against one ledger. Represented as a
/// value so the pool can be exercised with any [Transport] implementation.
#[derive(Clone)]
pub struct SessionFactory {
    transport: Arc<dyn Transport>,
    ledger_name: String,
}

impl SessionFactory {
    pub fn new(transport: Arc<dyn Transport>, ledger_name: impl Into<String>) -> Self {
        SessionFactory {
            transport,
            ledger_name: ledger_name.into(),
        }
    }

    pub fn ledger_name(&self) -> &str {
        &self.ledger_name
    }

    pub async fn open(&self) -> Result<SessionHandle, Error> {
        SessionHandle::open(Arc::clone(&self.transport), &self.ledger_name).await
    }
}
