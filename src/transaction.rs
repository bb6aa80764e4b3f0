use crate::digest::CommitDigest;
use crate::error::Error;
use crate::reader::StreamResult;
use crate::session_pool::ManagedSession;
use crate::statement::Statement;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransactionState {
    Open,
    Committed,
    Aborted,
    Errored,
}

/// Transaction is the state machine around one server-side transaction.
///
/// It owns the session for its lifetime and accumulates the commit digest
/// as statements execute. The user lambda receives this type but can only
/// `execute` and `abort`; `commit` is reserved for the retry loop, which
/// commits exactly once when the lambda returns cleanly.
pub struct Transaction {
    session: Option<ManagedSession>,
    transaction_id: String,
    digest: CommitDigest,
    state: TransactionState,
}

impl Transaction {
    /// begin starts a transaction on the session. On failure the session is
    /// handed back so the caller can decide whether it is reusable.
    pub(crate) async fn begin(
        mut session: ManagedSession,
    ) -> Result<Transaction, (Error, ManagedSession)> {
        match session.start_transaction().await {
            Ok(transaction_id) => {
                tracing::trace!(transaction_id = %transaction_id, "transaction started");
                Ok(Transaction {
                    digest: CommitDigest::seed(&transaction_id),
                    transaction_id,
                    session: Some(session),
                    state: TransactionState::Open,
                })
            }
            Err(e) => Err((e, session)),
        }
    }

    /// id returns the server-issued transaction id.
    pub fn id(&self) -> &str {
        &self.transaction_id
    }

    /// execute runs one statement inside the transaction and returns a
    /// lazy stream over its result. The stream borrows the transaction, so
    /// it must be dropped before the next operation.
    pub async fn execute(&mut self, statement: Statement) -> Result<StreamResult<'_>, Error> {
        if self.state != TransactionState::Open {
            return Err(Error::TransactionClosed);
        }
        let result = {
            let session = self.session.as_mut().unwrap();
            session
                .execute_statement(&self.transaction_id, &statement)
                .await
        };
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                self.state = TransactionState::Errored;
                return Err(e);
            }
        };
        // The digest reflects statements in server-acknowledged order.
        self.digest.update(statement.text(), statement.parameters());
        let session = self.session.as_mut().unwrap();
        Ok(StreamResult::new(
            &mut *session,
            self.transaction_id.clone(),
            result,
        ))
    }

    /// abort rolls the transaction back. Valid while the transaction is
    /// open or errored; errors from the abort command itself are swallowed,
    /// leaving the session marked dead.
    pub async fn abort(&mut self) -> Result<(), Error> {
        match self.state {
            TransactionState::Open | TransactionState::Errored => {}
            _ => return Err(Error::TransactionClosed),
        }
        let session = self.session.as_mut().unwrap();
        if session.is_alive() {
            if let Err(e) = session.abort_transaction().await {
                tracing::debug!(transaction_id = %self.transaction_id, error = %e, "abort failed");
                session.mark_dead();
            }
        }
        self.state = TransactionState::Aborted;
        Ok(())
    }

    /// commit transmits the accumulated digest and verifies the server's
    /// echo. A digest disagreement is an integrity failure and is never
    /// retried.
    pub(crate) async fn commit(&mut self) -> Result<(), Error> {
        if self.state != TransactionState::Open {
            return Err(Error::TransactionClosed);
        }
        let expected = self.digest.value();
        let session = self.session.as_mut().unwrap();
        match session
            .commit_transaction(&self.transaction_id, &expected)
            .await
        {
            Ok(result) => {
                if expected.as_slice() != result.commit_digest.as_slice() {
                    tracing::error!(
                        transaction_id = %self.transaction_id,
                        local = %hex::encode(expected),
                        "commit digest mismatch"
                    );
                    self.state = TransactionState::Errored;
                    return Err(Error::DigestMismatch {
                        transaction_id: self.transaction_id.clone(),
                    });
                }
                self.state = TransactionState::Committed;
                tracing::trace!(transaction_id = %self.transaction_id, "transaction committed");
                Ok(())
            }
            Err(e) => {
                self.state = TransactionState::Errored;
                Err(e)
            }
        }
    }

    pub(crate) fn state(&self) -> TransactionState {
        self.state
    }

    pub(crate) fn session_alive(&self) -> bool {
        self.session.as_ref().map(|s| s.is_alive()).unwrap_or(false)
    }

    /// take_session returns ownership of the session for the retry loop.
    pub(crate) fn take_session(&mut self) -> Option<ManagedSession> {
        self.session.take()
    }
}
