use std::fmt;

use sha2::{Digest, Sha256};

use crate::value::Document;

pub const DIGEST_LEN: usize = 32;

/// CommitDigest is the 32-byte hash transmitted on commit and verified
/// against the server's independently computed digest.
///
/// The digest is seeded with the hash of the transaction id. Each executed
/// statement contributes one hash; the accumulated hashes are kept in
/// unsigned lexicographic order and the final value folds them from the
/// seed in that canonical order, so it depends only on the set of executed
/// statements, never on the order they were executed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitDigest {
    seed: [u8; DIGEST_LEN],
    /// Per-statement hashes, sorted by unsigned lexicographic byte order.
    statement_hashes: Vec<[u8; DIGEST_LEN]>,
}

impl CommitDigest {
    /// seed returns the initial digest for a transaction: the SHA-256 of
    /// the UTF-8 bytes of the transaction id.
    pub fn seed(transaction_id: &str) -> Self {
        CommitDigest {
            seed: Sha256::digest(transaction_id.as_bytes()).into(),
            statement_hashes: Vec::new(),
        }
    }

    /// update folds one executed statement into the digest. Pure; no I/O.
    ///
    /// The statement hash is the SHA-256 of the statement text followed by
    /// the SHA-256 of each parameter's serialized bytes, in binding order.
    pub fn update(&mut self, statement: &str, parameters: &[Document]) {
        let mut hasher = Sha256::new();
        hasher.update(statement.as_bytes());
        for parameter in parameters {
            hasher.update(Sha256::digest(parameter.bytes()));
        }
        let statement_hash: [u8; DIGEST_LEN] = hasher.finalize().into();
        let at = self
            .statement_hashes
            .partition_point(|existing| existing <= &statement_hash);
        self.statement_hashes.insert(at, statement_hash);
    }

    /// value computes the current digest: the seed when no statement has
    /// executed, otherwise the `dot` fold over the canonically ordered
    /// statement hashes.
    pub fn value(&self) -> [u8; DIGEST_LEN] {
        self.statement_hashes
            .iter()
            .fold(self.seed, |acc, statement_hash| dot(&acc, statement_hash))
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.value().to_vec()
    }
}

impl fmt::Display for CommitDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.value()))
    }
}

/// dot hashes the concatenation of `a` and `b` sorted by unsigned
/// lexicographic byte order, smaller value first. The ordering makes the
/// combinator reproducible across platforms.
fn dot(a: &[u8; DIGEST_LEN], b: &[u8; DIGEST_LEN]) -> [u8; DIGEST_LEN] {
    let mut hasher = Sha256::new();
    if a.as_slice() <= b.as_slice() {
        hasher.update(a);
        hasher.update(b);
    } else {
        hasher.update(b);
        hasher.update(a);
    }
    hasher.finalize().into()
}
