use std::collections::VecDeque;

use crate::error::Error;
use crate::session::SessionHandle;
use crate::transport::{ExecuteResult, IoUsage, Page, TimingInformation};
use crate::value::Document;

/// StreamResult is the lazy, forward-only cursor over the paginated output
/// of one executed statement. It borrows the session exclusively, so at
/// most one command is in flight while a page fetch is pending.
///
/// A stream is single-pass by construction: values are yielded through
/// `&mut self` and cannot be revisited. After a page fetch fails the stream
/// is dead and every further call fails with [Error::StreamConsumed].
pub struct StreamResult<'a> {
    session: &'a mut SessionHandle,
    transaction_id: String,
    values: VecDeque<Document>,
    next_page_token: Option<String>,
    io_usage: Option<IoUsage>,
    timing: Option<TimingInformation>,
    dead: bool,
}

impl std::fmt::Debug for StreamResult<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamResult")
            .field("transaction_id", &self.transaction_id)
            .field("values", &self.values)
            .field("next_page_token", &self.next_page_token)
            .field("io_usage", &self.io_usage)
            .field("timing", &self.timing)
            .field("dead", &self.dead)
            .finish()
    }
}

impl<'a> StreamResult<'a> {
    pub(crate) fn new(
        session: &'a mut SessionHandle,
        transaction_id: String,
        result: ExecuteResult,
    ) -> Self {
        let mut stream = StreamResult {
            session,
            transaction_id,
            values: VecDeque::new(),
            next_page_token: None,
            io_usage: None,
            timing: None,
            dead: false,
        };
        stream.absorb(result.first_page, result.consumed_ios, result.timing_information);
        stream
    }

    /// next returns the next document, fetching further pages from the
    /// owning session as the in-memory page drains. Returns None when the
    /// stream is exhausted.
    pub async fn next(&mut self) -> Result<Option<Document>, Error> {
        if self.dead {
            return Err(Error::StreamConsumed);
        }
        loop {
            if let Some(value) = self.values.pop_front() {
                return Ok(Some(value));
            }
            let token = match self.next_page_token.take() {
                Some(token) => token,
                None => return Ok(None),
            };
            match self.session.fetch_page(&self.transaction_id, &token).await {
                Ok(result) => {
                    self.absorb(result.page, result.consumed_ios, result.timing_information)
                }
                Err(e) => {
                    self.dead = true;
                    return Err(e);
                }
            }
        }
    }

    /// consumed_ios returns the cumulative server-side I/O usage, or None
    /// when no page reported any.
    pub fn consumed_ios(&self) -> Option<IoUsage> {
        self.io_usage
    }

    /// timing_information returns the cumulative server processing time,
    /// or None when no page reported any.
    pub fn timing_information(&self) -> Option<TimingInformation> {
        self.timing
    }

    /// buffer drains the remainder of the stream into a re-enumerable
    /// [BufferedResult].
    pub async fn buffer(mut self) -> Result<BufferedResult, Error> {
        let mut values = Vec::new();
        while let Some(value) = self.next().await? {
            values.push(value);
        }
        Ok(BufferedResult {
            values,
            io_usage: self.io_usage,
            timing: self.timing,
        })
    }

    fn absorb(
        &mut self,
        page: Page,
        ios: Option<IoUsage>,
        timing: Option<TimingInformation>,
    ) {
        self.values = page.values.into();
        self.next_page_token = page.next_page_token;
        if let Some(add) = ios {
            let total = self.io_usage.get_or_insert_with(IoUsage::default);
            total.read_ios += add.read_ios;
            total.write_ios += add.write_ios;
        }
        if let Some(add) = timing {
            let total = self.timing.get_or_insert_with(TimingInformation::default);
            total.processing_time_ms += add.processing_time_ms;
        }
    }
}

/// BufferedResult is a fully materialized statement result. Unlike
/// [StreamResult] it can be enumerated any number of times; it exposes the
/// same statistics surface.
#[derive(Debug, Clone, Default)]
pub struct BufferedResult {
    values: Vec<Document>,
    io_usage: Option<IoUsage>,
    timing: Option<TimingInformation>,
}

impl BufferedResult {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Document> {
        self.values.iter()
    }

    pub fn consumed_ios(&self) -> Option<IoUsage> {
        self.io_usage
    }

    pub fn timing_information(&self) -> Option<TimingInformation> {
        self.timing
    }
}

impl IntoIterator for BufferedResult {
    type Item = Document;
    type IntoIter = std::vec::IntoIter<Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a> IntoIterator for &'a BufferedResult {
    type Item = &'a Document;
    type IntoIter = std::slice::Iter<'a, Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
