//! Capacity-bounded record buffer
//!
//! Holds records waiting for the next flush, oldest first. The buffer is only
//! mutated by three operations, each synchronous:
//!
//! - `push`: append a new record (refused when full)
//! - `take`: swap the contents out for an empty buffer before a flush
//! - `rollback`: merge records from a failed flush back in, ahead of
//!   whatever was appended while the request was in flight

use std::mem;

use serde_json::Value;

/// A record waiting to be submitted
#[derive(Debug, Clone, PartialEq)]
pub struct BufferedRecord {
    /// Destination index
    pub destination: String,
    /// Document body
    pub payload: Value,
    /// Number of failed dispatches this record has survived
    pub attempt: u32,
}

impl BufferedRecord {
    /// Create a fresh record with no failed attempts
    pub fn new(destination: impl Into<String>, payload: Value) -> Self {
        Self {
            destination: destination.into(),
            payload,
            attempt: 0,
        }
    }
}

/// Result of merging a failed flush back into the buffer
#[derive(Debug, Default)]
pub struct RollbackOutcome {
    /// Records put back into the buffer
    pub requeued: usize,
    /// Records dropped because they exceeded the retry limit
    pub exhausted: Vec<BufferedRecord>,
    /// Records trimmed from the tail to stay within capacity
    pub trimmed: Vec<BufferedRecord>,
}

/// Ordered store of pending records
#[derive(Debug, Default)]
pub struct Buffer {
    records: Vec<BufferedRecord>,
    limit: Option<usize>,
}

impl Buffer {
    /// Create a buffer holding at most `limit` records (`None` = unbounded)
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            records: Vec::new(),
            limit,
        }
    }

    /// Capacity, if bounded
    #[inline]
    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Number of buffered records
    #[inline]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether another push would be refused
    #[inline]
    pub fn is_full(&self) -> bool {
        self.limit.is_some_and(|limit| self.records.len() >= limit)
    }

    /// Buffered records in submission order
    pub fn records(&self) -> impl Iterator<Item = &BufferedRecord> {
        self.records.iter()
    }

    /// Append a record
    ///
    /// Returns the record back when the buffer is full.
    pub fn push(&mut self, record: BufferedRecord) -> Result<(), BufferedRecord> {
        if self.is_full() {
            return Err(record);
        }
        self.records.push(record);
        Ok(())
    }

    /// Swap the contents out, leaving an empty buffer
    pub fn take(&mut self) -> Vec<BufferedRecord> {
        mem::take(&mut self.records)
    }

    /// Merge records from a failed request back into the buffer
    ///
    /// Each record's attempt count goes up by one. Records whose new count
    /// exceeds `retry_limit` are dropped. Survivors are placed ahead of the
    /// current contents in their original relative order, then the merged
    /// sequence is cut back to capacity from the tail.
    pub fn rollback(&mut self, failed: Vec<BufferedRecord>, retry_limit: u32) -> RollbackOutcome {
        let mut outcome = RollbackOutcome::default();
        let mut merged = Vec::with_capacity(failed.len() + self.records.len());

        for mut record in failed {
            record.attempt += 1;
            if record.attempt > retry_limit {
                outcome.exhausted.push(record);
            } else {
                merged.push(record);
            }
        }
        outcome.requeued = merged.len();

        merged.append(&mut self.records);

        if let Some(limit) = self.limit
            && merged.len() > limit
        {
            outcome.trimmed = merged.split_off(limit);
            outcome.requeued = outcome.requeued.min(limit);
        }

        self.records = merged;
        outcome
    }
}

#[cfg(test)]
#[path = "buffer_test.rs"]
mod buffer_test;
