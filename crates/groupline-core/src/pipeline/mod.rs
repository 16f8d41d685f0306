//! Module: pipeline
//! Responsibility: the operator's collaborator seams, a row source and a row
//! sink, plus in-memory implementations.
//! Does not own: scheduling, backpressure, or thread placement.

use crate::{error::InternalError, row::Row};
use std::collections::{BTreeSet, VecDeque};

///
/// RowSource
///
/// Upstream rows, one at a time. `is_batch_end` reports whether the row just
/// returned closes the current batch.
///

pub trait RowSource {
    fn next_row(&mut self) -> Result<Option<Row>, InternalError>;

    fn is_batch_end(&self) -> bool;
}

///
/// RowSink
///

pub trait RowSink {
    fn put_row(&mut self, row: Row) -> Result<(), InternalError>;
}

impl RowSink for Vec<Row> {
    fn put_row(&mut self, row: Row) -> Result<(), InternalError> {
        self.push(row);

        Ok(())
    }
}

impl<S: RowSink + ?Sized> RowSink for &mut S {
    fn put_row(&mut self, row: Row) -> Result<(), InternalError> {
        (**self).put_row(row)
    }
}

///
/// VecSource
///
/// In-memory source with optional batch-end markers.
///

#[derive(Clone, Debug, Default)]
pub struct VecSource {
    rows: VecDeque<Row>,
    batch_ends: BTreeSet<usize>,
    position: usize,
    last_was_batch_end: bool,
}

impl VecSource {
    #[must_use]
    pub fn new(rows: impl IntoIterator<Item = Row>) -> Self {
        Self {
            rows: rows.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Source whose batches end after each inner vector but the last.
    #[must_use]
    pub fn from_batches(batches: impl IntoIterator<Item = Vec<Row>>) -> Self {
        let mut source = Self::default();
        let mut seen = 0usize;
        for batch in batches {
            seen += batch.len();
            source.rows.extend(batch);
            if seen > 0 {
                source.batch_ends.insert(seen - 1);
            }
        }
        if let Some(last) = source.rows.len().checked_sub(1) {
            source.batch_ends.remove(&last);
        }

        source
    }

    /// Mark the row at `index` (zero-based) as the end of a batch.
    #[must_use]
    pub fn batch_end_after(mut self, index: usize) -> Self {
        self.batch_ends.insert(index);
        self
    }
}

impl RowSource for VecSource {
    fn next_row(&mut self) -> Result<Option<Row>, InternalError> {
        let Some(row) = self.rows.pop_front() else {
            self.last_was_batch_end = false;
            return Ok(None);
        };

        self.last_was_batch_end = self.batch_ends.contains(&self.position);
        self.position += 1;

        Ok(Some(row))
    }

    fn is_batch_end(&self) -> bool {
        self.last_was_batch_end
    }
}

///
/// TESTS
///
