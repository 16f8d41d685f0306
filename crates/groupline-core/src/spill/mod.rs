//! Module: spill
//! Responsibility: bounded in-memory FIFO for the open group's rows with
//! on-demand overflow into one temporary file.
//! Does not own: row encoding (delegated to `RowCodec`) or group lifecycle.
//! Boundary: at most one spill file exists per store; it is created on the
//! first overflow and removed when the drain finishes or is dropped.


use crate::{
    MAX_ROW_BYTES, SPILL_FILE_SUFFIX,
    config::SpillSettings,
    error::InternalError,
    obs::sink::{self, MetricsEvent},
    row::Row,
    serialize::RowCodec,
};
use std::{
    collections::VecDeque,
    io::{self, BufReader, BufWriter, Read, Seek, Write},
    path::PathBuf,
    sync::Arc,
};
use tempfile::NamedTempFile;
use thiserror::Error as ThisError;

const FRAME_HEADER_LEN: usize = 4;

///
/// SpillError
///

#[derive(Debug, ThisError)]
pub enum SpillError {
    #[error("failed to create spill file in {}: {source}", dir.display())]
    Create { dir: PathBuf, source: io::Error },

    #[error("failed to write spill file: {0}")]
    Write(io::Error),

    #[error("failed to read spill file: {0}")]
    Read(io::Error),

    #[error("spill file ended after {read} of {expected} rows")]
    Truncated { read: u64, expected: u64 },

    #[error("row encodes to {len} bytes; spilled rows are at most {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    #[error("spill store is unusable after a failed write")]
    Unusable,

    #[error("spill frame declares {len} bytes; rows are at most {max} bytes")]
    CorruptFrame { len: usize, max: usize },
}

impl From<SpillError> for InternalError {
    fn from(err: SpillError) -> Self {
        match err {
            SpillError::Truncated { .. } | SpillError::CorruptFrame { .. } => {
                Self::spill_corruption(err.to_string())
            }
            _ => Self::spill_io(err.to_string()),
        }
    }
}

///
/// RowSpillStore
///
/// Keeps the `buffer_rows` most recently appended rows in memory and spills
/// older rows, oldest first, into a lazily created temporary file. Each
/// spilled row is one frame: a little-endian `u32` length and the codec's
/// bytes.
///

pub struct RowSpillStore {
    threshold: usize,
    directory: PathBuf,
    prefix: String,
    codec: Arc<dyn RowCodec>,
    memory: VecDeque<Row>,
    writer: Option<BufWriter<NamedTempFile>>,
    spilled: u64,
    write_failed: bool,
}

impl RowSpillStore {
    #[must_use]
    pub fn new(settings: &SpillSettings, codec: Arc<dyn RowCodec>) -> Self {
        Self {
            threshold: settings.buffer_rows.max(1),
            directory: settings.directory.clone(),
            prefix: settings.prefix.clone(),
            codec,
            memory: VecDeque::new(),
            writer: None,
            spilled: 0,
            write_failed: false,
        }
    }

    pub fn set_codec(&mut self, codec: Arc<dyn RowCodec>) {
        self.codec = codec;
    }

    /// Rows currently held in memory.
    #[must_use]
    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    /// Rows written to the spill file for the current group.
    #[must_use]
    pub const fn spilled_len(&self) -> u64 {
        self.spilled
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.spilled + self.memory.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn has_spill_file(&self) -> bool {
        self.writer.is_some()
    }

    /// Accept one row, evicting the oldest in-memory row to disk when the
    /// buffer is full.
    ///
    /// The oldest row leaves memory only once its frame is written. An
    /// encode or create failure leaves the store unchanged; a failed write
    /// leaves it unusable until `clear`.
    pub fn append(&mut self, row: Row) -> Result<(), InternalError> {
        self.ensure_writable()?;

        if self.memory.len() >= self.threshold {
            if let Some(oldest) = self.memory.front() {
                let frame = encode_frame(self.codec.as_ref(), oldest)?;
                self.write_frame(&frame)?;
                self.memory.pop_front();
            }
        }
        self.memory.push_back(row);

        Ok(())
    }

    /// Hand every stored row over to a single-pass drain: spilled rows first,
    /// then in-memory rows, all in append order. The store is empty
    /// afterwards.
    pub fn drain(&mut self) -> Result<SpillDrain, InternalError> {
        self.ensure_writable()?;

        let memory = std::mem::take(&mut self.memory);
        let expected = std::mem::take(&mut self.spilled);

        let reader = match self.writer.take() {
            Some(writer) => {
                let mut file = writer
                    .into_inner()
                    .map_err(|err| SpillError::Write(err.into_error()))?;
                file.rewind().map_err(SpillError::Read)?;

                Some(BufReader::new(file))
            }
            None => None,
        };

        Ok(SpillDrain {
            codec: Arc::clone(&self.codec),
            reader,
            expected,
            read: 0,
            memory,
            failed: false,
        })
    }

    /// Discard all rows and remove the spill file without reading it.
    pub fn clear(&mut self) {
        self.memory.clear();
        self.spilled = 0;
        self.write_failed = false;
        if let Some(writer) = self.writer.take() {
            let (file, _unflushed) = writer.into_parts();
            remove_spill_file(file);
        }
    }

    fn ensure_writable(&self) -> Result<(), InternalError> {
        if self.write_failed {
            return Err(SpillError::Unusable.into());
        }

        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), InternalError> {
        let writer = match self.writer.take() {
            Some(writer) => writer,
            None => BufWriter::new(self.create_file()?),
        };
        let writer = self.writer.insert(writer);
        if let Err(err) = writer.write_all(frame) {
            self.write_failed = true;
            return Err(SpillError::Write(err).into());
        }

        self.spilled += 1;
        sink::record(MetricsEvent::RowsSpilled { rows: 1 });

        Ok(())
    }

    fn create_file(&self) -> Result<NamedTempFile, SpillError> {
        let file = tempfile::Builder::new()
            .prefix(&self.prefix)
            .suffix(SPILL_FILE_SUFFIX)
            .tempfile_in(&self.directory)
            .map_err(|source| SpillError::Create {
                dir: self.directory.clone(),
                source,
            })?;

        tracing::info!(path = %file.path().display(), "created spill file");
        sink::record(MetricsEvent::SpillFileCreated);

        Ok(file)
    }
}

impl Drop for RowSpillStore {
    fn drop(&mut self) {
        self.clear();
    }
}

///
/// SpillDrain
///
/// Single-pass iterator over one group's rows. Owns the spill file and
/// removes it once the spilled frames are exhausted or the drain is dropped.
///

pub struct SpillDrain {
    codec: Arc<dyn RowCodec>,
    reader: Option<BufReader<NamedTempFile>>,
    expected: u64,
    read: u64,
    memory: VecDeque<Row>,
    failed: bool,
}

impl SpillDrain {
    /// Rows not yet yielded.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.expected - self.read + self.memory.len() as u64
    }

    fn next_spilled(&mut self) -> Option<Result<Row, InternalError>> {
        if self.reader.is_some() && self.read == self.expected {
            self.release();
        }
        let reader = self.reader.as_mut()?;

        let frame = read_frame(reader, self.read, self.expected);
        let row = frame.and_then(|bytes| self.codec.decode(&bytes).map_err(InternalError::from));
        self.read += 1;
        if self.read == self.expected {
            self.release();
        }

        Some(row)
    }

    fn release(&mut self) {
        if let Some(reader) = self.reader.take() {
            remove_spill_file(reader.into_inner());
        }
    }
}

impl Iterator for SpillDrain {
    type Item = Result<Row, InternalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        if let Some(result) = self.next_spilled() {
            if result.is_err() {
                self.failed = true;
                self.release();
                self.memory.clear();
            }
            return Some(result);
        }

        self.memory.pop_front().map(Ok)
    }
}

impl Drop for SpillDrain {
    fn drop(&mut self) {
        self.release();
    }
}

// Length-prefixed frame for one row, bounded by the same limit `read_frame`
// enforces.
fn encode_frame(codec: &dyn RowCodec, row: &Row) -> Result<Vec<u8>, InternalError> {
    let bytes = codec.encode(row)?;
    let len = u32::try_from(bytes.len())
        .ok()
        .filter(|_| bytes.len() <= MAX_ROW_BYTES)
        .ok_or(SpillError::FrameTooLarge {
            len: bytes.len(),
            max: MAX_ROW_BYTES,
        })?;

    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + bytes.len());
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&bytes);

    Ok(frame)
}

fn read_frame<R: Read>(
    reader: &mut R,
    read: u64,
    expected: u64,
) -> Result<Vec<u8>, InternalError> {
    let eof = |err: io::Error| -> InternalError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            SpillError::Truncated { read, expected }.into()
        } else {
            SpillError::Read(err).into()
        }
    };

    let mut header = [0u8; FRAME_HEADER_LEN];
    reader.read_exact(&mut header).map_err(eof)?;
    let len = u32::from_le_bytes(header) as usize;
    if len > MAX_ROW_BYTES {
        return Err(SpillError::CorruptFrame {
            len,
            max: MAX_ROW_BYTES,
        }
        .into());
    }

    let mut bytes = vec![0u8; len];
    reader.read_exact(&mut bytes).map_err(eof)?;

    Ok(bytes)
}

fn remove_spill_file(file: NamedTempFile) {
    let path = file.path().to_path_buf();
    match file.close() {
        Ok(()) => {
            tracing::info!(path = %path.display(), "removed spill file");
            sink::record(MetricsEvent::SpillFileRemoved);
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove spill file");
            sink::record(MetricsEvent::SpillCleanupFailed);
        }
    }
}
