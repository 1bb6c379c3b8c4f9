//! Streaming aggregation over one or more record sources.
//!
//! [`StreamAggregator`] opens each source in turn, classifies every record
//! and folds it into a single [`RunningStatistics`] shared by the whole run.
//! The first error aborts the run.

use crate::buffer::RecordBuffer;
use crate::classifier::{classify, Classification, ClassifyError};
use crate::report::Report;
use crate::source::{ReadStatus, RecordSource, SourceError, SourceOpener};
use crate::types::{SchemaVersion, MAX_EVENT_WORDS};
use log::{debug, warn};
use std::time::Instant;
use thiserror::Error;

/// Tunables for a stream run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConfig {
    /// Capacity of the record buffer in words; longer records are rejected
    pub capacity_words: usize,
    /// Physics event numbers divisible by this are reported as milestones.
    /// Zero disables milestones.
    pub milestone_interval: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            capacity_words: MAX_EVENT_WORDS,
            milestone_interval: 25_000,
        }
    }
}

/// Counters accumulated over every record of a run.
///
/// Lengths are in words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningStatistics {
    pub records: u64,
    pub physics_records: u64,
    pub total_words: u64,
    min_physics_len: u64,
    pub max_physics_len: u64,
    /// Longest record of any type
    pub max_len: u64,
    /// Last known physics event number
    pub last_event: u32,
}

impl Default for RunningStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl RunningStatistics {
    pub fn new() -> Self {
        Self {
            records: 0,
            physics_records: 0,
            total_words: 0,
            min_physics_len: u64::MAX,
            max_physics_len: 0,
            max_len: 0,
            last_event: 0,
        }
    }

    /// Shortest physics record, or `None` before the first one.
    pub fn min_physics_len(&self) -> Option<u64> {
        (self.physics_records > 0).then_some(self.min_physics_len)
    }

    /// Classifies a staged record against the current event counter and
    /// folds it in. Nothing is counted if classification fails.
    pub fn fold(
        &mut self,
        record: &[u32],
        version: SchemaVersion,
        capacity: usize,
    ) -> Result<Classification, ClassifyError> {
        let classified = classify(record, version, capacity, self.last_event)?;
        self.update(&classified);
        Ok(classified)
    }

    /// Folds one classified record into the counters.
    pub fn update(&mut self, record: &Classification) {
        self.records += 1;
        self.total_words += record.length;
        self.max_len = self.max_len.max(record.length);

        if record.is_physics() {
            self.physics_records += 1;
            self.min_physics_len = self.min_physics_len.min(record.length);
            self.max_physics_len = self.max_physics_len.max(record.length);
            if let Some(number) = record.event_number {
                self.last_event = number;
            }
        }
    }
}

/// Receives progress notifications during a run.
///
/// All methods default to doing nothing.
pub trait StreamObserver {
    fn source_opened(&mut self, _name: &str) {}

    fn version(&mut self, _name: &str, _version: SchemaVersion) {}

    fn milestone(&mut self, _event_number: u32) {}

    fn source_finished(&mut self, _name: &str) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl StreamObserver for NoopObserver {}

/// Category of a run failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    OpenFailure,
    UnsupportedVersion,
    ReadFailure,
    BufferOverflow,
    UnrecognizedTag,
    MalformedRecord,
}

/// Cause of a run failure.
#[derive(Error, Debug)]
pub enum Failure {
    #[error("cannot open source: {0}")]
    Open(#[source] SourceError),

    #[error("EVIO version {0} is not supported")]
    UnsupportedVersion(u32),

    #[error("read failed: {0}")]
    Read(#[source] SourceError),

    #[error("{0}")]
    Record(#[source] ClassifyError),
}

/// A fatal error, with the last physics event number seen before it.
#[derive(Error, Debug)]
#[error("ERROR at event={last_event}: {source_name}: {failure}")]
pub struct StreamError {
    pub last_event: u32,
    pub source_name: String,
    #[source]
    pub failure: Failure,
}

impl StreamError {
    pub fn kind(&self) -> ErrorKind {
        match &self.failure {
            Failure::Open(_) => ErrorKind::OpenFailure,
            Failure::UnsupportedVersion(_) => ErrorKind::UnsupportedVersion,
            Failure::Read(_) => ErrorKind::ReadFailure,
            Failure::Record(ClassifyError::BufferOverflow { .. }) => ErrorKind::BufferOverflow,
            Failure::Record(ClassifyError::UnrecognizedTag { .. }) => ErrorKind::UnrecognizedTag,
            Failure::Record(ClassifyError::MalformedRecord { .. }) => ErrorKind::MalformedRecord,
        }
    }
}

/// Drives sources, classification and statistics for one run.
#[derive(Debug)]
pub struct StreamAggregator {
    config: StreamConfig,
    stats: RunningStatistics,
    buffer: RecordBuffer,
}

impl Default for StreamAggregator {
    fn default() -> Self {
        Self::new(StreamConfig::default())
    }
}

impl StreamAggregator {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            config,
            stats: RunningStatistics::new(),
            buffer: RecordBuffer::new(config.capacity_words),
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    pub fn statistics(&self) -> &RunningStatistics {
        &self.stats
    }

    /// Processes every named source in order and reports the combined totals.
    ///
    /// Wall time is measured from before the first open to after the last
    /// close. On error the open source is closed and no report is produced.
    pub fn process_all<O, N, B>(
        mut self,
        opener: &mut O,
        names: &[N],
        observer: &mut B,
    ) -> Result<Report, StreamError>
    where
        O: SourceOpener,
        N: AsRef<str>,
        B: StreamObserver + ?Sized,
    {
        let start = Instant::now();
        for name in names {
            self.process_source(opener, name.as_ref(), observer)?;
        }
        let elapsed = start.elapsed();
        Ok(Report::new(names.len(), self.stats, elapsed))
    }

    /// Classifies one record and folds it into the statistics.
    pub fn fold(
        &mut self,
        record: &[u32],
        version: SchemaVersion,
    ) -> Result<Classification, ClassifyError> {
        self.stats.fold(record, version, self.buffer.capacity())
    }

    fn process_source<O, B>(
        &mut self,
        opener: &mut O,
        name: &str,
        observer: &mut B,
    ) -> Result<(), StreamError>
    where
        O: SourceOpener,
        B: StreamObserver + ?Sized,
    {
        let mut source = opener
            .open(name)
            .map_err(|e| self.fail(name, Failure::Open(e)))?;
        debug!("opened {}", name);
        observer.source_opened(name);

        let streamed = self.stream_source(&mut source, name, observer);
        let closed = source.close();
        streamed?;
        closed.map_err(|e| self.fail(name, Failure::Read(e)))?;

        debug!("end of {} ({} records so far)", name, self.stats.records);
        observer.source_finished(name);
        Ok(())
    }

    fn stream_source<S, B>(
        &mut self,
        source: &mut S,
        name: &str,
        observer: &mut B,
    ) -> Result<(), StreamError>
    where
        S: RecordSource,
        B: StreamObserver + ?Sized,
    {
        let raw = source
            .version()
            .map_err(|e| self.fail(name, Failure::Open(e)))?;
        let version = SchemaVersion::try_from(raw)
            .map_err(|v| self.fail(name, Failure::UnsupportedVersion(v)))?;
        debug!("{}: EVIO version {}", name, version);
        observer.version(name, version);

        loop {
            match source.read_next(&mut self.buffer) {
                Ok(ReadStatus::Record) => {}
                Ok(ReadStatus::EndOfStream) => return Ok(()),
                Err(e) => return Err(self.fail(name, Failure::Read(e))),
            }

            let classified = self
                .stats
                .fold(self.buffer.words(), version, self.buffer.capacity())
                .map_err(|e| self.fail(name, Failure::Record(e)))?;

            if let Some(number) = classified.event_number {
                let interval = self.config.milestone_interval;
                if interval != 0 && number % interval == 0 {
                    observer.milestone(number);
                }
            }
        }
    }

    fn fail(&self, name: &str, failure: Failure) -> StreamError {
        warn!(
            "aborting at event {} in {}: {}",
            self.stats.last_event, name, failure
        );
        StreamError {
            last_event: self.stats.last_event,
            source_name: name.to_string(),
            failure,
        }
    }
}
