//! EVIO event-stream reader and statistics library.
//!
//! This crate reads the length-prefixed event records of EVIO v2 and v3
//! files (CODA data acquisition), classifies each record by its header tag
//! and accumulates stream statistics across one or more files.
//!
//! # Example
//!
//! ```no_run
//! use evio_core::{EvioFileOpener, NoopObserver, StreamAggregator};
//!
//! let report = StreamAggregator::default()
//!     .process_all(&mut EvioFileOpener, &["run_1234.dat"], &mut NoopObserver)
//!     .unwrap();
//!
//! println!("{} events, {} physics", report.statistics.records, report.statistics.physics_records);
//! ```
//!
//! # Features
//!
//! - EVIO v1-3 block files in either byte order, events spanning blocks
//! - v2 event types and CODA 3 bank tags mapped onto one classification
//! - Hard record size limit checked before any other field is read
//! - One combined report over several files

pub mod aggregator;
pub mod buffer;
pub mod classifier;
pub mod parser;
pub mod report;
pub mod source;
pub mod types;

// Re-export commonly used types
pub use aggregator::{
    ErrorKind, Failure, NoopObserver, RunningStatistics, StreamAggregator, StreamConfig,
    StreamError, StreamObserver,
};
pub use buffer::RecordBuffer;
pub use classifier::{classify, Classification, ClassifyError};
pub use report::{write_report, Report, ReportError};
pub use source::{
    EvioFileOpener, EvioFileSource, MemoryOpener, MemorySource, ReadStatus, RecordSource,
    SourceError, SourceOpener,
};
pub use types::{EventType, SchemaVersion, MAX_EVENT_WORDS};
