//! Run summary and its human-readable rendering.

use crate::aggregator::RunningStatistics;
use crate::types::WORD_BYTES;
use std::io::{self, Write};
use std::time::Duration;
use thiserror::Error;

const MIB: f64 = 1024.0 * 1024.0;

/// Errors raised when a derived quantity cannot be computed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReportError {
    #[error("{quantity} is not computable: {reason}")]
    DivisionUndefined {
        quantity: &'static str,
        reason: &'static str,
    },
}

/// Final statistics of a completed run.
#[derive(Debug, Clone)]
pub struct Report {
    /// Number of sources processed
    pub files: usize,
    pub statistics: RunningStatistics,
    /// Wall time from before the first open to after the last close
    pub elapsed: Duration,
}

impl Report {
    pub fn new(files: usize, statistics: RunningStatistics, elapsed: Duration) -> Self {
        Self {
            files,
            statistics,
            elapsed,
        }
    }

    pub fn total_bytes(&self) -> u64 {
        WORD_BYTES * self.statistics.total_words
    }

    pub fn total_mib(&self) -> f64 {
        self.total_bytes() as f64 / MIB
    }

    pub fn min_physics_bytes(&self) -> Option<u64> {
        self.statistics
            .min_physics_len()
            .map(|len| WORD_BYTES * len)
    }

    pub fn max_physics_bytes(&self) -> u64 {
        WORD_BYTES * self.statistics.max_physics_len
    }

    pub fn max_event_bytes(&self) -> u64 {
        WORD_BYTES * self.statistics.max_len
    }

    /// Mean record size in bytes.
    pub fn average_event_bytes(&self) -> Result<f64, ReportError> {
        let records = self.records("average event length")?;
        Ok(self.total_bytes() as f64 / records)
    }

    /// Wall time per record in microseconds.
    pub fn micros_per_event(&self) -> Result<f64, ReportError> {
        let records = self.records("time per event")?;
        Ok(1e6 * self.elapsed.as_secs_f64() / records)
    }

    /// Bytes read per second of wall time.
    pub fn bytes_per_second(&self) -> Result<f64, ReportError> {
        self.records("throughput")?;
        let seconds = self.elapsed.as_secs_f64();
        if seconds <= 0.0 {
            return Err(ReportError::DivisionUndefined {
                quantity: "throughput",
                reason: "no wall time elapsed",
            });
        }
        Ok(self.total_bytes() as f64 / seconds)
    }

    pub fn mib_per_second(&self) -> Result<f64, ReportError> {
        Ok(self.bytes_per_second()? / MIB)
    }

    fn records(&self, quantity: &'static str) -> Result<f64, ReportError> {
        if self.statistics.records == 0 {
            return Err(ReportError::DivisionUndefined {
                quantity,
                reason: "no events read",
            });
        }
        Ok(self.statistics.records as f64)
    }
}

/// Writes the multi-line run summary.
pub fn write_report<W: Write>(mut writer: W, report: &Report) -> io::Result<()> {
    let stats = &report.statistics;
    writeln!(
        writer,
        "{} file{} analyzed",
        report.files,
        if report.files == 1 { "" } else { "s" }
    )?;
    writeln!(writer, "{} events", stats.records)?;
    writeln!(writer, "{} physics events", stats.physics_records)?;
    writeln!(
        writer,
        "{} bytes read ({:.3} MiB)",
        report.total_bytes(),
        report.total_mib()
    )?;
    let min_physics = report
        .min_physics_bytes()
        .map_or_else(|| "-".to_string(), |b| b.to_string());
    writeln!(
        writer,
        "{}/{}/{} bytes min_physics/max_physics/max event lengths",
        min_physics,
        report.max_physics_bytes(),
        report.max_event_bytes()
    )?;
    write_derived(
        &mut writer,
        report.average_event_bytes(),
        1,
        "bytes average event length",
    )?;
    writeln!(
        writer,
        "{:.6} seconds wall time",
        report.elapsed.as_secs_f64()
    )?;
    write_derived(&mut writer, report.micros_per_event(), 4, "µs/event")?;
    write_derived(&mut writer, report.mib_per_second(), 2, "MiB/s throughput")?;
    writer.flush()
}

fn write_derived<W: Write>(
    writer: &mut W,
    value: Result<f64, ReportError>,
    precision: usize,
    label: &str,
) -> io::Result<()> {
    match value {
        Ok(v) => writeln!(writer, "{:.*} {}", precision, v, label),
        Err(e) => writeln!(writer, "not computable {} ({})", label, e),
    }
}
