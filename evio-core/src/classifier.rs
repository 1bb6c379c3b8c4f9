//! Classification of raw records.
//!
//! [`classify`] turns one staged record into its logical event type, its
//! length and, for physics events, its event number. It is a pure function:
//! the running event counter is passed in and the caller stores the result.

use crate::parser;
use crate::types::{EventType, SchemaVersion};
use thiserror::Error;

/// Errors that make a record unusable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassifyError {
    #[error("Buffer overflow: event length {length} words exceeds capacity {capacity}")]
    BufferOverflow { length: u64, capacity: usize },

    #[error("Undefined CODA 3 event type: bank_tag = {tag:#x}")]
    UnrecognizedTag { tag: u16 },

    #[error("Malformed record: need word {index}, only {available} words present")]
    MalformedRecord { index: usize, available: usize },
}

/// Result of classifying one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub event_type: EventType,
    /// Raw tag from word 1
    pub tag: u16,
    /// Record length in words, length word included
    pub length: u64,
    /// Event number; `Some` only for physics events
    pub event_number: Option<u32>,
}

impl Classification {
    #[inline]
    pub fn is_physics(&self) -> bool {
        self.event_type.is_physics()
    }
}

/// Classifies a staged record.
///
/// The declared length is checked against `capacity` before any other word
/// is read. `last_event` is the last known physics event number; v3 streams
/// carry none, so their physics events are numbered `last_event + 1`.
pub fn classify(
    record: &[u32],
    version: SchemaVersion,
    capacity: usize,
    last_event: u32,
) -> Result<Classification, ClassifyError> {
    let length = parser::record_length(word(record, parser::LENGTH_WORD)?);
    if length > capacity as u64 {
        return Err(ClassifyError::BufferOverflow { length, capacity });
    }

    let tag = parser::header_tag(word(record, parser::TAG_WORD)?);
    let event_type = match version {
        SchemaVersion::V2 => EventType::from_v2_code(tag),
        SchemaVersion::V3 => {
            EventType::from_v3_tag(tag).ok_or(ClassifyError::UnrecognizedTag { tag })?
        }
    };

    let event_number = if event_type.is_physics() {
        Some(match version {
            SchemaVersion::V2 => word(record, parser::EVENT_NUMBER_WORD)?,
            SchemaVersion::V3 => last_event.wrapping_add(1),
        })
    } else {
        None
    };

    Ok(Classification {
        event_type,
        tag,
        length,
        event_number,
    })
}

#[inline]
fn word(record: &[u32], index: usize) -> Result<u32, ClassifyError> {
    record
        .get(index)
        .copied()
        .ok_or(ClassifyError::MalformedRecord {
            index,
            available: record.len(),
        })
}
