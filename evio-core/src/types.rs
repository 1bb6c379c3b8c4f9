//! Core types for EVIO event records.
//!
//! This module defines the schema versions, the logical event types and the
//! tag tables used to map raw header tags onto them.

use std::fmt;

/// Size of one EVIO word in bytes.
pub const WORD_BYTES: u64 = 4;

/// Default capacity of the record staging buffer, in words (400 KiB).
pub const MAX_EVENT_WORDS: usize = 102_400;

/// Highest v2 event type code that still counts as a physics event.
pub const MAX_PHYSICS_TYPE: u16 = 14;

/// Event type code given to every physics event in a v3 stream.
pub const V3_PHYSICS_TYPE: u8 = 1;

/// On-disk schema generation of an EVIO stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaVersion {
    /// EVIO version 2: the tag is the event type itself
    V2,
    /// EVIO version 3: the tag is a CODA 3 bank tag
    V3,
}

impl SchemaVersion {
    /// Returns the numeric version as reported by the file.
    pub fn number(self) -> u32 {
        match self {
            Self::V2 => 2,
            Self::V3 => 3,
        }
    }
}

impl TryFrom<u32> for SchemaVersion {
    type Error = u32;

    /// Accepts only versions 2 and 3, handing back anything else.
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Self::V2),
            3 => Ok(Self::V3),
            other => Err(other),
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Logical classification of one record.
///
/// Physics events carry their numeric type code (0-14 under v2, always 1
/// under v3). Control and auxiliary types use the Hall A constants; any other
/// v2 code is kept verbatim in [`EventType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    Physics(u8),
    Sync,
    Prestart,
    Go,
    Pause,
    End,
    TsPrescale,
    Epics,
    Prescale,
    DetectorMap,
    TriggerFile,
    Scaler,
    Other(u16),
}

/// Named v2 control and auxiliary event types.
pub const CONTROL_TYPES: &[(u16, EventType)] = &[
    (16, EventType::Sync),
    (17, EventType::Prestart),
    (18, EventType::Go),
    (19, EventType::Pause),
    (20, EventType::End),
    (120, EventType::TsPrescale),
    (131, EventType::Epics),
    (133, EventType::Prescale),
    (135, EventType::DetectorMap),
    (136, EventType::TriggerFile),
    (140, EventType::Scaler),
];

/// CODA 3 bank tags understood in v3 streams.
///
/// The three physics tags (plain, with sync bit, and 0xff70) are treated as
/// the same logical type.
pub const V3_TAG_TABLE: &[(u16, EventType)] = &[
    (0xffd1, EventType::Prestart),
    (0xffd2, EventType::Go),
    (0xffd4, EventType::End),
    (0xff50, EventType::Physics(V3_PHYSICS_TYPE)),
    (0xff58, EventType::Physics(V3_PHYSICS_TYPE)),
    (0xff70, EventType::Physics(V3_PHYSICS_TYPE)),
];

impl EventType {
    /// Interprets a v2 tag as an event type code.
    #[inline]
    pub fn from_v2_code(code: u16) -> Self {
        if code <= MAX_PHYSICS_TYPE {
            return Self::Physics(code as u8);
        }
        CONTROL_TYPES
            .iter()
            .find(|(c, _)| *c == code)
            .map(|(_, t)| *t)
            .unwrap_or(Self::Other(code))
    }

    /// Looks up a v3 bank tag. Returns `None` for tags outside the table.
    #[inline]
    pub fn from_v3_tag(tag: u16) -> Option<Self> {
        V3_TAG_TABLE
            .iter()
            .find(|(t, _)| *t == tag)
            .map(|(_, event_type)| *event_type)
    }

    /// Returns the numeric event type code.
    pub fn code(self) -> u16 {
        match self {
            Self::Physics(code) => code as u16,
            Self::Other(code) => code,
            named => CONTROL_TYPES
                .iter()
                .find(|(_, t)| *t == named)
                .map(|(c, _)| *c)
                .unwrap_or_default(),
        }
    }

    /// True for primary data events.
    #[inline]
    pub fn is_physics(self) -> bool {
        matches!(self, Self::Physics(_))
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Physics(code) => write!(f, "physics({})", code),
            Self::Other(code) => write!(f, "type {}", code),
            named => write!(f, "{:?}", named),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_version_parsing() {
        assert_eq!(SchemaVersion::try_from(2), Ok(SchemaVersion::V2));
        assert_eq!(SchemaVersion::try_from(3), Ok(SchemaVersion::V3));
        assert_eq!(SchemaVersion::try_from(1), Err(1));
        assert_eq!(SchemaVersion::try_from(4), Err(4));
    }

    #[test]
    fn test_v2_physics_boundary() {
        for code in 0..=MAX_PHYSICS_TYPE {
            assert_eq!(EventType::from_v2_code(code), EventType::Physics(code as u8));
        }
        assert!(!EventType::from_v2_code(15).is_physics());
        assert_eq!(EventType::from_v2_code(15), EventType::Other(15));
    }

    #[test]
    fn test_v2_control_types() {
        assert_eq!(EventType::from_v2_code(16), EventType::Sync);
        assert_eq!(EventType::from_v2_code(20), EventType::End);
        assert_eq!(EventType::from_v2_code(140), EventType::Scaler);
        assert_eq!(EventType::from_v2_code(132), EventType::Other(132));
    }

    #[test]
    fn test_code_round_trips_named_types() {
        for &(code, event_type) in CONTROL_TYPES {
            assert_eq!(event_type.code(), code);
        }
        assert_eq!(EventType::Physics(7).code(), 7);
    }

    #[test]
    fn test_v3_tag_lookup() {
        assert_eq!(EventType::from_v3_tag(0xffd1), Some(EventType::Prestart));
        assert_eq!(EventType::from_v3_tag(0xff58), Some(EventType::Physics(1)));
        assert_eq!(EventType::from_v3_tag(0xffd3), None);
        assert_eq!(EventType::from_v3_tag(0x0000), None);
    }
}
