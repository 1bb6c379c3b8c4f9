//! Integration tests reading synthetic EVIO files from disk.
//!
//! Run with: cargo test --test integration_tests

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use evio_core::parser::{BLOCK_HEADER_WORDS, BLOCK_MAGIC};
use evio_core::{
    ErrorKind, EvioFileOpener, NoopObserver, Report, ReportError, StreamAggregator, StreamConfig,
};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Builds a record of `length` words with `tag` in word 1 and, where the
/// record is long enough, `event_number` in word 4.
fn event(length: usize, tag: u16, event_number: u32) -> Vec<u32> {
    let mut words = vec![0u32; length];
    words[0] = length as u32 - 1;
    words[1] = ((tag as u32) << 16) | 0x10cc;
    if length > 4 {
        words[4] = event_number;
    }
    words
}

/// Writes `events` as an EVIO block file with fixed-size blocks.
fn write_evio(
    path: &Path,
    version: u32,
    events: &[Vec<u32>],
    block_words: usize,
    little_endian: bool,
) {
    let stream: Vec<u32> = events.iter().flatten().copied().collect();
    let payload_per_block = block_words - BLOCK_HEADER_WORDS;
    let mut blocks: Vec<Vec<u32>> = stream
        .chunks(payload_per_block)
        .enumerate()
        .map(|(i, chunk)| {
            let mut block = vec![
                block_words as u32,
                i as u32 + 1,
                BLOCK_HEADER_WORDS as u32,
                BLOCK_HEADER_WORDS as u32,
                (BLOCK_HEADER_WORDS + chunk.len()) as u32,
                version,
                0,
                BLOCK_MAGIC,
            ];
            block.extend_from_slice(chunk);
            block.resize(block_words, 0);
            block
        })
        .collect();
    if blocks.is_empty() {
        let mut block = vec![
            block_words as u32,
            1,
            BLOCK_HEADER_WORDS as u32,
            0,
            BLOCK_HEADER_WORDS as u32,
            version,
            0,
            BLOCK_MAGIC,
        ];
        block.resize(block_words, 0);
        blocks.push(block);
    }

    let mut writer = BufWriter::new(File::create(path).unwrap());
    for word in blocks.iter().flatten() {
        if little_endian {
            writer.write_u32::<LittleEndian>(*word).unwrap();
        } else {
            writer.write_u32::<BigEndian>(*word).unwrap();
        }
    }
    writer.flush().unwrap();
}

fn path_str(path: &Path) -> String {
    path.to_str().unwrap().to_string()
}

fn run(names: &[String]) -> Result<Report, evio_core::StreamError> {
    StreamAggregator::default().process_all(&mut EvioFileOpener, names, &mut NoopObserver)
}

fn v2_sample(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("sample_v2.dat");
    let events = vec![event(2, 16, 0), event(10, 0, 1), event(20, 0, 2)];
    write_evio(&path, 2, &events, 2048, false);
    path
}

#[test]
fn test_end_to_end_v2_stream() {
    let dir = TempDir::new().unwrap();
    let path = v2_sample(&dir);

    let report = run(&[path_str(&path)]).unwrap();
    let stats = &report.statistics;
    assert_eq!(report.files, 1);
    assert_eq!(stats.records, 3);
    assert_eq!(stats.physics_records, 2);
    assert_eq!(stats.min_physics_len(), Some(10));
    assert_eq!(stats.max_physics_len, 20);
    assert_eq!(stats.total_words, 32);
    assert_eq!(stats.last_event, 2);
    assert_eq!(report.total_bytes(), 128);
}

#[test]
fn test_v3_numbering_continues_across_files() {
    let dir = TempDir::new().unwrap();
    let first = dir.path().join("run_a.dat");
    let second = dir.path().join("run_b.dat");
    write_evio(
        &first,
        3,
        &[event(3, 0xffd1, 0), event(3, 0xffd2, 0), event(12, 0xff50, 0)],
        64,
        false,
    );
    // Little-endian, small blocks so events cross block boundaries
    write_evio(
        &second,
        3,
        &[event(7, 0xff58, 0), event(9, 0xff70, 0), event(2, 0xffd4, 0)],
        12,
        true,
    );

    let report = run(&[path_str(&first), path_str(&second)]).unwrap();
    let stats = &report.statistics;
    assert_eq!(report.files, 2);
    assert_eq!(stats.records, 6);
    assert_eq!(stats.physics_records, 3);
    assert_eq!(stats.last_event, 3);
    assert_eq!(stats.min_physics_len(), Some(7));
    assert_eq!(stats.max_physics_len, 12);
    assert_eq!(stats.total_words, 3 + 3 + 12 + 7 + 9 + 2);
}

#[test]
fn test_totals_are_additive_over_files() {
    let dir = TempDir::new().unwrap();
    let a = dir.path().join("a.dat");
    let b = dir.path().join("b.dat");
    write_evio(&a, 2, &[event(6, 3, 100), event(2, 17, 0)], 256, false);
    write_evio(&b, 2, &[event(8, 0, 200), event(5, 14, 201), event(2, 20, 0)], 256, false);

    let combined = run(&[path_str(&a), path_str(&b)]).unwrap().statistics;
    let only_a = run(&[path_str(&a)]).unwrap().statistics;
    let only_b = run(&[path_str(&b)]).unwrap().statistics;
    let reversed = run(&[path_str(&b), path_str(&a)]).unwrap().statistics;

    assert_eq!(combined.records, only_a.records + only_b.records);
    assert_eq!(combined.physics_records, only_a.physics_records + only_b.physics_records);
    assert_eq!(combined.total_words, only_a.total_words + only_b.total_words);
    assert_eq!(combined.records, reversed.records);
    assert_eq!(combined.total_words, reversed.total_words);
    assert_eq!(combined.max_len, reversed.max_len);
    assert_eq!(combined.last_event, 201);
    assert_eq!(reversed.last_event, 100);
}

#[test]
fn test_unsupported_version_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("v4.dat");
    write_evio(&path, 4, &[event(2, 16, 0)], 64, false);

    let err = run(&[path_str(&path)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
    assert!(err.to_string().contains("version 4"));
}

#[test]
fn test_over_length_record_rejected_before_tag() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("corrupt.dat");
    // One physics event, then a record declaring 64 words with an unmapped
    // v3 tag in word 1.
    write_evio(&path, 3, &[event(5, 0xff50, 0), event(64, 0xbeef, 0)], 128, false);

    let config = StreamConfig {
        capacity_words: 32,
        ..StreamConfig::default()
    };
    let err = StreamAggregator::new(config)
        .process_all(&mut EvioFileOpener, &[path_str(&path)], &mut NoopObserver)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BufferOverflow);
    assert_eq!(err.last_event, 1);
}

#[test]
fn test_missing_file_is_open_failure() {
    let dir = TempDir::new().unwrap();
    let good = v2_sample(&dir);
    let missing = dir.path().join("does_not_exist.dat");

    let err = run(&[path_str(&good), path_str(&missing)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OpenFailure);
    assert_eq!(err.last_event, 2);
    assert!(err.to_string().starts_with("ERROR at event=2:"));
}

#[test]
fn test_truncated_file_is_read_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("truncated.dat");
    // 20 words over 8-word payloads: blocks of 8, 8 and 4 payload words
    write_evio(&path, 2, &[event(10, 1, 9), event(10, 1, 10)], 16, false);
    // Drop the last block so the second event ends mid-record
    let mut data = std::fs::read(&path).unwrap();
    data.truncate(2 * 16 * 4);
    std::fs::write(&path, data).unwrap();

    let err = run(&[path_str(&path)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReadFailure);
    assert_eq!(err.last_event, 9);
}

#[test]
fn test_empty_stream_reports_undefined_averages() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.dat");
    write_evio(&path, 2, &[], 16, false);

    let report = run(&[path_str(&path)]).unwrap();
    assert_eq!(report.statistics.records, 0);
    assert!(matches!(
        report.average_event_bytes(),
        Err(ReportError::DivisionUndefined { .. })
    ));
    assert!(matches!(
        report.micros_per_event(),
        Err(ReportError::DivisionUndefined { .. })
    ));
    assert!(matches!(
        report.mib_per_second(),
        Err(ReportError::DivisionUndefined { .. })
    ));
}

#[test]
fn test_non_evio_file_is_open_failure() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("text.dat");
    std::fs::write(&path, b"this is not an evio file, just some text").unwrap();

    let err = run(&[path_str(&path)]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OpenFailure);
}
