//! Record sources feeding the stream aggregator.
//!
//! A [`RecordSource`] yields one raw record per call into a caller-owned
//! [`RecordBuffer`]. [`EvioFileSource`] reads the blocked EVIO v1-3 file
//! layout; [`MemorySource`] serves prepared records.

use crate::buffer::RecordBuffer;
use crate::parser;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::{debug, trace};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::rc::Rc;
use thiserror::Error;

/// Errors raised by record sources.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid file format: {0}")]
    InvalidFormat(String),

    #[error("Unexpected end of file inside an event")]
    UnexpectedEof,

    #[error("No such source: {0}")]
    NotFound(String),

    #[error("Source is closed")]
    Closed,
}

/// Outcome of a successful [`RecordSource::read_next`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// A record has been staged in the buffer
    Record,
    /// The source holds no further records
    EndOfStream,
}

/// A stream of length-prefixed records.
pub trait RecordSource {
    /// Raw format version reported by the source.
    fn version(&self) -> Result<u32, SourceError>;

    /// Stages the next record in `buffer`.
    ///
    /// At most `buffer.capacity()` words are staged. Word 0 is always staged
    /// so an over-length record can be recognised by its declared length.
    fn read_next(&mut self, buffer: &mut RecordBuffer) -> Result<ReadStatus, SourceError>;

    /// Releases the underlying resource. Further reads fail.
    fn close(&mut self) -> Result<(), SourceError> {
        Ok(())
    }
}

/// Opens record sources by name.
pub trait SourceOpener {
    type Source: RecordSource;

    fn open(&mut self, name: &str) -> Result<Self::Source, SourceError>;
}

// ============================================================================
// EVIO block files
// ============================================================================

/// Byte order of an EVIO file, detected from the block magic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

impl Endian {
    /// Detects the byte order from the four bytes of a magic word.
    pub fn detect(magic: &[u8]) -> Result<Self, SourceError> {
        if BigEndian::read_u32(magic) == parser::BLOCK_MAGIC {
            Ok(Self::Big)
        } else if LittleEndian::read_u32(magic) == parser::BLOCK_MAGIC {
            Ok(Self::Little)
        } else {
            Err(SourceError::InvalidFormat(format!(
                "bad block magic {:#010x}",
                BigEndian::read_u32(magic)
            )))
        }
    }

    #[inline]
    fn read_words(self, src: &[u8], dst: &mut [u32]) {
        match self {
            Self::Big => BigEndian::read_u32_into(src, dst),
            Self::Little => LittleEndian::read_u32_into(src, dst),
        }
    }
}

const HEADER_BYTES: usize = parser::BLOCK_HEADER_WORDS * 4;

/// Reader for EVIO v1-3 block files.
///
/// Events are laid out back to back over the payloads of consecutive blocks
/// and may cross block boundaries.
#[derive(Debug)]
pub struct EvioFileSource<R = BufReader<File>> {
    reader: Option<R>,
    endian: Endian,
    version: u32,
    /// Payload words of the current block
    block: Vec<u32>,
    pos: usize,
    scratch: Vec<u8>,
    blocks_read: u64,
}

impl EvioFileSource<BufReader<File>> {
    /// Opens an EVIO file and reads its first block.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let file = File::open(path.as_ref())?;
        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read> EvioFileSource<R> {
    /// Wraps a reader positioned at the start of an EVIO stream.
    pub fn from_reader(mut reader: R) -> Result<Self, SourceError> {
        let mut raw = [0u8; HEADER_BYTES];
        if fill(&mut reader, &mut raw)? < HEADER_BYTES {
            return Err(SourceError::InvalidFormat(
                "file too short for a block header".to_string(),
            ));
        }
        let magic_at = parser::BLOCK_MAGIC_WORD * 4;
        let endian = Endian::detect(&raw[magic_at..magic_at + 4])?;

        let mut source = Self {
            reader: Some(reader),
            endian,
            version: 0,
            block: Vec::new(),
            pos: 0,
            scratch: Vec::new(),
            blocks_read: 0,
        };
        let header = source.decode_header(&raw)?;
        source.version = parser::block_version(header[parser::BLOCK_VERSION]);
        source.load_block(&header)?;
        debug!(
            "EVIO stream: version {}, {:?} endian",
            source.version, source.endian
        );
        Ok(source)
    }

    /// Number of blocks loaded so far.
    pub fn blocks_read(&self) -> u64 {
        self.blocks_read
    }

    fn decode_header(
        &self,
        raw: &[u8; HEADER_BYTES],
    ) -> Result<[u32; parser::BLOCK_HEADER_WORDS], SourceError> {
        let mut header = [0u32; parser::BLOCK_HEADER_WORDS];
        self.endian.read_words(raw, &mut header);
        if header[parser::BLOCK_MAGIC_WORD] != parser::BLOCK_MAGIC {
            return Err(SourceError::InvalidFormat(format!(
                "bad magic {:#010x} in block {}",
                header[parser::BLOCK_MAGIC_WORD],
                header[parser::BLOCK_NUMBER]
            )));
        }
        Ok(header)
    }

    /// Reads the rest of a block whose header has been decoded.
    fn load_block(
        &mut self,
        header: &[u32; parser::BLOCK_HEADER_WORDS],
    ) -> Result<(), SourceError> {
        let size = header[parser::BLOCK_SIZE] as usize;
        let header_len = header[parser::BLOCK_HEADER_LENGTH] as usize;
        let used = header[parser::BLOCK_USED] as usize;
        if header_len < parser::BLOCK_HEADER_WORDS
            || size < header_len
            || used > size
            || used < header_len
        {
            return Err(SourceError::InvalidFormat(format!(
                "inconsistent block header: size={} header={} used={}",
                size, header_len, used
            )));
        }

        let reader = self.reader.as_mut().ok_or(SourceError::Closed)?;
        let body_bytes = (size - parser::BLOCK_HEADER_WORDS) * 4;
        self.scratch.clear();
        reader
            .by_ref()
            .take(body_bytes as u64)
            .read_to_end(&mut self.scratch)?;
        if self.scratch.len() < body_bytes {
            return Err(SourceError::InvalidFormat(format!(
                "block {} truncated: expected {} bytes, got {}",
                header[parser::BLOCK_NUMBER],
                body_bytes,
                self.scratch.len()
            )));
        }

        // Skip any extended header words, keep only the used payload.
        let skip = (header_len - parser::BLOCK_HEADER_WORDS) * 4;
        let payload_words = used - header_len;
        self.block.resize(payload_words, 0);
        self.endian
            .read_words(&self.scratch[skip..skip + payload_words * 4], &mut self.block);
        self.pos = 0;
        self.blocks_read += 1;
        trace!(
            "loaded block {} ({} payload words)",
            header[parser::BLOCK_NUMBER],
            payload_words
        );
        Ok(())
    }

    /// Returns the next payload word, or `None` at a clean end of file.
    fn next_word(&mut self) -> Result<Option<u32>, SourceError> {
        while self.pos >= self.block.len() {
            let reader = self.reader.as_mut().ok_or(SourceError::Closed)?;
            let mut raw = [0u8; HEADER_BYTES];
            match fill(reader, &mut raw)? {
                0 => return Ok(None),
                HEADER_BYTES => {}
                n => {
                    return Err(SourceError::InvalidFormat(format!(
                        "truncated block header ({} bytes)",
                        n
                    )))
                }
            }
            let header = self.decode_header(&raw)?;
            self.load_block(&header)?;
        }
        let word = self.block[self.pos];
        self.pos += 1;
        Ok(Some(word))
    }
}

impl<R: Read> RecordSource for EvioFileSource<R> {
    fn version(&self) -> Result<u32, SourceError> {
        if self.reader.is_none() {
            return Err(SourceError::Closed);
        }
        Ok(self.version)
    }

    fn read_next(&mut self, buffer: &mut RecordBuffer) -> Result<ReadStatus, SourceError> {
        buffer.clear();
        if self.reader.is_none() {
            return Err(SourceError::Closed);
        }
        let first = match self.next_word()? {
            Some(word) => word,
            None => return Ok(ReadStatus::EndOfStream),
        };
        buffer.push(first);

        // Over-length records are staged up to capacity only; the
        // classifier rejects them and the stream is not read further.
        let staged = parser::record_length(first).min(buffer.capacity() as u64);
        for _ in 1..staged {
            let word = self.next_word()?.ok_or(SourceError::UnexpectedEof)?;
            buffer.push(word);
        }
        Ok(ReadStatus::Record)
    }

    fn close(&mut self) -> Result<(), SourceError> {
        if self.reader.take().is_some() {
            debug!("closed EVIO stream after {} blocks", self.blocks_read);
        }
        self.block.clear();
        self.pos = 0;
        Ok(())
    }
}

/// Opens EVIO files by path.
#[derive(Debug, Default, Clone, Copy)]
pub struct EvioFileOpener;

impl SourceOpener for EvioFileOpener {
    type Source = EvioFileSource;

    fn open(&mut self, name: &str) -> Result<Self::Source, SourceError> {
        EvioFileSource::open(name)
    }
}

/// Reads until `buf` is full or the reader is exhausted.
fn fill<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

// ============================================================================
// In-memory sources
// ============================================================================

/// A source serving prepared records.
#[derive(Debug, Clone)]
pub struct MemorySource {
    version: u32,
    records: Vec<Vec<u32>>,
    next: usize,
    fail_after: Option<(usize, String)>,
    closed: bool,
    /// Set by [`MemoryOpener`]: name of the source and the shared close log
    close_log: Option<(String, Rc<RefCell<Vec<String>>>)>,
}

impl MemorySource {
    /// Creates a source reporting `version` and yielding `records` in order.
    pub fn new(version: u32, records: Vec<Vec<u32>>) -> Self {
        Self {
            version,
            records,
            next: 0,
            fail_after: None,
            closed: false,
            close_log: None,
        }
    }

    /// Makes the source fail with `message` once `count` records were read.
    pub fn fail_after(mut self, count: usize, message: &str) -> Self {
        self.fail_after = Some((count, message.to_string()));
        self
    }
}

impl RecordSource for MemorySource {
    fn version(&self) -> Result<u32, SourceError> {
        Ok(self.version)
    }

    fn read_next(&mut self, buffer: &mut RecordBuffer) -> Result<ReadStatus, SourceError> {
        if self.closed {
            return Err(SourceError::Closed);
        }
        if let Some((count, message)) = &self.fail_after {
            if self.next >= *count {
                return Err(SourceError::InvalidFormat(message.clone()));
            }
        }
        match self.records.get(self.next) {
            Some(record) => {
                // Stage no more than word 0 declares, as a file reader would.
                let declared = record
                    .get(parser::LENGTH_WORD)
                    .map_or(0, |&w| parser::record_length(w));
                let staged = (record.len() as u64).min(declared) as usize;
                buffer.load(&record[..staged]);
                self.next += 1;
                Ok(ReadStatus::Record)
            }
            None => {
                buffer.clear();
                Ok(ReadStatus::EndOfStream)
            }
        }
    }

    fn close(&mut self) -> Result<(), SourceError> {
        if !self.closed {
            if let Some((name, log)) = &self.close_log {
                log.borrow_mut().push(name.clone());
            }
        }
        self.closed = true;
        Ok(())
    }
}

/// Serves [`MemorySource`]s registered under a name.
#[derive(Debug, Default, Clone)]
pub struct MemoryOpener {
    sources: HashMap<String, MemorySource>,
    opened: Vec<String>,
    closed: Rc<RefCell<Vec<String>>>,
}

impl MemoryOpener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a source under `name`, replacing any previous one.
    pub fn with_source(mut self, name: &str, source: MemorySource) -> Self {
        self.sources.insert(name.to_string(), source);
        self
    }

    /// Names opened so far, in order.
    pub fn opened(&self) -> &[String] {
        &self.opened
    }

    /// Names of the sources closed so far, in order.
    pub fn closed(&self) -> Vec<String> {
        self.closed.borrow().clone()
    }
}

impl SourceOpener for MemoryOpener {
    type Source = MemorySource;

    fn open(&mut self, name: &str) -> Result<Self::Source, SourceError> {
        let mut source = self
            .sources
            .get(name)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(name.to_string()))?;
        source.close_log = Some((name.to_string(), Rc::clone(&self.closed)));
        self.opened.push(name.to_string());
        Ok(source)
    }
}
