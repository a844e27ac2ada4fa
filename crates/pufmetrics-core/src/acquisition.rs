//! Capture of PUF responses from a serial line into a response table.
//!
//! The reference firmware dumps its uninitialised SRAM window after every
//! reset as one line per byte:
//!
//! ```text
//! PUF[00]: 3A
//! PUF[01]: F1
//! ...
//! PUF[15]: 07
//! ```
//!
//! [`ResponseAssembler`] stitches those chunks into one hex response,
//! [`TableAppender`] appends each response to the column of its
//! (board, reset type), and [`Acquisition`] drives a [`Connector`] with a
//! [`ReconnectPolicy`] so a dropped cable or a board reset does not end the
//! capture. The partial chunk buffer lives in the assembler, which outlives
//! every individual connection.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::codec::{BitString, HexCodec};
use crate::config::AcquisitionConfig;
use crate::error::{PufError, Result};
use crate::table::ColumnKey;

/// Chunks per response emitted by the reference firmware.
pub const DEFAULT_CHUNK_COUNT: usize = 16;

// ---------------------------------------------------------------------------
// Line parsing and assembly
// ---------------------------------------------------------------------------

/// One `PUF[NN]: HH` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLine {
    /// Position within the response, when the firmware prints it.
    pub index: Option<usize>,
    pub value: u8,
}

/// Parse a firmware chunk line; anything malformed yields `None`.
pub fn parse_chunk_line(line: &str) -> Option<ChunkLine> {
    let rest = line.trim().strip_prefix("PUF")?;
    let (label, value) = rest.split_once(": ")?;

    let index = if label.is_empty() {
        None
    } else {
        let digits = label.strip_prefix('[')?.strip_suffix(']')?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(digits.parse().ok()?)
    };

    let value = value.trim();
    if value.is_empty() || value.len() > 2 || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(ChunkLine {
        index,
        value: u8::from_str_radix(value, 16).ok()?,
    })
}

/// Collects chunks into complete responses.
#[derive(Debug, Clone)]
pub struct ResponseAssembler {
    chunk_count: usize,
    chunks: Vec<u8>,
    discarded: u64,
}

impl ResponseAssembler {
    pub fn new(chunk_count: usize) -> Self {
        Self {
            chunk_count: chunk_count.max(1),
            chunks: Vec::with_capacity(chunk_count),
            discarded: 0,
        }
    }

    /// Chunks held for the response in progress.
    pub fn pending(&self) -> usize {
        self.chunks.len()
    }

    /// Chunks dropped so far (malformed, out of order, or orphaned).
    pub fn discarded(&self) -> u64 {
        self.discarded
    }

    /// Feed one raw line. Lines not starting with `PUF` are ignored.
    pub fn push_line(&mut self, line: &str) -> Option<String> {
        if !line.trim_start().starts_with("PUF") {
            return None;
        }
        match parse_chunk_line(line) {
            Some(chunk) => self.push_chunk(chunk),
            None => {
                log::warn!("discarding malformed chunk line {:?}", line.trim_end());
                self.discarded += 1;
                None
            }
        }
    }

    /// Feed one parsed chunk; returns the response once complete.
    ///
    /// An index that does not continue the current sequence drops the
    /// partial buffer. Index 0 then starts a fresh response.
    pub fn push_chunk(&mut self, chunk: ChunkLine) -> Option<String> {
        if let Some(index) = chunk.index
            && index != self.chunks.len()
        {
            if !self.chunks.is_empty() {
                log::warn!(
                    "chunk {index} out of sequence, dropping {} partial chunk(s)",
                    self.chunks.len()
                );
                self.discarded += self.chunks.len() as u64;
                self.chunks.clear();
            }
            if index != 0 {
                self.discarded += 1;
                return None;
            }
        }

        self.chunks.push(chunk.value);
        if self.chunks.len() < self.chunk_count {
            return None;
        }
        let response = HexCodec::encode(&BitString::from_bytes(&self.chunks));
        self.chunks.clear();
        Some(response)
    }
}

// ---------------------------------------------------------------------------
// Table appending
// ---------------------------------------------------------------------------

/// Appends responses for one column to a header-less CSV table.
pub struct TableAppender {
    writer: csv::Writer<File>,
    key: ColumnKey,
    rows_written: u64,
}

impl TableAppender {
    /// Open (or create) `path` in append mode; earlier rows are never rewritten.
    pub fn open(path: &Path, key: ColumnKey) -> Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(file);
        Ok(Self {
            writer,
            key,
            rows_written: 0,
        })
    }

    pub fn key(&self) -> ColumnKey {
        self.key
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    /// Write one row with `response` in this column's position, then flush.
    pub fn append(&mut self, response: &str) -> Result<()> {
        let index = self.key.column_index();
        let mut row = vec![""; index + 1];
        row[index] = response;
        self.writer.write_record(&row)?;
        self.writer.flush()?;
        self.rows_written += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Reconnection
// ---------------------------------------------------------------------------

/// Delay schedule between connection attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub initial_delay_ms: u64,
    /// Growth factor per consecutive failure; 1.0 keeps the delay constant.
    pub multiplier: f64,
    pub max_delay_ms: u64,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 5000,
            multiplier: 1.0,
            max_delay_ms: 60_000,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before reconnect attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let ms = (self.initial_delay_ms as f64 * factor).min(self.max_delay_ms as f64);
        Duration::from_millis(ms as u64)
    }

    /// Whether `failures` consecutive failures use up the allowed attempts.
    pub fn exhausted(&self, failures: u32) -> bool {
        self.max_attempts.is_some_and(|max| failures > max)
    }
}

// ---------------------------------------------------------------------------
// Capture loop
// ---------------------------------------------------------------------------

/// Opens a fresh line-oriented link to the device.
pub trait Connector {
    type Link: BufRead;

    fn connect(&mut self) -> io::Result<Self::Link>;

    /// Human-readable target for log messages.
    fn describe(&self) -> String;
}

/// Serial port (e.g. `/dev/ttyACM0`, `COM3`) opened at the configured line
/// rate. Reads time out so the stop flag is polled while the board is silent.
#[derive(Debug, Clone)]
pub struct DeviceConnector {
    path: String,
    baud_rate: u32,
    read_timeout: Duration,
}

impl DeviceConnector {
    pub fn new(path: impl Into<String>, config: &AcquisitionConfig) -> Self {
        Self {
            path: path.into(),
            baud_rate: config.baud_rate,
            read_timeout: Duration::from_millis(config.read_timeout_ms.max(1)),
        }
    }
}

impl Connector for DeviceConnector {
    type Link = BufReader<Box<dyn serialport::SerialPort>>;

    fn connect(&mut self) -> io::Result<Self::Link> {
        serialport::new(self.path.as_str(), self.baud_rate)
            .timeout(self.read_timeout)
            .open()
            .map(BufReader::new)
            .map_err(io::Error::from)
    }

    fn describe(&self) -> String {
        format!("{} @ {} baud", self.path, self.baud_rate)
    }
}

/// Counters reported when a capture ends.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionSummary {
    pub responses: u64,
    pub discarded_chunks: u64,
    pub reconnects: u64,
}

enum LinkEnd {
    Stopped,
    /// `lines` counts what the link delivered before it failed.
    Lost { error: io::Error, lines: u64 },
}

/// Reconnecting capture loop for one (board, reset type) column.
pub struct Acquisition<C: Connector> {
    connector: C,
    appender: TableAppender,
    assembler: ResponseAssembler,
    policy: ReconnectPolicy,
    summary: AcquisitionSummary,
}

impl<C: Connector> Acquisition<C> {
    pub fn new(connector: C, appender: TableAppender, config: &AcquisitionConfig) -> Self {
        Self {
            connector,
            appender,
            assembler: ResponseAssembler::new(config.chunk_count),
            policy: config.reconnect.clone(),
            summary: AcquisitionSummary::default(),
        }
    }

    pub fn summary(&self) -> AcquisitionSummary {
        AcquisitionSummary {
            discarded_chunks: self.assembler.discarded(),
            ..self.summary
        }
    }

    /// Capture until `stop` is set or the reconnect policy gives up.
    ///
    /// Link failures lead to a reconnect; failures writing the table are
    /// returned immediately.
    pub fn run(&mut self, stop: &AtomicBool) -> Result<AcquisitionSummary> {
        let mut failures: u32 = 0;

        while !stop.load(Ordering::SeqCst) {
            match self.connector.connect() {
                Ok(link) => {
                    log::info!("listening on {}", self.connector.describe());
                    match self.pump(link, stop)? {
                        LinkEnd::Stopped => break,
                        LinkEnd::Lost { error, lines } => {
                            log::warn!(
                                "lost {} after {lines} line(s): {error}",
                                self.connector.describe()
                            );
                            if lines > 0 {
                                failures = 0;
                            }
                        }
                    }
                }
                Err(e) => {
                    log::warn!("could not connect to {}: {e}", self.connector.describe());
                }
            }
            if stop.load(Ordering::SeqCst) {
                break;
            }

            failures += 1;
            if self.policy.exhausted(failures) {
                return Err(PufError::ReconnectExhausted {
                    attempts: failures - 1,
                });
            }
            let delay = self.policy.delay_for(failures);
            log::info!(
                "reconnecting in {:.1}s ({} chunk(s) pending)",
                delay.as_secs_f64(),
                self.assembler.pending()
            );
            self.summary.reconnects += 1;
            sleep_unless_stopped(delay, stop);
        }

        Ok(self.summary())
    }

    fn pump(&mut self, mut link: C::Link, stop: &AtomicBool) -> Result<LinkEnd> {
        let mut buf = Vec::with_capacity(64);
        let mut lines: u64 = 0;
        loop {
            if stop.load(Ordering::SeqCst) {
                return Ok(LinkEnd::Stopped);
            }
            match link.read_until(b'\n', &mut buf) {
                Ok(0) => {
                    return Ok(LinkEnd::Lost {
                        error: io::Error::new(io::ErrorKind::UnexpectedEof, "link closed"),
                        lines,
                    });
                }
                Ok(_) => {
                    lines += 1;
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    buf.clear();
                    if let Some(response) = self.assembler.push_line(&line) {
                        self.appender.append(&response)?;
                        self.summary.responses += 1;
                        log::info!(
                            "captured response #{} for {}: {response}",
                            self.summary.responses,
                            self.appender.key()
                        );
                    }
                }
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::Interrupted
                    ) => {}
                Err(error) => return Ok(LinkEnd::Lost { error, lines }),
            }
        }
    }
}

fn sleep_unless_stopped(delay: Duration, stop: &AtomicBool) {
    let deadline = Instant::now() + delay;
    while !stop.load(Ordering::SeqCst) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        std::thread::sleep(remaining.min(Duration::from_millis(10)));
    }
}
