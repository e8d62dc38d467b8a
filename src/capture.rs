//! Classic libpcap container writer (microsecond timestamps, Ethernet).
//!
//! File layout:
//!
//! ```text
//! global header (24 bytes, little-endian)
//! { ts_sec u32, ts_usec u32, incl_len u32, orig_len u32, frame bytes }*
//! ```
//!
//! Timestamps are synthetic: frame `i` sits at `base + i / 1000` seconds and
//! `(i % 1000) * 1000` microseconds, one millisecond apart. Frames are never
//! truncated, so `incl_len == orig_len` always. Writing is a single forward
//! pass; a failure leaves a truncated file that must be regenerated.
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crc32fast::Hasher as Crc32;
use thiserror::Error;

pub const PCAP_MAGIC: u32 = 0xA1B2_C3D4;
pub const PCAP_VERSION_MAJOR: u16 = 2;
pub const PCAP_VERSION_MINOR: u16 = 4;
pub const PCAP_SNAPLEN: u32 = 65_535;
pub const LINKTYPE_ETHERNET: u32 = 1;

pub const GLOBAL_HEADER_LEN: usize = 24;
pub const RECORD_HEADER_LEN: usize = 16;

/// 2023-11-14T22:13:20Z.
pub const DEFAULT_BASE_TS: u32 = 1_700_000_000;
pub const FRAMES_PER_SECOND: u64 = 1_000;
pub const FRAME_SPACING_USEC: u32 = 1_000;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture I/O failed: {0}")]
    Io(#[from] io::Error),
    #[error("timestamp for frame {index} does not fit in 32-bit seconds")]
    TimestampOverflow { index: u64 },
    #[error("frame {index} is {len} bytes, too large for a record header")]
    FrameTooLarge { index: u64, len: usize },
}

/// Fixed 24-byte file header.
pub fn global_header() -> [u8; GLOBAL_HEADER_LEN] {
    let mut h = [0u8; GLOBAL_HEADER_LEN];
    h[0..4].copy_from_slice(&PCAP_MAGIC.to_le_bytes());
    h[4..6].copy_from_slice(&PCAP_VERSION_MAJOR.to_le_bytes());
    h[6..8].copy_from_slice(&PCAP_VERSION_MINOR.to_le_bytes());
    h[8..12].copy_from_slice(&0i32.to_le_bytes()); // thiszone
    h[12..16].copy_from_slice(&0u32.to_le_bytes()); // sigfigs
    h[16..20].copy_from_slice(&PCAP_SNAPLEN.to_le_bytes());
    h[20..24].copy_from_slice(&LINKTYPE_ETHERNET.to_le_bytes());
    h
}

/// `(ts_sec, ts_usec)` of frame `index`, or `None` past the 32-bit epoch range.
pub fn timestamp_for(base_ts: u32, index: u64) -> Option<(u32, u32)> {
    let secs = u64::from(base_ts).checked_add(index / FRAMES_PER_SECOND)?;
    let secs = u32::try_from(secs).ok()?;
    let usec = (index % FRAMES_PER_SECOND) as u32 * FRAME_SPACING_USEC;
    Some((secs, usec))
}

/// Totals for a finished capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureStats {
    pub frames: u64,
    /// Including the global header.
    pub bytes: u64,
    /// CRC-32 of every byte written, in order.
    pub crc32: u32,
    pub last_ts: Option<(u32, u32)>,
}

/// Streams records into any writer, header first.
pub struct CaptureWriter<W: Write> {
    out: W,
    base_ts: u32,
    frames: u64,
    bytes: u64,
    crc: Crc32,
    last_ts: Option<(u32, u32)>,
}

impl<W: Write> CaptureWriter<W> {
    /// Write the global header and return a writer positioned for frame 0.
    pub fn new(out: W, base_ts: u32) -> Result<Self, CaptureError> {
        let mut w = Self {
            out,
            base_ts,
            frames: 0,
            bytes: 0,
            crc: Crc32::new(),
            last_ts: None,
        };
        w.put(&global_header())?;
        Ok(w)
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    /// Append one frame with the next synthetic timestamp.
    pub fn write_frame(&mut self, frame: &[u8]) -> Result<(u32, u32), CaptureError> {
        let index = self.frames;
        let (ts_sec, ts_usec) =
            timestamp_for(self.base_ts, index).ok_or(CaptureError::TimestampOverflow { index })?;
        let len = u32::try_from(frame.len())
            .map_err(|_| CaptureError::FrameTooLarge { index, len: frame.len() })?;

        let mut hdr = [0u8; RECORD_HEADER_LEN];
        hdr[0..4].copy_from_slice(&ts_sec.to_le_bytes());
        hdr[4..8].copy_from_slice(&ts_usec.to_le_bytes());
        hdr[8..12].copy_from_slice(&len.to_le_bytes()); // incl_len
        hdr[12..16].copy_from_slice(&len.to_le_bytes()); // orig_len
        self.put(&hdr)?;
        self.put(frame)?;

        self.frames += 1;
        self.last_ts = Some((ts_sec, ts_usec));
        Ok((ts_sec, ts_usec))
    }

    /// Flush and report totals.
    pub fn finish(mut self) -> Result<CaptureStats, CaptureError> {
        self.out.flush()?;
        Ok(CaptureStats {
            frames: self.frames,
            bytes: self.bytes,
            crc32: self.crc.finalize(),
            last_ts: self.last_ts,
        })
    }

    fn put(&mut self, buf: &[u8]) -> io::Result<()> {
        self.out.write_all(buf)?;
        self.crc.update(buf);
        self.bytes += buf.len() as u64;
        Ok(())
    }
}

/// Create (or truncate) `path` for writing, creating missing parent directories.
pub fn create_output(path: &Path) -> io::Result<BufWriter<File>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new().create(true).write(true).truncate(true).open(path)?;
    Ok(BufWriter::with_capacity(1 << 20, file))
}

/// Write `frames` to a new capture file at `path`.
pub fn write_capture<P, I>(path: P, frames: I, base_ts: u32) -> Result<CaptureStats, CaptureError>
where
    P: AsRef<Path>,
    I: IntoIterator,
    I::Item: AsRef<[u8]>,
{
    let mut w = CaptureWriter::new(create_output(path.as_ref())?, base_ts)?;
    for frame in frames {
        w.write_frame(frame.as_ref())?;
    }
    w.finish()
}
