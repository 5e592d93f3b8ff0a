//! Block layout: checksum, header, and the error taxonomy of the framing layer.
//!
//! ```text
//! repeated {
//!   checksum   16 B   CityHash128 (v1.0.2) of header||payload, u128 little-endian
//!   header      9 B   [method:1][compressed_size:4 LE][decompressed_size:4 LE]
//!   payload           compressed_size - 9 bytes
//! }
//! ```
//!
//! `compressed_size` counts the header itself, so a block's payload slice
//! and its header are always contiguous and are hashed as one run of bytes.

use byteorder::{ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use cityhash_rs::cityhash_102_128;
use std::fmt;
use std::io::{self, Read, Write};
use thiserror::Error;

use crate::codec::{Codec, CodecError, Method};

pub const CHECKSUM_SIZE: usize = 16;
pub const HEADER_SIZE:   usize = 9;

/// Default ceiling on `compressed_size` (1 GiB).  Anything above it is
/// treated as a corrupted header rather than an allocation request.
pub const MAX_COMPRESSED_SIZE: u32 = 0x4000_0000;
/// Default ceiling on `decompressed_size` (1 GiB), for the same reason.
pub const MAX_DECOMPRESSED_SIZE: u32 = 0x4000_0000;

// ── Header ───────────────────────────────────────────────────────────────────

/// The 9-byte block header.  The method byte is kept raw so that framing can
/// report the exact offending value when it is not a known method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub method_byte:       u8,
    pub compressed_size:   u32,
    pub decompressed_size: u32,
}

impl BlockHeader {
    pub fn new(method: Method, payload_len: u32, decompressed_size: u32) -> Self {
        Self {
            method_byte:       method.byte(),
            compressed_size:   payload_len + HEADER_SIZE as u32,
            decompressed_size,
        }
    }

    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> Self {
        Self {
            method_byte:       buf[0],
            compressed_size:   LittleEndian::read_u32(&buf[1..5]),
            decompressed_size: LittleEndian::read_u32(&buf[5..9]),
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.method_byte;
        LittleEndian::write_u32(&mut buf[1..5], self.compressed_size);
        LittleEndian::write_u32(&mut buf[5..9], self.decompressed_size);
        buf
    }

    pub fn write<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_u8(self.method_byte)?;
        writer.write_u32::<LittleEndian>(self.compressed_size)?;
        writer.write_u32::<LittleEndian>(self.decompressed_size)?;
        Ok(())
    }

    pub fn read<R: Read>(mut reader: R) -> io::Result<Self> {
        Ok(Self {
            method_byte:       reader.read_u8()?,
            compressed_size:   reader.read_u32::<LittleEndian>()?,
            decompressed_size: reader.read_u32::<LittleEndian>()?,
        })
    }

    #[inline]
    pub fn method(&self) -> Option<Method> {
        Method::from_byte(self.method_byte)
    }

    /// Payload bytes that follow the header on disk.
    #[inline]
    pub fn payload_len(&self) -> usize {
        (self.compressed_size as usize).saturating_sub(HEADER_SIZE)
    }
}

// ── Checksum ─────────────────────────────────────────────────────────────────

/// CityHash128 v1.0.2 over `header || payload`, stored low half first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum(pub u128);

impl Checksum {
    #[inline]
    pub fn compute(header_and_payload: &[u8]) -> Self {
        Checksum(cityhash_102_128(header_and_payload))
    }

    pub fn from_bytes(buf: &[u8; CHECKSUM_SIZE]) -> Self {
        Checksum(LittleEndian::read_u128(buf))
    }

    pub fn to_bytes(self) -> [u8; CHECKSUM_SIZE] {
        let mut buf = [0u8; CHECKSUM_SIZE];
        LittleEndian::write_u128(&mut buf, self.0);
        buf
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.to_bytes())
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ── Encoding ─────────────────────────────────────────────────────────────────

/// Compress `data` with `codec` and frame it as one complete block:
/// checksum, header, payload.
pub fn encode_block(data: &[u8], codec: &dyn Codec, level: i32) -> Result<Vec<u8>, CodecError> {
    let decompressed_size = u32::try_from(data.len())
        .map_err(|_| CodecError::Compression(format!("block of {} bytes exceeds u32 range", data.len())))?;
    let payload = codec.compress(data, level)?;
    let payload_len = u32::try_from(payload.len())
        .ok()
        .filter(|n| n.checked_add(HEADER_SIZE as u32).is_some())
        .ok_or_else(|| CodecError::Compression(format!("compressed block of {} bytes exceeds u32 range", payload.len())))?;

    let header = BlockHeader::new(codec.method(), payload_len, decompressed_size);

    let mut out = Vec::with_capacity(CHECKSUM_SIZE + HEADER_SIZE + payload.len());
    out.extend_from_slice(&[0u8; CHECKSUM_SIZE]);
    header.write(&mut out)?;
    out.extend_from_slice(&payload);

    let checksum = Checksum::compute(&out[CHECKSUM_SIZE..]);
    out[..CHECKSUM_SIZE].copy_from_slice(&checksum.to_bytes());
    Ok(out)
}

// ── Error type ───────────────────────────────────────────────────────────────

/// Which part of a block a short read landed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Checksum,
    Header,
    Payload,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Region::Checksum => "checksum",
            Region::Header   => "header",
            Region::Payload  => "payload",
        })
    }
}

/// Fatal reader errors.  `offset` is always the stream offset of the start
/// of the offending block (its checksum).
#[derive(Error, Debug)]
pub enum BlockError {
    #[error("Truncated input in block at offset {offset}: {region} needs {expected} bytes, got {actual}")]
    TruncatedInput { offset: u64, region: Region, expected: usize, actual: usize },

    #[error("Unknown compression method byte 0x{method:02x} in block at offset {offset}")]
    UnsupportedMethod { offset: u64, method: u8 },

    #[error("Compressed size {compressed_size} in block at offset {offset} is outside 9..={max}; most likely corrupted data")]
    SizeOutOfBounds { offset: u64, compressed_size: u32, max: u32 },

    #[error("Checksum mismatch in block at offset {offset}: stored {expected}, computed {actual}")]
    ChecksumMismatch { offset: u64, expected: Checksum, actual: Checksum },

    #[error("Decompressed size {decompressed_size} in block at offset {offset} exceeds {max}; most likely corrupted data")]
    DecompressedSizeOutOfBounds { offset: u64, decompressed_size: u32, max: u32 },

    #[error("Codec {method} failed on block at offset {offset}: {source}")]
    CodecFailure {
        offset: u64,
        method: Method,
        #[source]
        source: CodecError,
    },

    /// Returned by every call after the reader has reported a fatal error.
    #[error("Reader has already failed; no further blocks can be read")]
    ReaderFailed,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl From<BlockError> for io::Error {
    fn from(e: BlockError) -> Self {
        match e {
            BlockError::Io(inner) => inner,
            truncated @ BlockError::TruncatedInput { .. } => io::Error::new(io::ErrorKind::UnexpectedEof, truncated),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
