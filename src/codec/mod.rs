//! Codec registry: method bytes, the `Codec` trait, and the built-in codecs.
//!
//! # Method bytes
//! Every block header starts with one method byte naming the codec that
//! produced its payload.  The values are frozen:
//!
//! | byte   | method | payload                                   |
//! |--------|--------|-------------------------------------------|
//! | `0x02` | none   | stored verbatim                           |
//! | `0x82` | lz4    | one raw LZ4 block, no size prefix         |
//! | `0x90` | zstd   | one Zstandard frame                       |
//!
//! Any other byte is corruption.  There is no negotiation and no fallback:
//! a reader that meets an unknown byte stops.
//!
//! # Registry
//! [`CodecRegistry`] holds exactly one codec per [`Method`].  It is passed to
//! the reader explicitly; nothing in this crate keeps process-wide state.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Method bytes ─────────────────────────────────────────────────────────────

pub const METHOD_NONE: u8 = 0x02;
pub const METHOD_LZ4:  u8 = 0x82;
pub const METHOD_ZSTD: u8 = 0x90;

/// Trailing bytes the LZ4 path reserves past the exact decompressed length.
pub const LZ4_SLACK: usize = 64;

/// Codec selector carried in the first byte of every block header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    None,
    Lz4,
    Zstd,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::None, Method::Lz4, Method::Zstd];

    /// The frozen on-disk byte for this method.
    #[inline]
    pub fn byte(self) -> u8 {
        match self {
            Method::None => METHOD_NONE,
            Method::Lz4  => METHOD_LZ4,
            Method::Zstd => METHOD_ZSTD,
        }
    }

    /// Resolve an on-disk byte.  `None` means the block is corrupt.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            METHOD_NONE => Some(Method::None),
            METHOD_LZ4  => Some(Method::Lz4),
            METHOD_ZSTD => Some(Method::Zstd),
            _           => None,
        }
    }

    /// Human-readable name (for diagnostics and the CLI).
    pub fn name(self) -> &'static str {
        match self {
            Method::None => "none",
            Method::Lz4  => "lz4",
            Method::Zstd => "zstd",
        }
    }

    /// Parse from a CLI string.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "none" => Some(Method::None),
            "lz4"  => Some(Method::Lz4),
            "zstd" => Some(Method::Zstd),
            _      => None,
        }
    }

    /// Dense slot index, used by the registry and the performance counters.
    #[inline]
    pub(crate) fn slot(self) -> usize {
        match self {
            Method::None => 0,
            Method::Lz4  => 1,
            Method::Zstd => 2,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02x})", self.name(), self.byte())
    }
}

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Compression error: {0}")]
    Compression(String),
    #[error("Decompression error: {0}")]
    Decompression(String),
    /// The codec finished but produced a different number of bytes than the
    /// block header declared.
    #[error("Decompressed length mismatch: header declares {expected} bytes, codec produced {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ── Codec trait ──────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    fn method(&self) -> Method;

    /// Extra bytes this codec wants after the end of its input and output
    /// buffers.
    fn slack(&self) -> usize { 0 }

    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError>;

    /// Decompress `src` into `dst`.  `dst` is exactly as long as the header's
    /// declared decompressed size; returns the number of bytes produced.
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError>;
}

// ── Built-in codec implementations ──────────────────────────────────────────

pub struct NoneCodec;
impl Codec for NoneCodec {
    fn method(&self) -> Method { Method::None }
    fn compress(&self, data: &[u8], _: i32) -> Result<Vec<u8>, CodecError> { Ok(data.to_vec()) }
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        if src.len() != dst.len() {
            return Err(CodecError::LengthMismatch { expected: dst.len(), actual: src.len() });
        }
        dst.copy_from_slice(src);
        Ok(src.len())
    }
}

pub struct Lz4Codec;
impl Codec for Lz4Codec {
    fn method(&self) -> Method { Method::Lz4 }
    fn slack(&self) -> usize { LZ4_SLACK }
    fn compress(&self, data: &[u8], _: i32) -> Result<Vec<u8>, CodecError> {
        Ok(lz4_flex::block::compress(data))
    }
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        lz4_flex::block::decompress_into(src, dst)
            .map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

pub struct ZstdCodec;
impl Codec for ZstdCodec {
    fn method(&self) -> Method { Method::Zstd }
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>, CodecError> {
        zstd::bulk::compress(data, level).map_err(|e| CodecError::Compression(e.to_string()))
    }
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        zstd::bulk::decompress_to_buffer(src, dst)
            .map_err(|e| CodecError::Decompression(e.to_string()))
    }
}

// ── Factory ──────────────────────────────────────────────────────────────────

/// Resolve a method to its built-in codec.
pub fn get_codec(method: Method) -> Box<dyn Codec> {
    match method {
        Method::None => Box::new(NoneCodec),
        Method::Lz4  => Box::new(Lz4Codec),
        Method::Zstd => Box::new(ZstdCodec),
    }
}

/// One codec per method, handed to readers and writers at construction.
///
/// Every [`Method`] always has a codec, so dispatch on a parsed method can
/// never miss.  [`with_codec`](Self::with_codec) swaps in a different
/// implementation for the method that codec reports.
pub struct CodecRegistry {
    slots: [Box<dyn Codec>; 3],
}

impl CodecRegistry {
    pub fn builtin() -> Self {
        Self {
            slots: [get_codec(Method::None), get_codec(Method::Lz4), get_codec(Method::Zstd)],
        }
    }

    pub fn with_codec(mut self, codec: Box<dyn Codec>) -> Self {
        let slot = codec.method().slot();
        self.slots[slot] = codec;
        self
    }

    #[inline]
    pub fn get(&self, method: Method) -> &dyn Codec {
        self.slots[method.slot()].as_ref()
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for CodecRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.slots.iter().map(|c| c.method().name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(method: Method, data: &[u8]) -> Vec<u8> {
        let codec = get_codec(method);
        let compressed = codec.compress(data, 3).unwrap();
        let mut out = vec![0u8; data.len()];
        let n = codec.decompress(&compressed, &mut out).unwrap();
        assert_eq!(n, data.len());
        out
    }

    #[test]
    fn method_bytes_are_frozen() {
        assert_eq!(Method::None.byte(), 0x02);
        assert_eq!(Method::Lz4.byte(), 0x82);
        assert_eq!(Method::Zstd.byte(), 0x90);
        for m in Method::ALL {
            assert_eq!(Method::from_byte(m.byte()), Some(m));
            assert_eq!(Method::from_name(m.name()), Some(m));
        }
        assert_eq!(Method::from_byte(0x00), None);
        assert_eq!(Method::from_byte(0x91), None);
    }

    #[test]
    fn builtin_codecs_roundtrip() {
        let data: Vec<u8> = b"columnar columnar columnar data ".repeat(64);
        for m in Method::ALL {
            assert_eq!(roundtrip(m, &data), data, "{m}");
        }
    }

    #[test]
    fn none_codec_rejects_length_mismatch() {
        let mut out = [0u8; 4];
        let err = NoneCodec.decompress(b"hello", &mut out).unwrap_err();
        assert!(matches!(err, CodecError::LengthMismatch { expected: 4, actual: 5 }));
    }

    #[test]
    fn lz4_rejects_undersized_output() {
        let data = vec![7u8; 4096];
        let compressed = Lz4Codec.compress(&data, 0).unwrap();
        let mut out = vec![0u8; 100];
        assert!(Lz4Codec.decompress(&compressed, &mut out).is_err());
    }

    #[test]
    fn zstd_rejects_garbage() {
        let mut out = vec![0u8; 16];
        assert!(ZstdCodec.decompress(b"definitely not zstd", &mut out).is_err());
    }

    #[test]
    fn registry_override_replaces_slot() {
        struct Tagged;
        impl Codec for Tagged {
            fn method(&self) -> Method { Method::Zstd }
            fn slack(&self) -> usize { 7 }
            fn compress(&self, d: &[u8], _: i32) -> Result<Vec<u8>, CodecError> { Ok(d.to_vec()) }
            fn decompress(&self, s: &[u8], d: &mut [u8]) -> Result<usize, CodecError> {
                d.copy_from_slice(s);
                Ok(s.len())
            }
        }
        let reg = CodecRegistry::builtin().with_codec(Box::new(Tagged));
        assert_eq!(reg.get(Method::Zstd).slack(), 7);
        assert_eq!(reg.get(Method::Lz4).slack(), LZ4_SLACK);
    }
}
