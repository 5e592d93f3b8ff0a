//! Block framing: locate one block in a [`ByteSource`], validate it, and hand
//! back its compressed bytes without copying when the source allows it.
//!
//! A block's compressed bytes are either
//! - [`Payload::Borrowed`]: a window into the source's current buffer, when
//!   the header and the whole payload are already resident there, or
//! - [`Payload::Owned`]: the reader's reusable payload buffer, into which the
//!   header and payload were copied.
//!
//! Both windows start with the 9 header bytes, so checksumming and
//! decompression see the same layout whichever path produced them.

use tracing::trace;

use crate::block::{BlockError, BlockHeader, Checksum, Region, CHECKSUM_SIZE, HEADER_SIZE};
use crate::codec::{CodecRegistry, Method};
use crate::config::ReaderConfig;
use crate::io_stream::ByteSource;

/// Where a block's `header || payload` bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// `source.buffer()[offset..offset + len]`.  Valid until the source refills.
    Borrowed { offset: usize, len: usize },
    /// `owned[..len]`; the buffer carries codec slack past `len`.
    Owned { len: usize },
}

impl Payload {
    /// Resolve to the `header || payload` bytes.
    #[inline]
    pub fn bytes<'a>(&self, source_buffer: &'a [u8], owned: &'a [u8]) -> &'a [u8] {
        match *self {
            Payload::Borrowed { offset, len } => &source_buffer[offset..offset + len],
            Payload::Owned { len }            => &owned[..len],
        }
    }

    #[inline]
    pub fn is_borrowed(&self) -> bool {
        matches!(self, Payload::Borrowed { .. })
    }

    #[inline]
    pub fn len(&self) -> usize {
        match *self {
            Payload::Borrowed { len, .. } | Payload::Owned { len } => len,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One located and validated block.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    /// Stream offset of the block's checksum.
    pub offset:   u64,
    pub checksum: Checksum,
    pub header:   BlockHeader,
    pub method:   Method,
    pub payload:  Payload,
}

impl Frame {
    #[inline]
    pub fn compressed_size(&self) -> usize {
        self.header.compressed_size as usize
    }

    #[inline]
    pub fn decompressed_size(&self) -> usize {
        self.header.decompressed_size as usize
    }

    /// Bytes this block occupies in the stream, checksum included.
    #[inline]
    pub fn stream_len(&self) -> u64 {
        (CHECKSUM_SIZE + self.compressed_size()) as u64
    }
}

/// Read the next block's checksum and header, validate them, and obtain its
/// payload.  Returns `Ok(None)` only when the source is exhausted exactly on
/// a block boundary.
///
/// `owned` is the caller's reusable payload buffer; it is only written when
/// the block cannot be borrowed from the source.
pub fn read_next_block<S: ByteSource + ?Sized>(
    source:   &mut S,
    config:   &ReaderConfig,
    registry: &CodecRegistry,
    owned:    &mut Vec<u8>,
) -> Result<Option<Frame>, BlockError> {
    let offset = source.offset();
    if source.eof()? {
        return Ok(None);
    }

    let mut checksum_buf = [0u8; CHECKSUM_SIZE];
    read_region(source, &mut checksum_buf, offset, Region::Checksum)?;
    let checksum = Checksum::from_bytes(&checksum_buf);

    let mut header_buf = [0u8; HEADER_SIZE];
    read_region(source, &mut header_buf, offset, Region::Header)?;
    let header = BlockHeader::from_bytes(&header_buf);

    let method = header.method().ok_or(BlockError::UnsupportedMethod {
        offset,
        method: header.method_byte,
    })?;

    if header.compressed_size > config.max_compressed_size
        || (header.compressed_size as usize) < HEADER_SIZE
    {
        return Err(BlockError::SizeOutOfBounds {
            offset,
            compressed_size: header.compressed_size,
            max: config.max_compressed_size,
        });
    }

    if header.decompressed_size > config.max_decompressed_size {
        return Err(BlockError::DecompressedSizeOutOfBounds {
            offset,
            decompressed_size: header.decompressed_size,
            max: config.max_decompressed_size,
        });
    }

    let compressed_size = header.compressed_size as usize;
    let payload_len = header.payload_len();

    // The header was consumed from the current buffer iff at least
    // HEADER_SIZE bytes precede the cursor: a refill resets the cursor to 0.
    let position = source.position();
    let payload = if position >= HEADER_SIZE && source.available() >= payload_len {
        source.advance(payload_len);
        Payload::Borrowed { offset: position - HEADER_SIZE, len: compressed_size }
    } else {
        let slack = registry.get(method).slack();
        owned.resize(compressed_size + slack, 0);
        owned[..HEADER_SIZE].copy_from_slice(&header_buf);
        read_region(source, &mut owned[HEADER_SIZE..compressed_size], offset, Region::Payload)?;
        Payload::Owned { len: compressed_size }
    };

    trace!(offset, method = method.name(), compressed_size, borrowed = payload.is_borrowed(), "framed block");

    if config.verify_checksums {
        let actual = Checksum::compute(payload.bytes(source.buffer(), owned));
        if actual != checksum {
            return Err(BlockError::ChecksumMismatch { offset, expected: checksum, actual });
        }
    }

    Ok(Some(Frame { offset, checksum, header, method, payload }))
}

fn read_region<S: ByteSource + ?Sized>(
    source: &mut S,
    dst:    &mut [u8],
    offset: u64,
    region: Region,
) -> Result<(), BlockError> {
    let actual = source.read_strict(dst)?;
    if actual < dst.len() {
        return Err(BlockError::TruncatedInput { offset, region, expected: dst.len(), actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{encode_block, MAX_COMPRESSED_SIZE, MAX_DECOMPRESSED_SIZE};
    use crate::codec::{get_codec, LZ4_SLACK};
    use crate::io_stream::{BufferedSource, SliceSource};
    use std::io::Cursor;

    fn frame_one<S: ByteSource>(src: &mut S, cfg: &ReaderConfig, owned: &mut Vec<u8>) -> Result<Option<Frame>, BlockError> {
        read_next_block(src, cfg, &CodecRegistry::builtin(), owned)
    }

    #[test]
    fn resident_block_is_borrowed() {
        let block = encode_block(b"hello", get_codec(Method::None).as_ref(), 0).unwrap();
        let mut src = SliceSource::new(&block);
        let mut owned = Vec::new();
        let frame = frame_one(&mut src, &ReaderConfig::default(), &mut owned).unwrap().unwrap();

        assert_eq!(frame.payload, Payload::Borrowed { offset: CHECKSUM_SIZE, len: HEADER_SIZE + 5 });
        assert_eq!(&frame.payload.bytes(src.buffer(), &owned)[HEADER_SIZE..], b"hello");
        assert!(owned.is_empty(), "borrowed path must not touch the owned buffer");
        assert_eq!(src.offset(), block.len() as u64);
        assert!(frame_one(&mut src, &ReaderConfig::default(), &mut owned).unwrap().is_none());
    }

    #[test]
    fn split_block_is_copied_with_slack() {
        let data = vec![3u8; 1000];
        let block = encode_block(&data, get_codec(Method::Lz4).as_ref(), 0).unwrap();
        let mut src = BufferedSource::with_capacity(Cursor::new(block.clone()), 1);
        let mut owned = Vec::new();
        let frame = frame_one(&mut src, &ReaderConfig::default(), &mut owned).unwrap().unwrap();

        assert!(!frame.payload.is_borrowed());
        assert_eq!(frame.payload.len(), block.len() - CHECKSUM_SIZE);
        assert_eq!(owned.len(), frame.compressed_size() + LZ4_SLACK);
        assert_eq!(frame.payload.bytes(src.buffer(), &owned), &block[CHECKSUM_SIZE..]);
        assert_eq!(frame.decompressed_size(), 1000);
    }

    #[test]
    fn oversized_header_is_rejected_before_reading_payload() {
        let mut block = encode_block(b"abc", get_codec(Method::None).as_ref(), 0).unwrap();
        block[CHECKSUM_SIZE + 1..CHECKSUM_SIZE + 5].copy_from_slice(&(MAX_COMPRESSED_SIZE + 1).to_le_bytes());
        let mut src = SliceSource::new(&block);
        let mut owned = Vec::new();
        let err = frame_one(&mut src, &ReaderConfig::default(), &mut owned).unwrap_err();
        assert!(matches!(err, BlockError::SizeOutOfBounds { compressed_size, .. } if compressed_size == MAX_COMPRESSED_SIZE + 1));
        assert_eq!(owned.capacity(), 0);
    }

    #[test]
    fn oversized_decompressed_size_is_rejected_before_allocating() {
        let mut block = encode_block(b"abc", get_codec(Method::Lz4).as_ref(), 0).unwrap();
        block[CHECKSUM_SIZE + 5..CHECKSUM_SIZE + 9].copy_from_slice(&(3u32 << 30).to_le_bytes());
        let cfg = ReaderConfig::default().with_verify_checksums(false);
        let mut src = BufferedSource::with_capacity(Cursor::new(block), 4);
        let mut owned = Vec::new();
        let err = frame_one(&mut src, &cfg, &mut owned).unwrap_err();
        assert!(matches!(
            err,
            BlockError::DecompressedSizeOutOfBounds { offset: 0, decompressed_size, max }
                if decompressed_size == 3 << 30 && max == MAX_DECOMPRESSED_SIZE
        ));
        assert_eq!(owned.capacity(), 0);
    }

    #[test]
    fn configured_decompressed_ceiling_applies() {
        let block = encode_block(&[1u8; 100], get_codec(Method::Zstd).as_ref(), 3).unwrap();
        let cfg = ReaderConfig::default().with_max_decompressed_size(99);
        let err = frame_one(&mut SliceSource::new(&block), &cfg, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, BlockError::DecompressedSizeOutOfBounds { decompressed_size: 100, max: 99, .. }));

        let cfg = ReaderConfig::default().with_max_decompressed_size(100);
        assert!(frame_one(&mut SliceSource::new(&block), &cfg, &mut Vec::new()).unwrap().is_some());
    }

    #[test]
    fn configured_ceiling_applies() {
        let block = encode_block(&[9u8; 64], get_codec(Method::None).as_ref(), 0).unwrap();
        let cfg = ReaderConfig::default().with_max_compressed_size(32);
        let err = frame_one(&mut SliceSource::new(&block), &cfg, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, BlockError::SizeOutOfBounds { max: 32, .. }));
    }

    #[test]
    fn undersized_header_is_rejected() {
        let mut block = encode_block(b"abc", get_codec(Method::None).as_ref(), 0).unwrap();
        block[CHECKSUM_SIZE + 1..CHECKSUM_SIZE + 5].copy_from_slice(&4u32.to_le_bytes());
        let err = frame_one(&mut SliceSource::new(&block), &ReaderConfig::default(), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, BlockError::SizeOutOfBounds { compressed_size: 4, .. }));
    }

    #[test]
    fn unknown_method_byte() {
        let mut block = encode_block(b"abc", get_codec(Method::None).as_ref(), 0).unwrap();
        block[CHECKSUM_SIZE] = 0x42;
        let err = frame_one(&mut SliceSource::new(&block), &ReaderConfig::default(), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, BlockError::UnsupportedMethod { method: 0x42, offset: 0 }));
    }

    #[test]
    fn checksum_verification_can_be_disabled() {
        let mut block = encode_block(b"abcdef", get_codec(Method::None).as_ref(), 0).unwrap();
        let last = block.len() - 1;
        block[last] ^= 0xff;

        let err = frame_one(&mut SliceSource::new(&block), &ReaderConfig::default(), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, BlockError::ChecksumMismatch { offset: 0, .. }));

        let cfg = ReaderConfig::default().with_verify_checksums(false);
        assert!(frame_one(&mut SliceSource::new(&block), &cfg, &mut Vec::new()).unwrap().is_some());
    }

    #[test]
    fn truncation_names_the_region() {
        let block = encode_block(b"0123456789", get_codec(Method::None).as_ref(), 0).unwrap();
        for (cut, region) in [(3, Region::Checksum), (CHECKSUM_SIZE + 2, Region::Header), (block.len() - 1, Region::Payload)] {
            let err = frame_one(&mut SliceSource::new(&block[..cut]), &ReaderConfig::default(), &mut Vec::new()).unwrap_err();
            match err {
                BlockError::TruncatedInput { region: r, .. } => assert_eq!(r, region, "cut at {cut}"),
                other => panic!("cut at {cut}: unexpected {other}"),
            }
        }
    }
}
