//! Pull-based block stream reader.
//!
//! [`BlockReader`] composes framing and decompression: every call to
//! [`next_block`](BlockReader::next_block) locates the next block, validates
//! it, decompresses it into a reusable buffer and exposes the result as a
//! byte window.  The reader also implements `Read` and `BufRead`, which
//! consume those windows transparently.
//!
//! # States
//!
//! ```text
//!   Positioned ──next_block──▶ Positioned      (block decoded)
//!   Positioned ──next_block──▶ Exhausted       (clean end of stream)
//!   Positioned ──next_block──▶ Failed          (fatal error, reported once)
//! ```
//!
//! `Exhausted` keeps answering `Ok(None)`; `Failed` answers
//! [`BlockError::ReaderFailed`] forever.

use std::io::{self, BufRead, Read};

use tracing::{debug, info, warn};

use crate::block::BlockError;
use crate::codec::CodecRegistry;
use crate::config::ReaderConfig;
use crate::decompress::Decompressor;
use crate::frame::read_next_block;
use crate::io_stream::{BufferedSource, ByteSource, SliceSource};
use crate::perf::{PerfCounters, StreamStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Positioned,
    Exhausted,
    Failed,
}

pub struct BlockReader<S: ByteSource> {
    source:       S,
    config:       ReaderConfig,
    decompressor: Decompressor,
    /// Reusable payload buffer for blocks that straddle a source refill.
    owned:        Vec<u8>,
    /// Reusable output buffer; `output[..window_len]` is the current block.
    output:       Vec<u8>,
    window_len:   usize,
    window_pos:   usize,
    state:        ReaderState,
    stats:        StreamStats,
}

impl<R: Read> BlockReader<BufferedSource<R>> {
    /// Read blocks from any `Read`, buffered with `config.buffer_size`.
    pub fn from_reader(inner: R, config: ReaderConfig) -> Self {
        let source = BufferedSource::with_capacity(inner, config.buffer_size);
        Self::new(source, config, CodecRegistry::builtin())
    }
}

impl<'a> BlockReader<SliceSource<'a>> {
    /// Read blocks from a fully resident buffer; every block is decoded in place.
    pub fn from_slice(data: &'a [u8], config: ReaderConfig) -> Self {
        Self::new(SliceSource::new(data), config, CodecRegistry::builtin())
    }
}

impl<S: ByteSource> BlockReader<S> {
    pub fn new(source: S, config: ReaderConfig, registry: CodecRegistry) -> Self {
        Self {
            source,
            config,
            decompressor: Decompressor::new(registry),
            owned:        Vec::new(),
            output:       Vec::new(),
            window_len:   0,
            window_pos:   0,
            state:        ReaderState::Positioned,
            stats:        StreamStats::default(),
        }
    }

    /// Decode the next block and return its full contents.
    ///
    /// Any unconsumed bytes of the previous block are discarded.
    pub fn next_block(&mut self) -> Result<Option<&[u8]>, BlockError> {
        match self.state {
            ReaderState::Failed    => return Err(BlockError::ReaderFailed),
            ReaderState::Exhausted => return Ok(None),
            ReaderState::Positioned => {}
        }

        self.window_len = 0;
        self.window_pos = 0;

        match self.fetch() {
            Ok(true) => Ok(Some(&self.output[..self.window_len])),
            Ok(false) => {
                self.state = ReaderState::Exhausted;
                info!(
                    blocks = self.stats.blocks,
                    consumed = self.stats.bytes_consumed,
                    decompressed = self.stats.decompressed_bytes,
                    "block stream exhausted"
                );
                Ok(None)
            }
            Err(e) => {
                self.state = ReaderState::Failed;
                warn!(block = self.stats.blocks, error = %e, "block stream failed");
                Err(e)
            }
        }
    }

    fn fetch(&mut self) -> Result<bool, BlockError> {
        let frame = match read_next_block(
            &mut self.source,
            &self.config,
            self.decompressor.registry(),
            &mut self.owned,
        )? {
            Some(frame) => frame,
            None => return Ok(false),
        };

        let compressed = frame.payload.bytes(self.source.buffer(), &self.owned);
        self.decompressor.decompress_frame(&frame, compressed, &mut self.output)?;

        let decompressed = frame.decompressed_size();
        let zero_copy = frame.payload.is_borrowed();
        debug!(
            block = self.stats.blocks,
            offset = frame.offset,
            method = frame.method.name(),
            compressed = frame.compressed_size(),
            decompressed,
            zero_copy,
            "decoded block"
        );
        self.stats.record(zero_copy, frame.stream_len(), decompressed);
        self.window_len = decompressed;
        Ok(true)
    }

    /// Unconsumed part of the current block.
    pub fn current(&self) -> &[u8] {
        &self.output[self.window_pos..self.window_len]
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    pub fn perf(&self) -> &PerfCounters {
        self.decompressor.perf()
    }

    pub fn stats(&self) -> &StreamStats {
        &self.stats
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

impl<S: ByteSource> BufRead for BlockReader<S> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        while self.window_pos == self.window_len {
            if self.next_block()?.is_none() {
                return Ok(&[]);
            }
        }
        Ok(&self.output[self.window_pos..self.window_len])
    }

    fn consume(&mut self, amt: usize) {
        self.window_pos = (self.window_pos + amt).min(self.window_len);
    }
}

impl<S: ByteSource> Read for BlockReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = {
            let available = self.fill_buf()?;
            let n = available.len().min(buf.len());
            buf[..n].copy_from_slice(&available[..n]);
            n
        };
        self.consume(n);
        Ok(n)
    }
}
