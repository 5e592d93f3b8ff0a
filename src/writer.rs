//! Block stream writer.
//!
//! [`BlockWriter`] accepts arbitrary writes, cuts the input into blocks of
//! `block_size` uncompressed bytes, and emits each as
//! `checksum || header || payload`.  `flush` closes the pending partial
//! block early; `finish` flushes and returns the inner writer.
//!
//! Blocks are independent: a reader can start decoding at any block
//! boundary without state from earlier blocks.

use std::io::{self, Write};

use serde::Serialize;

use crate::block::encode_block;
use crate::codec::{get_codec, Codec};
use crate::config::WriterConfig;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriterStats {
    pub blocks:        u64,
    pub raw_bytes:     u64,
    /// Bytes written to the inner writer, checksums and headers included.
    pub written_bytes: u64,
}

pub struct BlockWriter<W: Write> {
    inner:   W,
    codec:   Box<dyn Codec>,
    config:  WriterConfig,
    pending: Vec<u8>,
    stats:   WriterStats,
}

impl<W: Write> BlockWriter<W> {
    pub fn new(inner: W, config: WriterConfig) -> Self {
        let codec = get_codec(config.method);
        Self::with_codec(inner, config, codec)
    }

    /// Use `codec` instead of the built-in codec for `config.method`.
    pub fn with_codec(inner: W, config: WriterConfig, codec: Box<dyn Codec>) -> Self {
        let mut config = config;
        config.method = codec.method();
        config.block_size = config.block_size.max(1);
        Self {
            inner,
            codec,
            pending: Vec::with_capacity(config.block_size),
            config,
            stats: WriterStats::default(),
        }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    /// Flush the trailing partial block and hand back the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.flush()?;
        Ok(self.inner)
    }

    fn emit(&mut self, data: &[u8]) -> io::Result<()> {
        let block = encode_block(data, self.codec.as_ref(), self.config.level)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        self.inner.write_all(&block)?;
        self.stats.blocks        += 1;
        self.stats.raw_bytes     += data.len() as u64;
        self.stats.written_bytes += block.len() as u64;
        Ok(())
    }

    /// Emit the buffered block.  On failure the bytes stay buffered and the
    /// next `write` or `flush` retries them.
    fn emit_pending(&mut self) -> io::Result<()> {
        let pending = std::mem::take(&mut self.pending);
        let result = self.emit(&pending);
        self.pending = pending;
        if result.is_ok() {
            self.pending.clear();
        }
        result
    }
}

/// Report bytes already taken from the caller's buffer ahead of an error.
fn accepted_or(accepted: usize, err: io::Error) -> io::Result<usize> {
    if accepted > 0 {
        Ok(accepted)
    } else {
        Err(err)
    }
}

impl<W: Write> Write for BlockWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let block_size = self.config.block_size;

        // A full block left behind by a failed emit goes out first.
        if self.pending.len() >= block_size {
            self.emit_pending()?;
        }

        let mut accepted = 0;
        if !self.pending.is_empty() {
            accepted = (block_size - self.pending.len()).min(buf.len());
            self.pending.extend_from_slice(&buf[..accepted]);
            if self.pending.len() == block_size {
                if let Err(e) = self.emit_pending() {
                    return accepted_or(accepted, e);
                }
            }
        }

        // Whole blocks straight from the caller's buffer.
        while buf.len() - accepted >= block_size {
            if let Err(e) = self.emit(&buf[accepted..accepted + block_size]) {
                return accepted_or(accepted, e);
            }
            accepted += block_size;
        }

        self.pending.extend_from_slice(&buf[accepted..]);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            self.emit_pending()?;
        }
        self.inner.flush()
    }
}
