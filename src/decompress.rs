//! Decompression dispatch.
//!
//! [`Decompressor`] turns one framed `header || payload` window into the
//! block's uncompressed bytes inside a caller-owned, reusable output buffer.
//! The buffer is resized to `decompressed_size + slack` and the codec is
//! handed exactly the first `decompressed_size` bytes of it, which it must
//! fill completely.

use std::time::Instant;

use crate::block::{BlockError, HEADER_SIZE};
use crate::codec::{CodecError, CodecRegistry, Method};
use crate::frame::Frame;
use crate::perf::PerfCounters;

#[derive(Debug, Default)]
pub struct Decompressor {
    registry: CodecRegistry,
    perf:     PerfCounters,
}

impl Decompressor {
    pub fn new(registry: CodecRegistry) -> Self {
        Self { registry, perf: PerfCounters::default() }
    }

    pub fn registry(&self) -> &CodecRegistry {
        &self.registry
    }

    pub fn perf(&self) -> &PerfCounters {
        &self.perf
    }

    /// Decompress `compressed` (header included, `compressed.len()` equal to
    /// the header's compressed size) into `out[..decompressed_size]`.
    ///
    /// `offset` is only used to label errors.
    pub fn decompress(
        &mut self,
        compressed:        &[u8],
        method:            Method,
        decompressed_size: usize,
        out:               &mut Vec<u8>,
        offset:            u64,
    ) -> Result<(), BlockError> {
        debug_assert!(compressed.len() >= HEADER_SIZE);
        let codec = self.registry.get(method);
        out.resize(decompressed_size + codec.slack(), 0);

        let started = Instant::now();
        let produced = codec
            .decompress(&compressed[HEADER_SIZE..], &mut out[..decompressed_size])
            .map_err(|source| BlockError::CodecFailure { offset, method, source })?;
        let elapsed = started.elapsed();

        if produced != decompressed_size {
            return Err(BlockError::CodecFailure {
                offset,
                method,
                source: CodecError::LengthMismatch { expected: decompressed_size, actual: produced },
            });
        }

        self.perf.record(method, compressed.len(), decompressed_size, elapsed);
        Ok(())
    }

    /// Convenience over [`decompress`](Self::decompress) for an already
    /// resolved frame.
    pub fn decompress_frame(&mut self, frame: &Frame, compressed: &[u8], out: &mut Vec<u8>) -> Result<(), BlockError> {
        self.decompress(compressed, frame.method, frame.decompressed_size(), out, frame.offset)
    }
}
