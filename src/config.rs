//! Reader and writer settings.
//!
//! Both structs deserialize with per-field defaults, so a partial JSON
//! document (or none at all) yields a usable configuration.

use serde::{Deserialize, Serialize};

use crate::block::{MAX_COMPRESSED_SIZE, MAX_DECOMPRESSED_SIZE};
use crate::codec::Method;

/// Default input buffer for [`BufferedSource`](crate::io_stream::BufferedSource): 1 MiB.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;
/// Default uncompressed bytes per block written by [`BlockWriter`](crate::writer::BlockWriter): 1 MiB.
pub const DEFAULT_BLOCK_SIZE: usize = 1024 * 1024;
/// Default Zstd compression level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Upper bound on a header's `compressed_size`.
    pub max_compressed_size: u32,
    /// Upper bound on a header's `decompressed_size`; checked before the
    /// output buffer is grown.
    pub max_decompressed_size: u32,
    /// Recompute and compare every block checksum before decompressing.
    /// Turning this off measures raw decompression cost and nothing else.
    pub verify_checksums: bool,
    /// Capacity of the input buffer when reading from a plain `Read`.
    pub buffer_size: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            max_compressed_size:   MAX_COMPRESSED_SIZE,
            max_decompressed_size: MAX_DECOMPRESSED_SIZE,
            verify_checksums:      true,
            buffer_size:           DEFAULT_BUFFER_SIZE,
        }
    }
}

impl ReaderConfig {
    pub fn with_max_compressed_size(mut self, max: u32) -> Self {
        self.max_compressed_size = max;
        self
    }

    pub fn with_max_decompressed_size(mut self, max: u32) -> Self {
        self.max_decompressed_size = max;
        self
    }

    pub fn with_verify_checksums(mut self, verify: bool) -> Self {
        self.verify_checksums = verify;
        self
    }

    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    pub method:     Method,
    pub level:      i32,
    pub block_size: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            method:     Method::Lz4,
            level:      DEFAULT_COMPRESSION_LEVEL,
            block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl WriterConfig {
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_level(mut self, level: i32) -> Self {
        self.level = level;
        self
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: ReaderConfig = serde_json::from_str(r#"{ "verify_checksums": false }"#).unwrap();
        assert!(!cfg.verify_checksums);
        assert_eq!(cfg.max_compressed_size, MAX_COMPRESSED_SIZE);
        assert_eq!(cfg.max_decompressed_size, MAX_DECOMPRESSED_SIZE);
        assert_eq!(cfg.buffer_size, DEFAULT_BUFFER_SIZE);

        let cfg: WriterConfig = serde_json::from_str(r#"{ "method": "zstd", "level": 9 }"#).unwrap();
        assert_eq!(cfg.method, Method::Zstd);
        assert_eq!(cfg.level, 9);
        assert_eq!(cfg.block_size, DEFAULT_BLOCK_SIZE);
    }

    #[test]
    fn zero_sizes_are_clamped() {
        assert_eq!(ReaderConfig::default().with_buffer_size(0).buffer_size, 1);
        assert_eq!(WriterConfig::default().with_block_size(0).block_size, 1);
    }
}
