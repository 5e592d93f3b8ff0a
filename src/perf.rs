//! Performance counters for the decompression layer and per-stream totals.
//!
//! # Per-method counters
//!
//! [`PerfCounters`] accumulates, for every [`Method`], the number of blocks
//! decoded, the compressed and decompressed byte counts, and the wall time
//! spent inside the codec.  Only the decompressor mutates them; readers hand
//! out shared references.  Timing covers the codec call alone, so framing
//! and checksum cost never show up in codec throughput.
//!
//! # Stream statistics
//!
//! [`StreamStats`] counts what the framing layer did: how many blocks were
//! decoded straight out of the source buffer and how many had to be copied.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::codec::Method;

// ── Per-method counters ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MethodStats {
    pub blocks:             u64,
    /// Header plus payload bytes handed to the codec path.
    pub compressed_bytes:   u64,
    pub decompressed_bytes: u64,
    pub nanos:              u64,
}

impl MethodStats {
    fn record(&mut self, compressed: usize, decompressed: usize, elapsed: Duration) {
        self.blocks             += 1;
        self.compressed_bytes   += compressed as u64;
        self.decompressed_bytes += decompressed as u64;
        self.nanos = self.nanos.saturating_add(elapsed.as_nanos().min(u64::MAX as u128) as u64);
    }

    fn merge(&mut self, other: &MethodStats) {
        self.blocks             += other.blocks;
        self.compressed_bytes   += other.compressed_bytes;
        self.decompressed_bytes += other.decompressed_bytes;
        self.nanos = self.nanos.saturating_add(other.nanos);
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.nanos)
    }

    /// Decompressed output rate in MiB/s; zero when nothing was timed.
    pub fn throughput_mib_s(&self) -> f64 {
        if self.nanos == 0 {
            return 0.0;
        }
        (self.decompressed_bytes as f64 / (1024.0 * 1024.0)) / (self.nanos as f64 / 1e9)
    }

    pub fn ratio(&self) -> f64 {
        if self.compressed_bytes == 0 {
            return 1.0;
        }
        self.decompressed_bytes as f64 / self.compressed_bytes as f64
    }
}

/// Cumulative decompression counters keyed by method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PerfCounters {
    none: MethodStats,
    lz4:  MethodStats,
    zstd: MethodStats,
}

impl PerfCounters {
    pub(crate) fn record(&mut self, method: Method, compressed: usize, decompressed: usize, elapsed: Duration) {
        self.slot_mut(method).record(compressed, decompressed, elapsed);
    }

    pub fn get(&self, method: Method) -> &MethodStats {
        match method {
            Method::None => &self.none,
            Method::Lz4  => &self.lz4,
            Method::Zstd => &self.zstd,
        }
    }

    fn slot_mut(&mut self, method: Method) -> &mut MethodStats {
        match method {
            Method::None => &mut self.none,
            Method::Lz4  => &mut self.lz4,
            Method::Zstd => &mut self.zstd,
        }
    }

    pub fn total(&self) -> MethodStats {
        let mut total = MethodStats::default();
        for m in Method::ALL {
            total.merge(self.get(m));
        }
        total
    }

    /// Fold another reader's counters into these (for multi-file reports).
    pub fn merge(&mut self, other: &PerfCounters) {
        for m in Method::ALL {
            self.slot_mut(m).merge(other.get(m));
        }
    }
}

impl fmt::Display for PerfCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<6} {:>8} {:>14} {:>14} {:>7} {:>12} {:>10}",
                 "method", "blocks", "compressed", "decompressed", "ratio", "time", "MiB/s")?;
        for m in Method::ALL {
            let s = self.get(m);
            if s.blocks == 0 {
                continue;
            }
            writeln!(f, "{:<6} {:>8} {:>14} {:>14} {:>7.2} {:>12} {:>10.1}",
                     m.name(), s.blocks, s.compressed_bytes, s.decompressed_bytes,
                     s.ratio(), format!("{:?}", s.elapsed()), s.throughput_mib_s())?;
        }
        Ok(())
    }
}

// ── Stream statistics ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    pub blocks:             u64,
    /// Blocks decoded in place from the source buffer.
    pub zero_copy_blocks:   u64,
    /// Blocks copied into the reader's own payload buffer first.
    pub owned_blocks:       u64,
    /// Source bytes consumed, checksums included.
    pub bytes_consumed:     u64,
    pub decompressed_bytes: u64,
}

impl StreamStats {
    pub(crate) fn record(&mut self, zero_copy: bool, consumed: u64, decompressed: usize) {
        self.blocks += 1;
        if zero_copy {
            self.zero_copy_blocks += 1;
        } else {
            self.owned_blocks += 1;
        }
        self.bytes_consumed     += consumed;
        self.decompressed_bytes += decompressed as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_keyed_by_method() {
        let mut perf = PerfCounters::default();
        perf.record(Method::Lz4, 100, 400, Duration::from_micros(5));
        perf.record(Method::Lz4, 50, 200, Duration::from_micros(5));
        perf.record(Method::Zstd, 10, 1000, Duration::from_micros(1));

        let lz4 = perf.get(Method::Lz4);
        assert_eq!(lz4.blocks, 2);
        assert_eq!(lz4.compressed_bytes, 150);
        assert_eq!(lz4.decompressed_bytes, 600);
        assert_eq!(lz4.elapsed(), Duration::from_micros(10));
        assert_eq!(perf.get(Method::None).blocks, 0);

        let total = perf.total();
        assert_eq!(total.blocks, 3);
        assert_eq!(total.decompressed_bytes, 1600);
    }

    #[test]
    fn merge_adds_counters() {
        let mut a = PerfCounters::default();
        a.record(Method::None, 5, 5, Duration::ZERO);
        let mut b = PerfCounters::default();
        b.record(Method::None, 7, 7, Duration::ZERO);
        a.merge(&b);
        assert_eq!(a.get(Method::None).blocks, 2);
        assert_eq!(a.get(Method::None).decompressed_bytes, 12);
    }

    #[test]
    fn untimed_throughput_is_zero() {
        let s = MethodStats::default();
        assert_eq!(s.throughput_mib_s(), 0.0);
        assert_eq!(s.ratio(), 1.0);
    }

    #[test]
    fn display_skips_idle_methods() {
        let mut perf = PerfCounters::default();
        perf.record(Method::Zstd, 10, 100, Duration::from_millis(1));
        let text = perf.to_string();
        assert!(text.contains("zstd"));
        assert!(!text.contains("lz4"));
    }

    #[test]
    fn stream_stats_split_paths() {
        let mut s = StreamStats::default();
        s.record(true, 30, 5);
        s.record(false, 40, 6);
        assert_eq!(s.blocks, 2);
        assert_eq!(s.zero_copy_blocks, 1);
        assert_eq!(s.owned_blocks, 1);
        assert_eq!(s.bytes_consumed, 70);
        assert_eq!(s.decompressed_bytes, 11);
    }
}
