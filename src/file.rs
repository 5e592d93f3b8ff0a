//! File-level helpers used by the CLI.
//!
//! ```no_run
//! use colblock::file;
//! use colblock::{ReaderConfig, WriterConfig};
//! use std::io::Write;
//!
//! let mut w = file::create("col.bin", WriterConfig::default())?;
//! w.write_all(b"column bytes")?;
//! w.finish()?;
//!
//! let report = file::decode_file("col.bin", None, &ReaderConfig::default())?;
//! assert_eq!(report.stream.decompressed_bytes, 12);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Parallel decoding
//!
//! [`decode_files`] decodes several files at once when the `parallel`
//! feature is enabled.  Each file gets its own reader, buffers and counters;
//! nothing is shared between threads.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::block::BlockError;
use crate::config::{ReaderConfig, WriterConfig};
use crate::io_stream::BufferedSource;
use crate::perf::{PerfCounters, StreamStats};
use crate::reader::BlockReader;
use crate::writer::BlockWriter;

pub type FileReader = BlockReader<BufferedSource<File>>;

/// Open a block file for streaming reads.
pub fn open<P: AsRef<Path>>(path: P, config: ReaderConfig) -> io::Result<FileReader> {
    Ok(BlockReader::from_reader(File::open(path)?, config))
}

/// Create (truncating) a block file.
pub fn create<P: AsRef<Path>>(path: P, config: WriterConfig) -> io::Result<BlockWriter<BufWriter<File>>> {
    Ok(BlockWriter::new(BufWriter::new(File::create(path)?), config))
}

/// Outcome of decoding one file.
#[derive(Debug, Clone, Serialize)]
pub struct DecodeReport {
    pub input:  PathBuf,
    pub output: Option<PathBuf>,
    pub stream: StreamStats,
    pub perf:   PerfCounters,
}

/// Decode `input` block by block, writing the decompressed bytes to `output`
/// when given and discarding them otherwise.
pub fn decode_file<P: AsRef<Path>>(
    input:  P,
    output: Option<&Path>,
    config: &ReaderConfig,
) -> Result<DecodeReport, BlockError> {
    let input = input.as_ref();
    let mut reader = open(input, config.clone())?;
    let mut sink: Option<BufWriter<File>> = match output {
        Some(path) => Some(BufWriter::new(File::create(path)?)),
        None       => None,
    };

    while let Some(block) = reader.next_block()? {
        if let Some(w) = sink.as_mut() {
            w.write_all(block)?;
        }
    }
    if let Some(mut w) = sink {
        w.flush()?;
    }

    Ok(DecodeReport {
        input:  input.to_path_buf(),
        output: output.map(Path::to_path_buf),
        stream: *reader.stats(),
        perf:   reader.perf().clone(),
    })
}

/// Decode each `(input, output)` job independently.  Results are returned in
/// job order; one file failing does not stop the others.
pub fn decode_files(
    jobs:   &[(PathBuf, Option<PathBuf>)],
    config: &ReaderConfig,
) -> Vec<Result<DecodeReport, BlockError>> {
    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;

        jobs.par_iter()
            .map(|(input, output)| decode_file(input, output.as_deref(), config))
            .collect()
    }

    #[cfg(not(feature = "parallel"))]
    {
        jobs.iter()
            .map(|(input, output)| decode_file(input, output.as_deref(), config))
            .collect()
    }
}
