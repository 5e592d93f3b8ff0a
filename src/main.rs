use clap::{Parser, Subcommand};
use colblock::codec::{CodecRegistry, Method};
use colblock::config::{ReaderConfig, WriterConfig, DEFAULT_COMPRESSION_LEVEL};
use colblock::file;
use colblock::frame::read_next_block;
use colblock::io_stream::BufferedSource;
use colblock::perf::{PerfCounters, StreamStats};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "colblock", about = "Checksummed compressed block stream tool")]
struct Cli {
    /// Log per-block decisions (equivalent to RUST_LOG=colblock=debug)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into a block stream
    Compress {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Method: lz4 (default), zstd, none
        #[arg(short, long, default_value = "lz4")]
        method: String,
        /// Compression level (zstd only)
        #[arg(short, long, default_value_t = DEFAULT_COMPRESSION_LEVEL)]
        level: i32,
        /// Uncompressed bytes per block, in KiB
        #[arg(long, default_value = "1024")]
        block_size: usize,
    },
    /// Decompress one or more block streams
    Decompress {
        #[arg(short, long, required = true, num_args = 1..)]
        input: Vec<PathBuf>,
        /// Output path (single input only); defaults to <input>.out
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Decode and drop the output (measures decoding only)
        #[arg(long)]
        discard: bool,
        /// Reject blocks whose compressed size exceeds this many bytes
        #[arg(long)]
        max_compressed_size: Option<u32>,
        /// Reject blocks whose decompressed size exceeds this many bytes
        #[arg(long)]
        max_decompressed_size: Option<u32>,
        /// Skip checksum verification
        #[arg(long)]
        no_verify: bool,
        /// Input buffer size in bytes
        #[arg(long)]
        buffer_size: Option<usize>,
        /// Print per-method decompression counters
        #[arg(long)]
        stats: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the blocks of a stream without decompressing them
    Inspect {
        input: PathBuf,
        /// Skip checksum verification
        #[arg(long)]
        no_verify: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {

        // ── Compress ─────────────────────────────────────────────────────────
        Commands::Compress { input, output, method, level, block_size } => {
            let config = WriterConfig::default()
                .with_method(parse_method(&method)?)
                .with_level(level)
                .with_block_size(block_size * 1024);
            let data = std::fs::read(&input)?;
            let mut w = file::create(&output, config)?;
            w.write_all(&data)?;
            let stats = *w.stats();
            w.finish()?;
            println!("{} -> {}: {} blocks, {} -> {} bytes",
                input.display(), output.display(), stats.blocks, stats.raw_bytes, stats.written_bytes);
        }

        // ── Decompress ───────────────────────────────────────────────────────
        Commands::Decompress {
            input, output, discard, max_compressed_size, max_decompressed_size, no_verify, buffer_size, stats, json,
        } => {
            if output.is_some() && input.len() > 1 {
                return Err("--output can only be used with a single input".into());
            }

            let mut config = ReaderConfig::default().with_verify_checksums(!no_verify);
            if let Some(max) = max_compressed_size {
                config = config.with_max_compressed_size(max);
            }
            if let Some(max) = max_decompressed_size {
                config = config.with_max_decompressed_size(max);
            }
            if let Some(size) = buffer_size {
                config = config.with_buffer_size(size);
            }

            let jobs: Vec<(PathBuf, Option<PathBuf>)> = input
                .into_iter()
                .map(|path| {
                    let out = if discard {
                        None
                    } else {
                        Some(output.clone().unwrap_or_else(|| default_output(&path)))
                    };
                    (path, out)
                })
                .collect();

            let mut failed = 0usize;
            let mut perf = PerfCounters::default();
            let mut reports = Vec::new();
            for (result, (path, _)) in file::decode_files(&jobs, &config).into_iter().zip(&jobs) {
                match result {
                    Ok(report) => {
                        perf.merge(&report.perf);
                        if !json {
                            print_stream(&report.input, &report.stream, report.output.as_ref());
                        }
                        reports.push(report);
                    }
                    Err(e) => {
                        eprintln!("{}: {}", path.display(), e);
                        failed += 1;
                    }
                }
            }

            if json {
                serde_json::to_writer_pretty(io::stdout().lock(), &reports)?;
                println!();
            } else if stats {
                print!("{perf}");
            }
            if failed > 0 {
                return Err(format!("{failed} of {} input(s) failed", jobs.len()).into());
            }
        }

        // ── Inspect ──────────────────────────────────────────────────────────
        Commands::Inspect { input, no_verify } => {
            let config = ReaderConfig::default().with_verify_checksums(!no_verify);
            let registry = CodecRegistry::builtin();
            let mut source = BufferedSource::with_capacity(std::fs::File::open(&input)?, config.buffer_size);
            let mut owned = Vec::new();

            println!("{:>6} {:>12} {:<6} {:>12} {:>12}  {:<32}  path",
                     "block", "offset", "method", "compressed", "decompressed", "checksum");
            let mut index = 0u64;
            while let Some(frame) = read_next_block(&mut source, &config, &registry, &mut owned)? {
                println!("{:>6} {:>12} {:<6} {:>12} {:>12}  {:<32}  {}",
                    index, frame.offset, frame.method.name(),
                    frame.compressed_size(), frame.decompressed_size(),
                    frame.checksum.to_hex(),
                    if frame.payload.is_borrowed() { "zero-copy" } else { "owned" });
                index += 1;
            }
            println!("{index} block(s)");
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("colblock=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn parse_method(s: &str) -> Result<Method, Box<dyn std::error::Error>> {
    Method::from_name(s).ok_or_else(|| format!("unknown method '{s}' (expected none, lz4 or zstd)").into())
}

/// `<input>.out`, appended to the full file name.
fn default_output(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(".out");
    PathBuf::from(name)
}

fn print_stream(input: &Path, stream: &StreamStats, output: Option<&PathBuf>) {
    let dest = output.map(|p| p.display().to_string()).unwrap_or_else(|| "(discarded)".into());
    println!("{} -> {}: {} blocks ({} zero-copy, {} owned), {} -> {} bytes",
        input.display(), dest, stream.blocks, stream.zero_copy_blocks, stream.owned_blocks,
        stream.bytes_consumed, stream.decompressed_bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_appends_out() {
        assert_eq!(default_output(Path::new("col.bin")), PathBuf::from("col.bin.out"));
        assert_eq!(default_output(Path::new("data/part")), PathBuf::from("data/part.out"));
    }
}
