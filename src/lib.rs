pub mod block;
pub mod codec;
pub mod config;
pub mod decompress;
pub mod file;
pub mod frame;
pub mod io_stream;
pub mod perf;
pub mod reader;
pub mod writer;

pub use block::{BlockError, BlockHeader, Checksum, encode_block};
pub use codec::{Codec, CodecRegistry, Method};
pub use config::{ReaderConfig, WriterConfig};
pub use io_stream::{BufferedSource, ByteSource, SliceSource};
pub use reader::{BlockReader, ReaderState};
pub use writer::BlockWriter;
