//! Byte-level I/O: format/compression resolution, plain or gzip stream
//! transport, and the per-format record codecs.

pub mod codec;
pub mod format;
pub mod transport;
