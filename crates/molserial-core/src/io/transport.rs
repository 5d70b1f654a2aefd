//! Scoped byte-stream transport, plain or gzip.
//!
//! Readers are plain `BufRead` trait objects; gzip inflation is layered in
//! transparently. The write side is wrapped in [`ByteSink`] so that the gzip
//! trailer can be emitted explicitly at close time instead of relying on a
//! drop that cannot report errors.

use super::format::Compression;
use crate::error::Result;
use flate2::bufread::MultiGzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Opens a file for reading, inflating transparently when compressed.
pub fn reader_for_path(path: &Path, compression: Compression) -> Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    Ok(reader_for_stream(
        Box::new(BufReader::new(file)),
        compression,
    ))
}

/// Layers decompression over a caller-supplied stream.
pub fn reader_for_stream(stream: Box<dyn BufRead>, compression: Compression) -> Box<dyn BufRead> {
    match compression {
        Compression::None => stream,
        Compression::Gzip => Box::new(BufReader::new(MultiGzDecoder::new(stream))),
    }
}

/// Creates a file for writing, deflating transparently when compressed.
pub fn sink_for_path(path: &Path, compression: Compression) -> Result<ByteSink> {
    let file = File::create(path)?;
    Ok(sink_for_stream(
        Box::new(BufWriter::new(file)),
        compression,
    ))
}

/// Layers compression over a caller-supplied sink.
pub fn sink_for_stream(stream: Box<dyn Write>, compression: Compression) -> ByteSink {
    let kind = match compression {
        Compression::None => SinkKind::Plain(stream),
        Compression::Gzip => {
            SinkKind::Gzip(GzEncoder::new(stream, flate2::Compression::default()))
        }
    };
    ByteSink { kind: Some(kind) }
}

enum SinkKind {
    Plain(Box<dyn Write>),
    Gzip(GzEncoder<Box<dyn Write>>),
}

/// A write stream that must be closed to be complete.
///
/// Closing flushes and, for gzip, writes the stream trailer. Writing after
/// close is an error; closing twice is a no-op.
pub struct ByteSink {
    kind: Option<SinkKind>,
}

impl ByteSink {
    pub fn close(&mut self) -> io::Result<()> {
        match self.kind.take() {
            None => Ok(()),
            Some(SinkKind::Plain(mut stream)) => stream.flush(),
            Some(SinkKind::Gzip(encoder)) => encoder.finish()?.flush(),
        }
    }
}

impl Write for ByteSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.kind {
            Some(SinkKind::Plain(stream)) => stream.write(buf),
            Some(SinkKind::Gzip(encoder)) => encoder.write(buf),
            None => Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "write to a closed sink",
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.kind {
            Some(SinkKind::Plain(stream)) => stream.flush(),
            Some(SinkKind::Gzip(encoder)) => encoder.flush(),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn plain_sink_round_trips_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.txt");
        let mut sink = sink_for_path(&path, Compression::None).unwrap();
        sink.write_all(b"hello molecules\n").unwrap();
        sink.close().unwrap();

        let mut reader = reader_for_path(&path, Compression::None).unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello molecules\n");
    }

    #[test]
    fn gzip_sink_round_trips_bytes_and_is_really_compressed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.gz");
        let mut sink = sink_for_path(&path, Compression::Gzip).unwrap();
        sink.write_all(b"hello molecules\n").unwrap();
        sink.close().unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b], "missing gzip magic");

        let mut reader = reader_for_path(&path, Compression::Gzip).unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).unwrap();
        assert_eq!(content, "hello molecules\n");
    }

    #[test]
    fn reading_plain_content_as_gzip_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notgz");
        std::fs::write(&path, b"definitely not gzip").unwrap();
        let mut reader = reader_for_path(&path, Compression::Gzip).unwrap();
        let mut content = String::new();
        assert!(reader.read_to_string(&mut content).is_err());
    }

    #[test]
    fn closing_twice_is_a_no_op_and_late_writes_fail() {
        let mut sink = sink_for_stream(Box::new(Vec::new()), Compression::None);
        sink.write_all(b"x").unwrap();
        sink.close().unwrap();
        sink.close().unwrap();
        assert!(sink.write_all(b"y").is_err());
    }
}
