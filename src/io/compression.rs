//! Transparent compression for readers and writers.
//!
//! Codecs are picked by file extension first (`rides.csv.gz`), and on read fall
//! back to the magic bytes at the start of the stream. Without a match the
//! stream is passed through buffered.
//!
//! Built-in codecs, each behind a feature flag:
//! - **Gzip** (`.gz`) via `flate2` (feature `compression-gzip`)
//! - **Zstd** (`.zst`) via `zstd` (feature `compression-zstd`)

use crate::error::{AggrError, Result};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};

pub type DynRead = Box<dyn Read + Send>;
pub type DynSink = Box<dyn Write + Send>;
pub type DynWrite = Box<dyn FinishWrite>;

/// A writer that needs an explicit end, such as a compressor writing its
/// trailer. Dropping one without [`FinishWrite::finish`] loses any error the
/// trailer write would have reported.
pub trait FinishWrite: Write + Send {
    /// Flush everything, end the stream and flush the underlying sink.
    fn finish(self: Box<Self>) -> std::io::Result<()>;
}

impl<W: Write + Send> FinishWrite for BufWriter<W> {
    fn finish(self: Box<Self>) -> std::io::Result<()> {
        let mut inner = (*self).into_inner().map_err(|e| e.into_error())?;
        inner.flush()
    }
}

#[cfg(feature = "compression-gzip")]
impl<W: Write + Send> FinishWrite for flate2::write::GzEncoder<W> {
    fn finish(self: Box<Self>) -> std::io::Result<()> {
        let mut inner = flate2::write::GzEncoder::finish(*self)?;
        inner.flush()
    }
}

#[cfg(feature = "compression-zstd")]
impl<W: Write + Send> FinishWrite for zstd::stream::write::Encoder<'static, W> {
    fn finish(self: Box<Self>) -> std::io::Result<()> {
        let mut inner = zstd::stream::write::Encoder::finish(*self)?;
        inner.flush()
    }
}

pub trait CompressionCodec: Send + Sync {
    fn name(&self) -> &str;

    /// Lowercase extensions including the leading dot.
    fn extensions(&self) -> &[&str];

    fn magic_bytes(&self) -> Option<&[u8]>;

    fn wrap_reader(&self, reader: DynRead) -> std::io::Result<DynRead>;

    fn wrap_writer(&self, writer: DynSink) -> std::io::Result<DynWrite>;
}

fn builtin_codecs() -> Vec<Box<dyn CompressionCodec>> {
    vec![
        #[cfg(feature = "compression-gzip")]
        Box::new(GzipCodec),
        #[cfg(feature = "compression-zstd")]
        Box::new(ZstdCodec),
    ]
}

fn detect_from_extension(location: &str) -> Option<Box<dyn CompressionCodec>> {
    let lower = location.to_ascii_lowercase();
    builtin_codecs()
        .into_iter()
        .find(|codec| codec.extensions().iter().any(|ext| lower.ends_with(ext)))
}

fn detect_from_magic<R: BufRead>(reader: &mut R) -> Option<Box<dyn CompressionCodec>> {
    let buf = reader.fill_buf().ok()?;
    if buf.is_empty() {
        return None;
    }
    builtin_codecs()
        .into_iter()
        .find(|codec| codec.magic_bytes().is_some_and(|magic| buf.starts_with(magic)))
}

/// `location` without a trailing compression extension, used to find the
/// record format (`rides.csv.gz` -> `rides.csv`).
pub fn strip_compression_extension(location: &str) -> &str {
    let lower = location.to_ascii_lowercase();
    for codec in builtin_codecs() {
        for ext in codec.extensions() {
            if lower.ends_with(ext) {
                return &location[..location.len() - ext.len()];
            }
        }
    }
    location
}

/// Wrap `reader` with a decompressor when `location` or the stream header
/// names a known codec.
pub fn auto_detect_reader<R: Read + Send + 'static>(reader: R, location: &str) -> Result<DynRead> {
    if let Some(codec) = detect_from_extension(location) {
        return codec
            .wrap_reader(Box::new(reader))
            .map_err(|e| AggrError::io(format!("{location} ({})", codec.name()), e));
    }

    let mut buffered = BufReader::new(reader);
    if let Some(codec) = detect_from_magic(&mut buffered) {
        return codec
            .wrap_reader(Box::new(buffered))
            .map_err(|e| AggrError::io(format!("{location} ({})", codec.name()), e));
    }
    Ok(Box::new(buffered))
}

/// Wrap `writer` with a compressor when `location` carries a codec extension.
///
/// Call [`FinishWrite::finish`] on the result once done; compressed streams
/// are incomplete until then.
pub fn auto_detect_writer<W: Write + Send + 'static>(writer: W, location: &str) -> Result<DynWrite> {
    if let Some(codec) = detect_from_extension(location) {
        return codec
            .wrap_writer(Box::new(writer))
            .map_err(|e| AggrError::io(format!("{location} ({})", codec.name()), e));
    }
    Ok(Box::new(BufWriter::new(writer)))
}

#[cfg(feature = "compression-gzip")]
struct GzipCodec;

#[cfg(feature = "compression-gzip")]
impl CompressionCodec for GzipCodec {
    fn name(&self) -> &str {
        "gzip"
    }

    fn extensions(&self) -> &[&str] {
        &[".gz", ".gzip"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x1f, 0x8b])
    }

    fn wrap_reader(&self, reader: DynRead) -> std::io::Result<DynRead> {
        use flate2::read::MultiGzDecoder;
        Ok(Box::new(MultiGzDecoder::new(reader)))
    }

    fn wrap_writer(&self, writer: DynSink) -> std::io::Result<DynWrite> {
        use flate2::Compression;
        use flate2::write::GzEncoder;
        Ok(Box::new(GzEncoder::new(writer, Compression::default())))
    }
}

#[cfg(feature = "compression-zstd")]
struct ZstdCodec;

#[cfg(feature = "compression-zstd")]
impl CompressionCodec for ZstdCodec {
    fn name(&self) -> &str {
        "zstd"
    }

    fn extensions(&self) -> &[&str] {
        &[".zst", ".zstd"]
    }

    fn magic_bytes(&self) -> Option<&[u8]> {
        Some(&[0x28, 0xb5, 0x2f, 0xfd])
    }

    fn wrap_reader(&self, reader: DynRead) -> std::io::Result<DynRead> {
        zstd::stream::read::Decoder::new(reader).map(|d| Box::new(d) as DynRead)
    }

    fn wrap_writer(&self, writer: DynSink) -> std::io::Result<DynWrite> {
        zstd::stream::write::Encoder::new(writer, 3).map(|e| Box::new(e) as DynWrite)
    }
}
