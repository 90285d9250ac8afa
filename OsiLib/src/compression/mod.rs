//! Section compression for LSF resources
//!
//! Compression settings travel as a packed flag byte: the low nibble selects
//! the method, the high nibble the level. Chunked payloads use the LZ4 frame
//! format; everything else is a single block.

use std::io::{Read, Write};

use crate::error::{Error, Result};

/// Compression method stored in the low nibble of the flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    None,
    Zlib,
    Lz4,
    Zstd,
}

impl CompressionMethod {
    /// Extracts the method from a packed flag byte.
    ///
    /// # Errors
    /// Returns an error if the method nibble is unknown.
    pub fn from_flags(flags: u8) -> Result<Self> {
        match flags & 0x0f {
            0 => Ok(Self::None),
            1 => Ok(Self::Zlib),
            2 => Ok(Self::Lz4),
            3 => Ok(Self::Zstd),
            method => Err(Error::UnsupportedCompressionMethod { method }),
        }
    }
}

/// Compression level stored in the high nibble of the flag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionLevel {
    Fast,
    Default,
    Max,
}

impl CompressionLevel {
    /// Extracts the level from a packed flag byte, defaulting to `Default`.
    #[must_use]
    pub fn from_flags(flags: u8) -> Self {
        match flags & 0xf0 {
            0x10 => Self::Fast,
            0x40 => Self::Max,
            _ => Self::Default,
        }
    }
}

/// Packs a (method, level) pair into the on-disk flag byte.
///
/// The level nibble is only set for an actual compression method.
#[must_use]
pub fn make_flags(method: CompressionMethod, level: CompressionLevel) -> u8 {
    let method_nibble = match method {
        CompressionMethod::None => return 0,
        CompressionMethod::Zlib => 0x01,
        CompressionMethod::Lz4 => 0x02,
        CompressionMethod::Zstd => 0x03,
    };
    let level_nibble = match level {
        CompressionLevel::Fast => 0x10,
        CompressionLevel::Default => 0x20,
        CompressionLevel::Max => 0x40,
    };
    method_nibble | level_nibble
}

/// Compress a section payload.
///
/// # Errors
/// Returns an error if the codec fails or the method is unsupported.
pub fn compress(
    data: &[u8],
    method: CompressionMethod,
    level: CompressionLevel,
    chunked: bool,
) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Zlib => compress_zlib(data, level),
        CompressionMethod::Lz4 => {
            if chunked {
                let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
                encoder.write_all(data)?;
                Ok(encoder.finish()?)
            } else {
                // lz4_flex has no high-compression mode; every level maps to
                // the block encoder.
                Ok(lz4_flex::compress(data))
            }
        }
        CompressionMethod::Zstd => Err(Error::UnsupportedCompressionMethod { method: 3 }),
    }
}

/// Decompress a section payload described by its packed flag byte.
///
/// # Errors
/// Returns an error if the codec fails, the method is unsupported, or the
/// output does not match `uncompressed_size`.
pub fn decompress(
    data: &[u8],
    uncompressed_size: usize,
    flags: u8,
    chunked: bool,
) -> Result<Vec<u8>> {
    match CompressionMethod::from_flags(flags)? {
        CompressionMethod::None => Ok(data.to_vec()),
        CompressionMethod::Zlib => {
            let mut decoder = flate2::read::ZlibDecoder::new(data);
            let mut result = Vec::with_capacity(uncompressed_size);
            decoder
                .read_to_end(&mut result)
                .map_err(|e| Error::ZlibDecompressionFailed { message: e.to_string() })?;
            Ok(result)
        }
        CompressionMethod::Lz4 => {
            if chunked {
                let mut decoder = lz4_flex::frame::FrameDecoder::new(data);
                let mut result = Vec::with_capacity(uncompressed_size);
                decoder.read_to_end(&mut result)?;
                Ok(result)
            } else {
                let result = lz4_flex::decompress(data, uncompressed_size)
                    .map_err(|e| Error::Lz4DecompressionFailed { message: e.to_string() })?;
                if result.len() == uncompressed_size {
                    Ok(result)
                } else {
                    Err(Error::DecompressedSizeMismatch {
                        expected: uncompressed_size,
                        actual: result.len(),
                    })
                }
            }
        }
        CompressionMethod::Zstd => Err(Error::UnsupportedCompressionMethod { method: 3 }),
    }
}

fn compress_zlib(data: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
    let compression = match level {
        CompressionLevel::Fast => flate2::Compression::fast(),
        CompressionLevel::Default => flate2::Compression::default(),
        CompressionLevel::Max => flate2::Compression::best(),
    };
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), compression);
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
