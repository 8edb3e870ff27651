use std::fmt::{Display, Formatter};
use std::io::{Read, Write as _};

use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::{GzEncoder, ZlibEncoder};
use tracing::warn;

/// Compression wrapper of a tile payload, recognized by its leading magic bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Compression {
    /// Starts with `1F 8B`
    Gzip,
    /// Starts with `78 9C`, `78 01` or `78 DA`
    Zlib,
    Raw,
}

impl Compression {
    #[must_use]
    pub fn sniff(data: &[u8]) -> Self {
        match data {
            [0x1f, 0x8b, ..] => Self::Gzip,
            [0x78, 0x9c | 0x01 | 0xda, ..] => Self::Zlib,
            _ => Self::Raw,
        }
    }

    #[must_use]
    pub fn is_compressed(self) -> bool {
        self != Self::Raw
    }
}

impl Display for Compression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Gzip => "gzip",
            Self::Zlib => "zlib",
            Self::Raw => "raw",
        })
    }
}

/// A payload that looked compressed but could not be inflated.
///
/// The untouched input is kept so callers can fall back to it.
#[derive(thiserror::Error, Debug)]
#[error("Unable to decompress {compression} payload of {} bytes: {source}", .original.len())]
pub struct CompressionError {
    pub compression: Compression,
    #[source]
    pub source: std::io::Error,
    original: Vec<u8>,
}

impl CompressionError {
    #[must_use]
    pub fn original(&self) -> &[u8] {
        &self.original
    }

    #[must_use]
    pub fn into_original(self) -> Vec<u8> {
        self.original
    }
}

/// Inflate a gzip or zlib payload. Anything without a recognized header is returned as is.
pub fn try_decompress(data: Vec<u8>) -> Result<Vec<u8>, CompressionError> {
    let compression = Compression::sniff(&data);
    let result = match compression {
        Compression::Raw => return Ok(data),
        Compression::Gzip => read_all(GzDecoder::new(data.as_slice())),
        Compression::Zlib => read_all(ZlibDecoder::new(data.as_slice())),
    };
    result.map_err(|source| CompressionError {
        compression,
        source,
        original: data,
    })
}

/// Same as [`try_decompress`], but a payload that fails to inflate is logged and returned unchanged.
#[must_use]
pub fn classify_and_decompress(data: Vec<u8>) -> Vec<u8> {
    try_decompress(data).unwrap_or_else(|err| {
        warn!("{err}, keeping the payload as is");
        err.into_original()
    })
}

pub fn encode_gzip(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

pub fn encode_zlib(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut encoder = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

fn read_all(mut reader: impl Read) -> Result<Vec<u8>, std::io::Error> {
    let mut decompressed = Vec::new();
    reader.read_to_end(&mut decompressed)?;
    Ok(decompressed)
}
