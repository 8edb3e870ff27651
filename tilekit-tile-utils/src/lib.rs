//! Tile addressing, payload compression and vector tile decoding shared by the tilekit tools.

use std::fmt::{Display, Formatter};

use serde::Serialize;

mod address;
pub use address::{AddressError, TileScheme, flip_row, stored_zoom, tiles_per_axis};

mod compression;
pub use compression::{
    Compression, CompressionError, classify_and_decompress, encode_gzip, encode_zlib,
    try_decompress,
};

pub mod mvt;

/// The highest zoom level a tile store may contain.
pub const MAX_ZOOM: u8 = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TileCoord {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    /// Checks that `x` and `y` fit into the `2^z * 2^z` grid of the zoom level.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.z <= MAX_ZOOM
            && u64::from(self.x) < tiles_per_axis(self.z)
            && u64::from(self.y) < tiles_per_axis(self.z)
    }
}

impl Display for TileCoord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Tile content family, as declared by the `format` metadata value of a tile store.
///
/// Only used to pick a file extension. `webp` shares the `png` family,
/// and anything unrecognized is [`TileFormat::Unknown`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TileFormat {
    Png,
    Jpg,
    Pbf,
    #[default]
    Unknown,
}

impl TileFormat {
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" | "webp" => Self::Png,
            "jpg" | "jpeg" => Self::Jpg,
            "pbf" | "mvt" => Self::Pbf,
            _ => Self::Unknown,
        }
    }

    /// File extension without the leading dot, if the format is known.
    #[must_use]
    pub fn extension(self) -> Option<&'static str> {
        match self {
            Self::Png => Some("png"),
            Self::Jpg => Some("jpg"),
            Self::Pbf => Some("pbf"),
            Self::Unknown => None,
        }
    }

    #[must_use]
    pub fn is_vector(self) -> bool {
        self == Self::Pbf
    }
}

impl Display for TileFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension().unwrap_or("unknown"))
    }
}
