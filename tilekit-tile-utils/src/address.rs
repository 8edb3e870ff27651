use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::MAX_ZOOM;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Zoom level {zoom} with offset {offset} does not map to a stored zoom in 0..={MAX_ZOOM}")]
    ZoomOutOfRange { zoom: i64, offset: i32 },

    #[error("Unknown tile scheme '{0}', expected 'tms' or 'xyz'")]
    UnknownScheme(String),
}

/// Row numbering convention of a tile address.
///
/// Tile stores keep rows in [TMS](https://wiki.openstreetmap.org/wiki/TMS) order (row 0 at the bottom).
/// [`TileScheme::Xyz`] is the top-origin "slippy map" order used by most web clients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileScheme {
    /// Rows as stored, row 0 at the bottom
    #[default]
    Tms,
    /// Rows flipped, row 0 at the top
    Xyz,
}

impl TileScheme {
    /// Translate a row between the stored convention and this one.
    ///
    /// The flip is its own inverse, so the same call converts a stored row into this scheme
    /// and a row in this scheme back into the stored one.
    #[must_use]
    pub fn translate_row(self, zoom: u8, row: u32) -> u32 {
        match self {
            Self::Tms => row,
            Self::Xyz => flip_row(zoom, row),
        }
    }
}

impl FromStr for TileScheme {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tms" => Ok(Self::Tms),
            "xyz" => Ok(Self::Xyz),
            _ => Err(AddressError::UnknownScheme(s.to_string())),
        }
    }
}

impl Display for TileScheme {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Tms => "tms",
            Self::Xyz => "xyz",
        })
    }
}

/// Number of tiles along one axis at the given zoom level, `2^zoom`.
#[must_use]
pub fn tiles_per_axis(zoom: u8) -> u64 {
    1_u64 << zoom.min(63)
}

/// Flip a row between top-origin and bottom-origin numbering: `(2^zoom - 1) - row`.
///
/// `row` must be inside the grid of `zoom`.
#[must_use]
pub fn flip_row(zoom: u8, row: u32) -> u32 {
    debug_assert!(zoom <= MAX_ZOOM, "zoom {zoom} is above {MAX_ZOOM}");
    let max_row = tiles_per_axis(zoom) - 1;
    u32::try_from(max_row.saturating_sub(u64::from(row))).unwrap_or(u32::MAX)
}

/// Map an externally presented zoom level to the stored one by subtracting `offset`.
pub fn stored_zoom(zoom: i64, offset: i32) -> Result<u8, AddressError> {
    zoom.checked_sub(i64::from(offset))
        .and_then(|z| u8::try_from(z).ok())
        .filter(|z| *z <= MAX_ZOOM)
        .ok_or(AddressError::ZoomOutOfRange { zoom, offset })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, 0, 0)]
    #[case(1, 0, 1)]
    #[case(1, 1, 0)]
    #[case(2, 0, 3)]
    #[case(3, 2, 5)]
    #[case(30, 0, (1 << 30) - 1)]
    fn flip(#[case] zoom: u8, #[case] row: u32, #[case] expected: u32) {
        assert_eq!(flip_row(zoom, row), expected);
    }

    #[test]
    fn flip_is_self_inverse() {
        for zoom in 0..=10 {
            for row in 0..(1_u32 << zoom) {
                assert_eq!(flip_row(zoom, flip_row(zoom, row)), row, "z={zoom} row={row}");
            }
        }
        for zoom in 11..=MAX_ZOOM {
            let max = (1_u32 << zoom) - 1;
            for row in [0, 1, max / 2, max - 1, max] {
                assert_eq!(flip_row(zoom, flip_row(zoom, row)), row, "z={zoom} row={row}");
            }
        }
    }

    #[test]
    fn scheme_translation() {
        assert_eq!(TileScheme::Tms.translate_row(2, 1), 1);
        assert_eq!(TileScheme::Xyz.translate_row(2, 1), 2);
        assert_eq!(TileScheme::default(), TileScheme::Tms);
    }

    #[test]
    fn scheme_parsing() {
        assert_eq!("tms".parse::<TileScheme>(), Ok(TileScheme::Tms));
        assert_eq!("XYZ".parse::<TileScheme>(), Ok(TileScheme::Xyz));
        assert_eq!(
            "google".parse::<TileScheme>(),
            Err(AddressError::UnknownScheme("google".to_string()))
        );
        assert_eq!(TileScheme::Xyz.to_string(), "xyz");
    }

    #[rstest]
    #[case(3, 0, Ok(3))]
    #[case(3, 2, Ok(1))]
    #[case(3, -2, Ok(5))]
    #[case(0, 0, Ok(0))]
    #[case(1, 2, Err(AddressError::ZoomOutOfRange { zoom: 1, offset: 2 }))]
    #[case(-1, 0, Err(AddressError::ZoomOutOfRange { zoom: -1, offset: 0 }))]
    #[case(31, 0, Err(AddressError::ZoomOutOfRange { zoom: 31, offset: 0 }))]
    fn zoom_offset(
        #[case] zoom: i64,
        #[case] offset: i32,
        #[case] expected: Result<u8, AddressError>,
    ) {
        assert_eq!(stored_zoom(zoom, offset), expected);
    }
}
