use std::fmt::{Display, Formatter};

use enum_display::EnumDisplay;
use serde::Serialize;
use tilekit_tile_utils::TileCoord;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, EnumDisplay)]
#[enum_display(case = "Kebab")]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    /// The payload looked compressed but could not be inflated
    Decompression,
    /// The payload could not be decoded as a vector tile
    Decode,
    /// The result could not be written out
    Write,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TileFailure {
    pub coord: TileCoord,
    pub kind: FailureKind,
    pub message: String,
}

/// Outcome of a batch job that keeps going past individual tile failures.
///
/// A tile is `succeeded` when it made it into the output, even if a recoverable
/// failure was recorded for it along the way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: u64,
    pub succeeded: u64,
    pub failures: Vec<TileFailure>,
}

impl BatchReport {
    pub(crate) fn fail(&mut self, coord: TileCoord, kind: FailureKind, message: impl Display) {
        let message = message.to_string();
        warn!("Tile {coord}: {message}");
        self.failures.push(TileFailure {
            coord,
            kind,
            message,
        });
    }

    #[must_use]
    pub fn failures_of(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }

    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl Display for BatchReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} tiles processed, {} succeeded, {} failures",
            self.processed,
            self.succeeded,
            self.failures.len()
        )?;
        for kind in [
            FailureKind::Decompression,
            FailureKind::Decode,
            FailureKind::Write,
        ] {
            let count = self.failures_of(kind);
            if count > 0 {
                write!(f, "\n  {kind}: {count}")?;
            }
        }
        Ok(())
    }
}
