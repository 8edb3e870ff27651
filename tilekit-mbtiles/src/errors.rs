use std::path::PathBuf;

use tilekit_tile_utils::TileCoord;

#[derive(thiserror::Error, Debug)]
pub enum MbtError {
    #[error("MBTiles file does not exist: {}", .0.display())]
    StoreNotFound(PathBuf),

    #[error("MBTiles filepath contains unsupported characters: {}", .0.display())]
    UnsupportedCharsInFilepath(PathBuf),

    #[error("MBTiles file {0} has no `tiles` table or view")]
    MissingTilesRelation(String),

    #[error("The `tiles` relation of MBTiles file {0} is a {1}, expected a table or a view")]
    UnsupportedTilesRelation(String, String),

    #[error("Invalid zoom level {1} found in MBTiles file {0}")]
    InvalidZoomValue(String, i64),

    #[error("Tile {1} does not exist in MBTiles file {0}")]
    TileNotFound(String, TileCoord),

    #[error(transparent)]
    SqlxError(#[from] sqlx::Error),

    #[error(transparent)]
    JsonSerdeError(#[from] serde_json::Error),

    #[error("Unable to write {}: {source}", .path.display())]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type MbtResult<T> = Result<T, MbtError>;
