//! Streaming access to `MBTiles` tile stores.
//!
//! A [`TileStore`] owns one connection to a store and exposes metadata, zoom-bounded tile
//! iteration and payload rewriting. The batch jobs are built on top of it: directory export,
//! per-layer `GeoJSON` export and in-place decompression.
//! [`TileStorePool`] is the read-only, shareable flavor used for serving.

#![allow(clippy::missing_errors_doc)]

mod decompress;
pub use decompress::decompress_copy;

mod errors;
pub use errors::{MbtError, MbtResult};

mod features;
pub use features::{GeoJsonExport, merge_layers, write_layers};

mod metadata;
pub use metadata::{JSON_KEY, Metadata, parse_vector_layers};

mod pool;
pub use pool::TileStorePool;

mod queries;

mod report;
pub use report::{BatchReport, FailureKind, TileFailure};

mod store;
pub use store::{AccessMode, SchemaKind, TileStore};

mod summary;
pub use summary::{StoreSummary, TileKind};

mod tiles;
pub use tiles::{TileRecord, ZoomRange};

mod unpack;
pub use unpack::{DirectoryExport, METADATA_FILE};
