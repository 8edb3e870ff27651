//! HTTP service for the tiles of a single `MBTiles` file.
//!
//! `GET /metadata` returns the metadata table as JSON, `GET /<zoom>/<column>/<row>.<ext>`
//! returns one tile. See [`config::Config`] for the available settings.

pub mod args;
pub mod config;
pub mod logging;
pub mod srv;

mod error;
pub use error::*;
