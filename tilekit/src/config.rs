use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tilekit_tile_utils::TileScheme;
use tracing::{info, warn};

use crate::{TilekitError, TilekitResult};

pub const KEEP_ALIVE_DEFAULT: u64 = 75;
pub const LISTEN_ADDRESSES_DEFAULT: &str = "127.0.0.1:8005";

/// Extension of the served tiles, which decides the response content type.
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TileExt {
    #[default]
    Png,
    Jpg,
    Jpeg,
    Webp,
    Pbf,
}

impl TileExt {
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpg | Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Pbf => "application/x-protobuf",
        }
    }
}

/// Service configuration as read from a config file and the command line.
///
/// Every value is optional here; [`Config::finalize`] fills in the defaults.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// `MBTiles` file to serve
    pub mbtiles: Option<PathBuf>,
    pub tile_ext: Option<TileExt>,
    /// Subtracted from requested zoom levels to get the stored zoom level
    pub zoom_offset: Option<i32>,
    /// Row numbering used in request paths
    pub scheme: Option<TileScheme>,
    pub listen_addresses: Option<String>,
    pub workers: Option<usize>,
    /// Connection keep alive timeout, in seconds
    pub keep_alive: Option<u64>,

    #[serde(flatten, skip_serializing)]
    pub unrecognized: BTreeMap<String, serde_yaml::Value>,
}

/// Settings the service runs with, fixed for its whole lifetime.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceConfig {
    pub mbtiles: PathBuf,
    pub tile_ext: TileExt,
    pub zoom_offset: i32,
    pub scheme: TileScheme,
    pub listen_addresses: String,
    pub workers: usize,
    pub keep_alive: Duration,
}

impl Config {
    /// Apply defaults. Unknown keys from the config file are only reported.
    pub fn finalize(&self) -> TilekitResult<ServiceConfig> {
        for key in self.unrecognized.keys() {
            warn!("Ignoring unrecognized configuration key '{key}'. Please check your configuration file for typos.");
        }
        let mbtiles = self.mbtiles.clone().ok_or(TilekitError::NoTileStore)?;
        Ok(ServiceConfig {
            mbtiles,
            tile_ext: self.tile_ext.unwrap_or_default(),
            zoom_offset: self.zoom_offset.unwrap_or_default(),
            scheme: self.scheme.unwrap_or_default(),
            listen_addresses: self
                .listen_addresses
                .clone()
                .unwrap_or_else(|| LISTEN_ADDRESSES_DEFAULT.to_string()),
            workers: self.workers.unwrap_or_else(num_cpus::get),
            keep_alive: Duration::from_secs(self.keep_alive.unwrap_or(KEEP_ALIVE_DEFAULT)),
        })
    }

    /// Write the configuration as YAML, or print it if `file_name` is `-`.
    pub fn save_to_file(&self, file_name: &Path) -> TilekitResult<()> {
        let yaml = serde_yaml::to_string(&self).map_err(TilekitError::ConfigSerializeError)?;
        if file_name.as_os_str() == OsStr::new("-") {
            info!("Current system configuration:");
            println!("\n\n{yaml}\n");
            Ok(())
        } else {
            info!(
                "Saving config to {}, use --config to load it",
                file_name.display()
            );
            std::fs::write(file_name, yaml)
                .map_err(|e| TilekitError::ConfigWriteError(e, file_name.to_path_buf()))
        }
    }
}

pub fn read_config(file_name: &Path) -> TilekitResult<Config> {
    let contents = std::fs::read_to_string(file_name)
        .map_err(|e| TilekitError::ConfigLoadError(e, file_name.to_path_buf()))?;
    parse_config(&contents, file_name)
}

pub fn parse_config(contents: &str, file_name: &Path) -> TilekitResult<Config> {
    serde_yaml::from_str(contents)
        .map_err(|e| TilekitError::ConfigParseError(e, file_name.to_path_buf()))
}
