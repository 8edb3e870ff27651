use std::path::PathBuf;

use clap::Parser;
use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use tilekit_tile_utils::TileScheme;

use crate::config::{Config, KEEP_ALIVE_DEFAULT, LISTEN_ADDRESSES_DEFAULT, TileExt};

const HELP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Blue.on_default().bold())
    .usage(AnsiColor::Blue.on_default().bold())
    .literal(AnsiColor::White.on_default())
    .placeholder(AnsiColor::Green.on_default());

#[derive(Parser, Debug, PartialEq, Default)]
#[command(
    about = "Serve the tiles of one MBTiles file over HTTP",
    version,
    styles = HELP_STYLES
)]
pub struct Args {
    /// `MBTiles` file to serve
    #[arg(env = "TILEKIT_MBTILES")]
    pub mbtiles: Option<PathBuf>,
    /// Path to a YAML configuration file. Command line values take precedence.
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Save the resulting configuration to a file, or print it with `-`.
    #[arg(long)]
    pub save_config: Option<PathBuf>,
    /// Extension of the served tiles, decides the response content type. [DEFAULT: png]
    #[arg(long, env = "TILEKIT_TILE_EXT")]
    pub tile_ext: Option<TileExt>,
    /// Subtracted from requested zoom levels to get the stored zoom level. [DEFAULT: 0]
    #[arg(long, env = "TILEKIT_ZOOM_OFFSET", allow_negative_numbers = true)]
    pub zoom_offset: Option<i32>,
    /// Row numbering of request paths, `tms` or `xyz`. [DEFAULT: tms]
    #[arg(long, env = "TILEKIT_SCHEME", value_parser = clap::value_parser!(TileScheme))]
    pub scheme: Option<TileScheme>,
    #[arg(help = format!("The socket address to bind. [DEFAULT: {LISTEN_ADDRESSES_DEFAULT}]"), short, long, env = "TILEKIT_LISTEN_ADDRESSES")]
    pub listen_addresses: Option<String>,
    /// Number of web server workers
    #[arg(short = 'W', long)]
    pub workers: Option<usize>,
    #[arg(help = format!("Connection keep alive timeout in seconds. [DEFAULT: {KEEP_ALIVE_DEFAULT}]"), short, long)]
    pub keep_alive: Option<u64>,
}

impl Args {
    /// Override config values with the ones from the command line.
    pub fn merge_into_config(self, config: &mut Config) {
        if self.mbtiles.is_some() {
            config.mbtiles = self.mbtiles;
        }
        if self.tile_ext.is_some() {
            config.tile_ext = self.tile_ext;
        }
        if self.zoom_offset.is_some() {
            config.zoom_offset = self.zoom_offset;
        }
        if self.scheme.is_some() {
            config.scheme = self.scheme;
        }
        if self.listen_addresses.is_some() {
            config.listen_addresses = self.listen_addresses;
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }
        if self.keep_alive.is_some() {
            config.keep_alive = self.keep_alive;
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("tilekit").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn parse_all_options() {
        let args = parse(&[
            "world.mbtiles",
            "--tile-ext",
            "pbf",
            "--zoom-offset",
            "-3",
            "--scheme",
            "XYZ",
            "-l",
            "0.0.0.0:9000",
            "-W",
            "2",
            "-k",
            "5",
        ]);
        assert_eq!(
            args,
            Args {
                mbtiles: Some(PathBuf::from("world.mbtiles")),
                tile_ext: Some(TileExt::Pbf),
                zoom_offset: Some(-3),
                scheme: Some(TileScheme::Xyz),
                listen_addresses: Some("0.0.0.0:9000".to_string()),
                workers: Some(2),
                keep_alive: Some(5),
                ..Default::default()
            }
        );
    }

    #[test]
    fn reject_bad_values() {
        let bad = [
            ["tilekit", "--scheme", "wmts"],
            ["tilekit", "--tile-ext", "gif"],
            ["tilekit", "--zoom-offset", "x"],
        ];
        for args in bad {
            assert!(Args::try_parse_from(args).is_err(), "{args:?}");
        }
    }

    #[test]
    fn command_line_overrides_config() {
        let mut config = Config {
            mbtiles: Some(PathBuf::from("from-file.mbtiles")),
            zoom_offset: Some(1),
            keep_alive: Some(30),
            ..Default::default()
        };
        Args {
            mbtiles: Some(PathBuf::from("from-args.mbtiles")),
            scheme: Some(TileScheme::Xyz),
            ..Default::default()
        }
        .merge_into_config(&mut config);

        assert_eq!(
            config,
            Config {
                mbtiles: Some(PathBuf::from("from-args.mbtiles")),
                zoom_offset: Some(1),
                scheme: Some(TileScheme::Xyz),
                keep_alive: Some(30),
                ..Default::default()
            }
        );
    }
}
