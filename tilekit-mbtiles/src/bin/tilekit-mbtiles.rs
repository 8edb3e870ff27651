use std::path::{Path, PathBuf};

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::{Parser, Subcommand};
use tilekit_mbtiles::{
    AccessMode, DirectoryExport, GeoJsonExport, MbtResult, TileStore, decompress_copy,
};
use tilekit_tile_utils::TileScheme;
use tilekit_tile_utils::mvt::MvtDecoder;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Defines the styles used for the CLI help output.
const HELP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Blue.on_default().bold())
    .usage(AnsiColor::Blue.on_default().bold())
    .literal(AnsiColor::White.on_default())
    .placeholder(AnsiColor::Green.on_default());

#[derive(Parser, PartialEq, Debug)]
#[command(
    version,
    name = "tilekit-mbtiles",
    about = "Inspect, unpack and decompress .mbtiles files",
    after_help = "Use RUST_LOG environment variable to control logging level, e.g. RUST_LOG=debug or RUST_LOG=tilekit_mbtiles=debug.",
    styles = HELP_STYLES
)]
pub struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, PartialEq, Debug)]
enum Commands {
    /// Show a summary of an `MBTiles` file: schema, tile kind, zoom levels, metadata and vector layers
    #[command(name = "info", alias = "summary")]
    Info { file: PathBuf },
    /// Gets a single value from the `MBTiles` metadata table.
    #[command(name = "meta-get", alias = "get-meta")]
    MetaGetValue {
        /// `MBTiles` file to read a value from
        file: PathBuf,
        /// Value to read
        key: String,
    },
    /// Unpack an `MBTiles` file into a `<z>/<x>/<y>.<ext>` directory tree, with a metadata.json
    #[command(name = "unpack")]
    Unpack {
        /// `MBTiles` file to read
        input_file: PathBuf,
        /// Directory to write. Defaults to the input file path without its extension
        output_directory: Option<PathBuf>,
        /// Row numbering of the written files: `tms` keeps rows as stored, `xyz` flips them
        #[arg(long, default_value = "tms", value_parser = clap::value_parser!(TileScheme))]
        scheme: TileScheme,
        /// Minimum zoom level to unpack
        #[arg(long)]
        min_zoom: Option<u8>,
        /// Maximum zoom level to unpack, clamped to the highest zoom in the file
        #[arg(long)]
        max_zoom: Option<u8>,
    },
    /// Decode all vector tiles of one zoom level and merge them into a `GeoJSON` document per layer
    #[command(name = "to-geojson")]
    ToGeoJson {
        /// `MBTiles` file with vector tiles
        input_file: PathBuf,
        /// JSON file to write
        output_file: PathBuf,
        /// Zoom level to decode
        #[arg(short, long)]
        zoom: u8,
        /// `xyz` flips stored rows to top-origin before projecting, `tms` uses them as stored
        #[arg(long, default_value = "xyz", value_parser = clap::value_parser!(TileScheme))]
        scheme: TileScheme,
        /// Only export this layer
        #[arg(long)]
        layer: Option<String>,
    },
    /// Copy an `MBTiles` file and decompress every gzip or zlib tile of the copy in place
    #[command(name = "decompress")]
    Decompress {
        /// `MBTiles` file to read
        input_file: PathBuf,
        /// `MBTiles` file to create, replacing any existing file
        output_file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tilekit_mbtiles=info"));
    tracing_subscriber::fmt()
        .compact()
        .without_time()
        .with_target(false)
        .with_env_filter(filter)
        .init();

    if let Err(err) = main_int().await {
        error!("{err}");
        std::process::exit(1);
    }
}

async fn main_int() -> anyhow::Result<()> {
    let args = Args::parse();
    match args.command {
        Commands::Info { file } => {
            let mut store = TileStore::open(&file, AccessMode::ReadOnly).await?;
            println!("MBTiles file summary for {store}");
            println!("{}", store.summary().await?);
        }
        Commands::MetaGetValue { file, key } => {
            meta_get_value(&file, &key).await?;
        }
        Commands::Unpack {
            input_file,
            output_directory,
            scheme,
            min_zoom,
            max_zoom,
        } => {
            let output_dir = output_directory.unwrap_or_else(|| input_file.with_extension(""));
            let export = DirectoryExport {
                input: input_file,
                output_dir,
                scheme,
                min_zoom,
                max_zoom,
            };
            println!("{}", export.run().await?);
        }
        Commands::ToGeoJson {
            input_file,
            output_file,
            zoom,
            scheme,
            layer,
        } => {
            let export = GeoJsonExport {
                input: input_file,
                output: output_file,
                zoom,
                scheme,
                layer,
            };
            println!("{}", export.run(&MvtDecoder).await?);
        }
        Commands::Decompress {
            input_file,
            output_file,
        } => {
            println!("{}", decompress_copy(&input_file, &output_file).await?);
        }
    }

    Ok(())
}

async fn meta_get_value(file: &Path, key: &str) -> MbtResult<()> {
    let mut store = TileStore::open(file, AccessMode::ReadOnly).await?;
    if let Some(s) = store.get_metadata_value(key).await? {
        println!("{s}");
    }
    Ok(())
}
