use std::env;

use clap::Parser as _;
use log::log_enabled;
use tilekit::TilekitResult;
use tilekit::args::Args;
use tilekit::config::{Config, read_config};
use tilekit::logging::{DEFAULT_LOG_FILTER, init_tracing};
use tilekit::srv::{TileService, new_server};
use tracing::{error, info};

const VERSION: &str = env!("CARGO_PKG_VERSION");

async fn start(args: Args) -> TilekitResult<()> {
    info!("Starting tilekit v{VERSION}");

    let save_config = args.save_config.clone();
    let mut config = if let Some(ref cfg_filename) = args.config {
        info!("Using {}", cfg_filename.display());
        read_config(cfg_filename)?
    } else {
        Config::default()
    };
    args.merge_into_config(&mut config);

    if let Some(file_name) = save_config {
        config.save_to_file(file_name.as_path())?;
    } else {
        info!("Use --save-config to save or print the configuration.");
    }

    let config = config.finalize()?;
    info!(
        "Tiles are served as {:?} ({}), rows in {} order, zoom offset {}",
        config.tile_ext,
        config.tile_ext.content_type(),
        config.scheme,
        config.zoom_offset
    );
    let service = TileService::new(&config).await?;

    let (server, listen_addresses) = new_server(&config, service)?;
    info!("tilekit has been started on {listen_addresses}.");
    info!("Use http://{listen_addresses}/metadata to get the tileset metadata.");

    server.await
}

#[tokio::main]
async fn main() {
    let filter = env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_LOG_FILTER.to_string());
    init_tracing(&filter, env::var("TILEKIT_LOG_FORMAT").ok().as_deref());

    let args = Args::parse();
    if let Err(e) = start(args).await {
        // Ensure the message is printed, even if the logging is disabled
        if log_enabled!(log::Level::Error) {
            error!("{e}");
        } else {
            eprintln!("{e}");
        }
        std::process::exit(1);
    }
}
