mod server;
pub use server::{Server, new_server, router};

mod tiles;
pub use tiles::{Route, TileAddressing, TileService, serve};
