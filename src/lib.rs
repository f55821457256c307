pub mod app;
pub mod db;
pub mod format;
pub mod handlers;
pub mod ingest;
pub mod logging;
pub mod middleware;
pub mod server;
pub mod sweeper;
pub mod templates;
pub mod utils;
