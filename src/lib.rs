pub mod errors;
pub mod floop_config;
pub mod logging;
pub mod server;
pub mod store;
pub mod stream;
pub mod ui;
pub mod watcher;
