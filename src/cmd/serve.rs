//! HTTP API server: `floop serve`.

use anyhow::Result;

use floop::floop_config::FloopConfig;
use floop::server::{ServerConfig, start_server};

pub async fn cmd_serve(
    config: &FloopConfig,
    port: Option<u16>,
    host: Option<&str>,
    open: bool,
) -> Result<()> {
    let mut server_config = ServerConfig::from(config);
    if let Some(port) = port {
        server_config.port = port;
    }
    if let Some(host) = host {
        server_config.host = host.to_string();
    }
    server_config.open_browser = open;

    tracing::debug!(?server_config, "starting feedback server");
    start_server(server_config).await
}
