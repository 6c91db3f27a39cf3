//! Server command implementation

use anyhow::Result;
use tallyscan_core::Config;

pub async fn cmd_serve(mut config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    let host = config.server.host.clone();
    let port = config.server.port;

    println!("🚀 Starting Tallyscan web server...");
    println!("   Provider: {}", config.provider.kind);
    if let Some(endpoint) = config.provider.active_endpoint() {
        println!("   Model: {} ({})", endpoint.model, endpoint.base_url);
    }
    println!(
        "   Max upload: {} MB",
        config.upload.max_bytes / 1024 / 1024
    );
    println!("   Listening: http://{}:{}", host, port);

    tallyscan_server::serve_with_config(config, &host, port).await
}
