use loadsim_server::config::Config;
use loadsim_server::greeting::greeting_routes;
use loadsim_server::telemetry::init_tracing;
use std::net::SocketAddr;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("loadsim_server=debug,greeter=debug,tower_http=debug");

    // Only HOST and PORT apply here
    let config = Config::from_env();
    let addr: SocketAddr = config.bind_addr().parse()?;
    info!("Greeting server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, greeting_routes()).await?;

    Ok(())
}
