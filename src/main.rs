use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;

use ragport::core::config::Settings;
use ragport::core::logging;
use ragport::server::router::router;
use ragport::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    logging::init(&settings.log.dir);
    settings.validate();

    let state = AppState::initialize(settings).await?;

    let bind_addr = format!(
        "{}:{}",
        state.settings.server.host, state.settings.server.port
    );
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind to {bind_addr}"))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    let app = router(state);
    // the rate limiter keys on peer addresses
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")?;

    Ok(())
}
