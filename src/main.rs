use alarm_vote_sync::config::Config;
use alarm_vote_sync::startup::{AppState, connect_store, router};
use std::error::Error;
use tracing_subscriber::EnvFilter;

#[macro_use]
extern crate tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenvy::dotenv().ok();

    // initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::load()?;
    let store = connect_store(&config).await?;
    let app_state = AppState::new(store.clone(), config.serialize_channels);

    let changes = store.watch().await?;
    tokio::spawn(app_state.dispatcher.clone().run(changes));

    let app = router(app_state);

    info!("listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
