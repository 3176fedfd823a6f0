use panomedia_api::{setup, telemetry};
use panomedia_core::Config;

// Tile jobs allocate large image buffers on many tasks at once.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;
    telemetry::init_telemetry(&config);

    let (state, router) = setup::initialize_app(config.clone()).await?;

    setup::server::start_server(&config, router).await?;

    state.shutdown().await;
    Ok(())
}
