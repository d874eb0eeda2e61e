//! Downloader service: credential-gated SolarEdge export form.
//!
//! Configuration is described in [`downloader::config`].

use std::sync::Arc;

use anyhow::Result;
use downloader::{
    config::{Env, Settings},
    secrets::SecretsClient,
    telemetry, AppState,
};
use solaredge::Gateway;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let env = Env::from_env();

    let stdout = tracing_subscriber::fmt::layer().json().with_filter(
        EnvFilter::from_default_env()
            .add_directive("downloader=info".parse()?)
            .add_directive("solaredge=info".parse()?),
    );

    // Operator log: append-only, API failures only.
    let (operator, _guard) = match &env.operator_log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "operator.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(telemetry::operator_layer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry().with(stdout).with(operator).init();

    let settings = Settings::load(env, &SecretsClient::from_env()).await;
    info!(
        base_url = settings.base_url.as_str(),
        api_key = settings.api_key.is_some(),
        users = settings.credentials.len(),
        "configuration loaded"
    );

    let state = Arc::new(AppState::new(
        Gateway::new(settings.base_url, settings.api_key),
        settings.credentials,
    ));
    let app = downloader::router(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    info!(addr = settings.bind_addr.as_str(), "downloader listening");

    axum::serve(listener, app).await?;

    Ok(())
}
