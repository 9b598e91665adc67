use portal_session::config::PortalConfig;
use portal_session::routes::{self, HostState};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = PortalConfig::from_env().inspect_err(|e| tracing::error!(error = %e, "invalid portal configuration"))?;
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()
        .inspect_err(|e| tracing::error!(error = %e, "invalid PORT"))?;

    tracing::info!(
        auth = %config.auth_base_url,
        api = %config.api_base_url,
        secure_cookies = config.cookie_secure,
        "portal configuration resolved"
    );

    let state = HostState::from_config(config)?;
    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await?;

    tracing::info!(%port, "portal session host listening");
    axum::serve(listener, app).await?;
    Ok(())
}
