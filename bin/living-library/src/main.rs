//! # Living Library Proxy
//!
//! Assembles the proxy from configuration and serves it until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ll_api::AppState;
use ll_auth_jwt::JwtVerifier;
use ll_config::{LogFormat, Settings, DEFAULT_CONFIG_FILE};
use ll_core::traits::TokenVerifier;
use ll_gemini::{GeminiGateway, GeminiOptions};
use reqwest::Url;
use secrecy::ExposeSecret;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var_os("LIVING_LIBRARY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let settings = Settings::load(&config_path)?;

    init_tracing(settings.server.log_format);
    tracing::info!(config = %config_path.display(), "configuration loaded");

    let verifier = build_verifier(&settings)?;
    let api_key = settings
        .gemini
        .api_key
        .clone()
        .context("gemini api key missing")?;
    let gateway = GeminiGateway::new(
        api_key,
        GeminiOptions {
            endpoint: Url::parse(&settings.gemini.endpoint).context("invalid gemini endpoint")?,
            model: settings.gemini.model.clone(),
            temperature: settings.gemini.temperature,
            timeout: Duration::from_secs(settings.gemini.timeout_secs),
        },
    )?;

    let state = AppState {
        gateway: Arc::new(gateway),
        verifier,
    };
    let app = ll_api::router(state, settings.server.body_limit_bytes);

    let addr = settings.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, model = %settings.gemini.model, "living library proxy listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("proxy stopped");
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

fn build_verifier(settings: &Settings) -> anyhow::Result<Arc<dyn TokenVerifier>> {
    let auth = &settings.auth;
    let mut verifier = match (&auth.jwt_public_key_path, &auth.jwt_secret) {
        (Some(path), _) => {
            let pem = std::fs::read(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            tracing::info!(key = %path.display(), "verifying RS256 identity tokens");
            JwtVerifier::from_rsa_pem(&pem)?
        }
        (None, Some(secret)) => {
            tracing::info!("verifying HS256 identity tokens");
            JwtVerifier::from_secret(secret.expose_secret().as_bytes())
        }
        (None, None) => anyhow::bail!("no token verification key configured"),
    };
    if let Some(issuer) = &auth.issuer {
        verifier = verifier.with_issuer(issuer);
    }
    if let Some(audience) = &auth.audience {
        verifier = verifier.with_audience(audience);
    }
    Ok(Arc::new(verifier))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown requested");
}
