use std::sync::Arc;

use tracing::{info, warn};

use campus_api::ApiClient;
use campus_gateway::GatewayConfig;
use campus_sync::{SyncConfig, SyncEngine};
use campus_types::models::UnreadDomain;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campus=debug".into()),
        )
        .init();

    // Config
    let api_url = std::env::var("CAMPUS_API_URL").unwrap_or_else(|_| "http://localhost:3000".into());
    let gateway_url = std::env::var("CAMPUS_GATEWAY_URL").unwrap_or_else(|_| api_url.clone());
    let token = std::env::var("CAMPUS_TOKEN").unwrap_or_default();
    let page_size: u32 = std::env::var("CAMPUS_PAGE_SIZE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(20);

    let api = Arc::new(ApiClient::new(&api_url, &token)?);

    let config = SyncConfig {
        domains: UnreadDomain::ALL.to_vec(),
        page_size,
        recent_limit: None,
    };
    let channels = config
        .domains
        .iter()
        .map(|d| d.channel().to_string())
        .collect();
    let gateway = campus_gateway::spawn(GatewayConfig {
        url: gateway_url,
        token,
        channels,
    });

    let engine = SyncEngine::spawn(config, api.clone(), api, gateway);

    for domain in engine.domains() {
        if let Err(e) = engine.refresh(domain).await {
            warn!("initial refresh failed for {:?}: {}", domain, e);
        }
    }

    // Log every published view change until ctrl-c.
    for domain in engine.domains() {
        if let Some(mut rx) = engine.watch(domain) {
            tokio::spawn(async move {
                while rx.changed().await.is_ok() {
                    let view = rx.borrow().clone();
                    info!(
                        "{:?}: {} unread, {} items loaded{}",
                        domain,
                        view.unread_count,
                        view.items.len(),
                        if view.stale { " (stale)" } else { "" }
                    );
                }
            });
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    Ok(())
}
