//! # Sample Drop RS
//!
//! Sample-pack storefront backend: checkout, signed downloads, intake.
//!
//! ## Usage
//!
//! ```bash
//! # Set environment variables
//! export DOWNLOAD_SECRET=$(openssl rand -hex 32)
//! export STRIPE_SECRET_KEY=sk_test_...
//! export STRIPE_WEBHOOK_SECRET=whsec_...
//! export RESEND_API_KEY=re_...
//!
//! # Run the server
//! sample-drop
//! ```

use drop_api::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    print_banner();

    let state = AppState::new()?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Catalog items: {}", state.catalog.len());
    info!("Payment provider: {}", state.payments.provider_name());
    info!(
        "Asset store: {} ({})",
        state.store.backend_name(),
        state.config.asset_root.display()
    );
    info!("Email: {}", if state.notifier.is_some() { "resend" } else { "disabled" });
    info!("Webhooks: {}", if state.webhooks.is_some() { "enabled" } else { "disabled" });

    let app = routes::create_router(state);

    info!("🎧 Sample Drop starting on http://{}", addr);

    if !is_prod {
        info!("📝 Health: http://{}/health", addr);
        info!("💳 Checkout: POST http://{}/api/checkout", addr);
        info!("📦 Download: GET http://{}/api/download", addr);
        info!("🔔 Webhook: POST http://{}/webhook/stripe", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  🎧 Sample Drop RS 🎧
  ━━━━━━━━━━━━━━━━━━━━━━━
  Signed sample-pack downloads
  Version: {}

"#,
        env!("CARGO_PKG_VERSION")
    );
}
