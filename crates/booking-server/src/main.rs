//! Salon booking HTTP server
//!
//! Axum-based server for public booking pages, owner booking management,
//! plan checkout and the Stripe webhook.

mod config;
mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use booking_core::{MemorySalonStore, Salon, SalonStore};
use booking_payments::{CheckoutConfig, CheckoutInitiator, SignaturePolicy, StripeClient};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let config = ServerConfig::from_env()?;

    // Store
    let store: Arc<dyn SalonStore> = Arc::new(MemorySalonStore::new());

    if let Some(slug) = &config.demo_salon_slug {
        let salon = store.insert_salon(Salon::new(slug, slug, "demo-owner")).await?;
        tracing::info!(salon_id = %salon.id, slug = %salon.slug, "Provisioned demo salon");
    }

    // Payments
    let checkout = match StripeClient::from_env() {
        Ok(client) => {
            let checkout_config = CheckoutConfig::from_env();
            if checkout_config.prices.basic.is_none() || checkout_config.prices.premium.is_none() {
                tracing::warn!("⚠ STRIPE_PRICE_BASIC / STRIPE_PRICE_PREMIUM not fully set");
            }
            tracing::info!("✓ Stripe configured");
            Some(CheckoutInitiator::new(Arc::new(client), checkout_config))
        }
        Err(e) => {
            tracing::warn!(error = %e, "⚠ Stripe not configured - checkout disabled");
            tracing::warn!("  Set STRIPE_SECRET_KEY in .env");
            None
        }
    };

    let signature_policy = SignaturePolicy::from_secret(config.webhook_secret.as_deref());
    if !signature_policy.is_enforced() {
        tracing::warn!("⚠ STRIPE_WEBHOOK_SECRET not set - accepting unsigned webhooks (development only)");
    }

    // Build application state
    let state = AppState::new(store, config.admission_config(), checkout, signature_policy);

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("booking server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("Endpoints:");
    tracing::info!("  GET    /health                                 - Health check");
    tracing::info!("  GET    /api/salons/{{salon}}                     - Salon page");
    tracing::info!("  GET    /api/salons/{{salon}}/plan                - Current plan");
    tracing::info!("  GET    /api/salons/{{salon}}/usage               - Active bookings vs quota");
    tracing::info!("  POST   /api/salons/{{salon}}/bookings            - Book a slot");
    tracing::info!("  GET    /api/salons/{{salon}}/bookings            - List bookings");
    tracing::info!("  DELETE /api/salons/{{salon}}/bookings/{{id}}       - Delete booking");
    tracing::info!("  POST   /api/checkout                           - Create Stripe checkout");
    tracing::info!("  POST   /webhook/stripe                         - Stripe webhook");

    axum::serve(listener, app).await?;

    Ok(())
}
