use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod provider;
pub mod repository;
pub mod service;

use config::{Config, PaymentMode};
use provider::{
    ContentGenerator, HttpPaymentProvider, LlmContentGenerator, MockContentGenerator,
    MockPaymentProvider, PaymentProvider, RegistryCatalog, ServiceCatalog, StaticCatalog,
};
use service::{Orchestrator, SpendLedger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "paypipe_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting PayPipe server...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let orchestrator = build_orchestrator(&config);
    let app = api::create_router(api::AppState {
        orchestrator: Arc::new(orchestrator),
    });

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}

/// Wires the collaborators selected by `config` into an orchestrator
fn build_orchestrator(config: &Config) -> Orchestrator {
    let content: Arc<dyn ContentGenerator> = match &config.llm_api_key {
        Some(key) => {
            tracing::info!("Content generation via {} ({})", config.llm_base_url, config.llm_model);
            Arc::new(LlmContentGenerator::new(
                &config.llm_base_url,
                key,
                &config.llm_model,
                config.http_timeout,
            ))
        }
        None => {
            tracing::info!("No LLM API key set, using mock content generation");
            Arc::new(MockContentGenerator::new())
        }
    };

    let catalog: Arc<dyn ServiceCatalog> = match &config.registry_url {
        Some(url) => {
            tracing::info!("Service catalog from registry {}", url);
            Arc::new(RegistryCatalog::new(
                url,
                &config.network,
                config.catalog_ttl,
                config.http_timeout,
            ))
        }
        None => {
            tracing::info!("No registry configured, using built-in service catalog");
            Arc::new(StaticCatalog::fallback(&config.network))
        }
    };

    let payment: Arc<dyn PaymentProvider> = match config.payment_mode {
        PaymentMode::Mock => {
            let provider = MockPaymentProvider::new(content.clone());
            let provider = match config.mock_balance {
                Some(balance) => {
                    tracing::info!("Payment mode: mock, simulated balance {}", balance);
                    provider.with_balance(balance)
                }
                None => {
                    tracing::info!("Payment mode: mock");
                    provider
                }
            };
            Arc::new(provider)
        }
        PaymentMode::Http => {
            let payer = config.payer_address.clone().unwrap_or_default();
            tracing::info!("Payment mode: http, payer {}", payer);
            Arc::new(HttpPaymentProvider::new(payer, &config.network))
        }
    };

    tracing::info!(
        "Spend limits: {} per task, {} per day",
        config.limits.max_per_task,
        config.limits.max_per_day
    );

    Orchestrator::new(
        catalog,
        payment,
        content,
        SpendLedger::new(config.limits),
        config.orchestrator_settings(),
    )
}
