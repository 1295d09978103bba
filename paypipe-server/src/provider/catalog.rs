//! Service catalog
//!
//! Yields the priced, tagged services a plan may draw from. The registry
//! backed catalog caches for a short TTL and degrades to the built-in list
//! whenever the registry can't be reached.

use async_trait::async_trait;
use paypipe_core::domain::service::{Asset, Price, ServiceCategory, ServiceDescriptor};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Source of catalog services
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    /// All currently known services
    async fn all(&self) -> Vec<ServiceDescriptor>;

    /// Services matching any word of `query` in name, description, category or tags
    async fn search(&self, query: &str) -> Vec<ServiceDescriptor> {
        let words: Vec<String> = query
            .split_whitespace()
            .map(|w| w.to_lowercase())
            .filter(|w| w.len() >= 2)
            .collect();
        let services = self.all().await;
        if words.is_empty() {
            return services;
        }
        services
            .into_iter()
            .filter(|s| words.iter().any(|w| s.matches_keyword(w)))
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("registry request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("registry returned status {0}")]
    Status(u16),

    #[error("registry request timed out")]
    Timeout,
}

/// Id-indexed view over a service list
///
/// Plans are built against one snapshot and executed against another; every
/// lookup goes through here so a vanished id is detected rather than guessed.
#[derive(Debug, Clone, Default)]
pub struct ServiceIndex {
    by_id: HashMap<String, ServiceDescriptor>,
}

impl ServiceIndex {
    pub fn new(services: &[ServiceDescriptor]) -> Self {
        Self {
            by_id: services.iter().map(|s| (s.id.clone(), s.clone())).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&ServiceDescriptor> {
        self.by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Fixed service list
pub struct StaticCatalog {
    services: Vec<ServiceDescriptor>,
}

impl StaticCatalog {
    pub fn new(services: Vec<ServiceDescriptor>) -> Self {
        Self { services }
    }

    /// The built-in list used when no registry is configured or reachable
    pub fn fallback(network: &str) -> Self {
        Self::new(fallback_services(network))
    }
}

#[async_trait]
impl ServiceCatalog for StaticCatalog {
    async fn all(&self) -> Vec<ServiceDescriptor> {
        self.services.clone()
    }
}

struct CachedServices {
    fetched_at: Instant,
    services: Vec<ServiceDescriptor>,
}

/// Registry accepts either a bare array or `{"services": [...]}`
#[derive(Deserialize)]
#[serde(untagged)]
enum RegistryResponse {
    List(Vec<ServiceDescriptor>),
    Wrapped { services: Vec<ServiceDescriptor> },
}

impl RegistryResponse {
    fn into_services(self) -> Vec<ServiceDescriptor> {
        match self {
            RegistryResponse::List(services) => services,
            RegistryResponse::Wrapped { services } => services,
        }
    }
}

/// Catalog backed by a remote service registry
pub struct RegistryCatalog {
    base_url: String,
    client: reqwest::Client,
    ttl: Duration,
    timeout: Duration,
    fallback: Vec<ServiceDescriptor>,
    cache: RwLock<Option<CachedServices>>,
}

impl RegistryCatalog {
    pub fn new(
        base_url: impl Into<String>,
        network: &str,
        ttl: Duration,
        timeout: Duration,
    ) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            ttl,
            timeout,
            fallback: fallback_services(network),
            cache: RwLock::new(None),
        }
    }

    async fn fetch(&self) -> Result<Vec<ServiceDescriptor>, CatalogError> {
        let url = format!("{}/services", self.base_url);
        let request = self.client.get(&url).send();
        let response = tokio::time::timeout(self.timeout, request)
            .await
            .map_err(|_| CatalogError::Timeout)??;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }

        let body: RegistryResponse = response.json().await?;
        Ok(body.into_services())
    }
}

#[async_trait]
impl ServiceCatalog for RegistryCatalog {
    async fn all(&self) -> Vec<ServiceDescriptor> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed() < self.ttl {
                    return cached.services.clone();
                }
            }
        }

        match self.fetch().await {
            Ok(services) if !services.is_empty() => {
                debug!("Fetched {} services from registry", services.len());
                let mut cache = self.cache.write().await;
                *cache = Some(CachedServices {
                    fetched_at: Instant::now(),
                    services: services.clone(),
                });
                services
            }
            Ok(_) => {
                warn!("Registry returned no services, using built-in catalog");
                self.fallback.clone()
            }
            Err(e) => {
                warn!("Service registry unavailable ({}), using built-in catalog", e);
                self.fallback.clone()
            }
        }
    }
}

/// Built-in services, served by the mock payment provider in mock mode
pub fn fallback_services(network: &str) -> Vec<ServiceDescriptor> {
    let service = |id: &str,
                   name: &str,
                   description: &str,
                   category: ServiceCategory,
                   tags: &[&str],
                   price: Price| ServiceDescriptor {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        category,
        tags: tags.iter().map(|t| t.to_string()).collect(),
        price,
        endpoint: format!("http://localhost:3002/api/{}", id),
        network: network.to_string(),
        metrics: None,
    };

    vec![
        service(
            "market-price",
            "Crypto Price Oracle",
            "Real-time prices for BTC, STX and ETH",
            ServiceCategory::Market,
            &["price", "crypto", "bitcoin", "market"],
            Price::stx(1_000),
        ),
        service(
            "market-stats",
            "Market Stats",
            "24h volume, market cap and trend data for major tokens",
            ServiceCategory::Market,
            &["market", "volume", "trend"],
            Price::stx(1_500),
        ),
        service(
            "news-headlines",
            "News Headlines",
            "Latest news headlines across crypto and tech",
            ServiceCategory::News,
            &["news", "headlines", "crypto"],
            Price::stx(2_000),
        ),
        service(
            "ai-summarizer",
            "AI Summarizer",
            "Summarizes long text into a short digest",
            ServiceCategory::Ai,
            &["summarize", "summary", "ai"],
            Price::stx(3_000),
        ),
        service(
            "ai-sentiment",
            "Sentiment Analyzer",
            "Analyzes the sentiment of text or headlines",
            ServiceCategory::Ai,
            &["sentiment", "analysis", "ai"],
            Price::stx(2_500),
        ),
        service(
            "ai-translator",
            "AI Translator",
            "Translates text between languages",
            ServiceCategory::Ai,
            &["translate", "translation", "language"],
            Price::stx(2_500),
        ),
        service(
            "tweet-generator",
            "Tweet Generator",
            "Writes a tweet about a topic or input text",
            ServiceCategory::Generation,
            &["tweet", "social", "twitter"],
            Price::stx(4_000),
        ),
        service(
            "report-generator",
            "Report Generator",
            "Generates a structured markdown report",
            ServiceCategory::Generation,
            &["report", "markdown", "document"],
            Price::stx(6_000),
        ),
        service(
            "btc-onchain",
            "Bitcoin On-chain Data",
            "Block height, mempool size and fee estimates",
            ServiceCategory::Data,
            &["bitcoin", "onchain", "fees"],
            Price {
                amount: 50,
                asset: Asset::SBtc,
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_static_catalog_search() {
        let catalog = StaticCatalog::fallback("testnet");

        let results = catalog.search("tweet").await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "tweet-generator");

        let results = catalog.search("bitcoin price").await;
        let ids: Vec<&str> = results.iter().map(|s| s.id.as_str()).collect();
        assert!(ids.contains(&"market-price"));
        assert!(ids.contains(&"btc-onchain"));

        assert_eq!(catalog.search("   ").await.len(), catalog.all().await.len());
    }

    #[test]
    fn test_fallback_ids_are_unique() {
        let services = fallback_services("testnet");
        let index = ServiceIndex::new(&services);
        assert_eq!(index.len(), services.len());
        assert!(index.get("news-headlines").is_some());
        assert!(index.get("missing").is_none());
    }

    #[tokio::test]
    async fn test_registry_unreachable_degrades_to_fallback() {
        // Port 9 (discard) is never an HTTP registry
        let catalog = RegistryCatalog::new(
            "http://127.0.0.1:9",
            "testnet",
            Duration::from_secs(60),
            Duration::from_millis(500),
        );

        let services = catalog.all().await;
        assert_eq!(services, fallback_services("testnet"));
    }

    /// Local registry answering `/services` and counting its hits
    async fn counting_registry(services: Vec<ServiceDescriptor>) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let app = axum::Router::new().route(
            "/services",
            axum::routing::get(move || {
                let counter = counter.clone();
                let services = services.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    axum::Json(services)
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), hits)
    }

    fn registry_only_service() -> ServiceDescriptor {
        let mut service = fallback_services("testnet")[0].clone();
        service.id = "registry-only".to_string();
        service
    }

    #[tokio::test]
    async fn test_registry_served_from_cache_while_fresh() {
        let (url, hits) = counting_registry(vec![registry_only_service()]).await;
        let catalog = RegistryCatalog::new(
            url,
            "testnet",
            Duration::from_secs(60),
            Duration::from_secs(5),
        );

        let first = catalog.all().await;
        let second = catalog.all().await;
        let searched = catalog.search("").await;

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].id, "registry-only");
        assert_eq!(second, first);
        assert_eq!(searched, first);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_registry_refetched_once_stale() {
        let (url, hits) = counting_registry(vec![registry_only_service()]).await;
        let catalog = RegistryCatalog::new(url, "testnet", Duration::ZERO, Duration::from_secs(5));

        catalog.all().await;
        let services = catalog.all().await;

        assert_eq!(services[0].id, "registry-only");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_registry_response_shapes() {
        let service = serde_json::to_value(&fallback_services("testnet")[0]).unwrap();

        let bare: RegistryResponse = serde_json::from_value(serde_json::json!([service])).unwrap();
        assert_eq!(bare.into_services().len(), 1);

        let wrapped: RegistryResponse =
            serde_json::from_value(serde_json::json!({ "services": [service] })).unwrap();
        assert_eq!(wrapped.into_services().len(), 1);
    }
}
