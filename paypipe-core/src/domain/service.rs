//! Service catalog domain types

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Asset a service is priced in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Asset {
    /// Primary chain token. The only asset counted against spend ceilings.
    #[serde(rename = "STX")]
    Stx,
    /// Wrapped BTC token
    #[serde(rename = "sBTC")]
    SBtc,
    /// Stable token
    #[serde(rename = "USDCx")]
    Usdcx,
}

impl Asset {
    pub fn symbol(&self) -> &'static str {
        match self {
            Asset::Stx => "STX",
            Asset::SBtc => "sBTC",
            Asset::Usdcx => "USDCx",
        }
    }

    /// Whether payments in this asset count towards budget ceilings
    pub fn is_primary(&self) -> bool {
        matches!(self, Asset::Stx)
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Price of one call, in micro-units of `asset`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub amount: u64,
    pub asset: Asset,
}

impl Price {
    pub fn stx(amount: u64) -> Self {
        Self {
            amount,
            asset: Asset::Stx,
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} micro-{}", self.amount, self.asset)
    }
}

/// Closed set of service categories
///
/// Registries may report categories this crate doesn't know about; those
/// map to `Other` instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ServiceCategory {
    Market,
    News,
    Ai,
    Generation,
    Data,
    Other,
}

impl ServiceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceCategory::Market => "market",
            ServiceCategory::News => "news",
            ServiceCategory::Ai => "ai",
            ServiceCategory::Generation => "generation",
            ServiceCategory::Data => "data",
            ServiceCategory::Other => "other",
        }
    }
}

impl From<String> for ServiceCategory {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "market" | "market-data" | "finance" => ServiceCategory::Market,
            "news" => ServiceCategory::News,
            "ai" | "ai-processing" => ServiceCategory::Ai,
            "generation" | "content" => ServiceCategory::Generation,
            "data" => ServiceCategory::Data,
            _ => ServiceCategory::Other,
        }
    }
}

impl From<ServiceCategory> for String {
    fn from(value: ServiceCategory) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ServiceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional reliability figures reported by a registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReliabilityMetrics {
    pub uptime_percent: Option<f64>,
    pub avg_latency_ms: Option<u64>,
    pub tx_count: Option<u64>,
}

/// A priced, tagged service from the catalog
///
/// Immutable once fetched; the catalog replaces whole descriptors on refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: ServiceCategory,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    pub price: Price,
    pub endpoint: String,
    pub network: String,
    #[serde(default)]
    pub metrics: Option<ReliabilityMetrics>,
}

impl ServiceDescriptor {
    /// Case-insensitive check against name, description, category and tags
    pub fn matches_keyword(&self, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        if keyword.is_empty() {
            return false;
        }
        self.name.to_lowercase().contains(&keyword)
            || self.description.to_lowercase().contains(&keyword)
            || self.category.as_str().contains(&keyword)
            || self
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&keyword))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> ServiceDescriptor {
        ServiceDescriptor {
            id: "btc-price".to_string(),
            name: "Bitcoin Price Feed".to_string(),
            description: "Live BTC spot price".to_string(),
            category: ServiceCategory::Market,
            tags: ["crypto".to_string(), "price".to_string()].into(),
            price: Price::stx(500),
            endpoint: "http://localhost:3002/api/price".to_string(),
            network: "testnet".to_string(),
            metrics: None,
        }
    }

    #[test]
    fn test_unknown_category_maps_to_other() {
        let category: ServiceCategory = serde_json::from_str("\"weather\"").unwrap();
        assert_eq!(category, ServiceCategory::Other);

        let category: ServiceCategory = serde_json::from_str("\"AI\"").unwrap();
        assert_eq!(category, ServiceCategory::Ai);
    }

    #[test]
    fn test_asset_wire_names() {
        assert_eq!(serde_json::to_string(&Asset::SBtc).unwrap(), "\"sBTC\"");
        assert_eq!(serde_json::to_string(&Asset::Usdcx).unwrap(), "\"USDCx\"");
        assert!(Asset::Stx.is_primary());
        assert!(!Asset::SBtc.is_primary());
    }

    #[test]
    fn test_matches_keyword() {
        let service = descriptor();
        assert!(service.matches_keyword("bitcoin"));
        assert!(service.matches_keyword("CRYPTO"));
        assert!(service.matches_keyword("market"));
        assert!(!service.matches_keyword("weather"));
        assert!(!service.matches_keyword(""));
    }

    #[test]
    fn test_descriptor_deserializes_without_optional_fields() {
        let json = serde_json::json!({
            "id": "news",
            "name": "News",
            "description": "Headlines",
            "category": "news",
            "price": { "amount": 2000, "asset": "STX" },
            "endpoint": "http://localhost/news",
            "network": "testnet"
        });

        let service: ServiceDescriptor = serde_json::from_value(json).unwrap();
        assert!(service.tags.is_empty());
        assert!(service.metrics.is_none());
        assert_eq!(service.price, Price::stx(2000));
    }
}
