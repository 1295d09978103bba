//! Server configuration
//!
//! Defines all configurable parameters for the server including
//! spend ceilings, planning defaults, collaborator endpoints and timeouts.

use paypipe_core::domain::spend::SpendLimits;
use std::time::Duration;

use crate::service::OrchestratorSettings;

/// How paid service calls are settled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentMode {
    /// Simulated services and transactions, no network
    Mock,
    /// Real HTTP calls to each service endpoint
    Http,
}

impl std::str::FromStr for PaymentMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(PaymentMode::Mock),
            "http" => Ok(PaymentMode::Http),
            other => anyhow::bail!("unknown payment mode '{}' (expected mock or http)", other),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// Network identifier reported by mock services and the static catalog
    pub network: String,

    /// Service registry base URL; the static catalog is used when unset
    pub registry_url: Option<String>,

    pub payment_mode: PaymentMode,

    /// Wallet address sent with paid requests in http mode
    pub payer_address: Option<String>,

    /// Simulated wallet balance in mock mode; unlimited when unset
    pub mock_balance: Option<u64>,

    /// API key for the live content model; mock content when unset
    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,

    /// Spend ceilings in micro-STX
    pub limits: SpendLimits,

    /// Plan budget used when a request doesn't carry one
    pub default_budget: u64,

    /// Step ceiling; a request may lower it but never raise it
    pub max_steps: usize,

    pub history_capacity: usize,

    /// How long fetched catalog entries stay fresh
    pub catalog_ttl: Duration,

    /// Upper bound for every external call (catalog, payment, content)
    pub http_timeout: Duration,

    /// Events buffered per subscriber before a slow one starts losing them
    pub event_capacity: usize,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(bind_addr: String) -> Self {
        Self {
            bind_addr,
            network: "testnet".to_string(),
            registry_url: None,
            payment_mode: PaymentMode::Mock,
            payer_address: None,
            mock_balance: None,
            llm_api_key: None,
            llm_base_url: "https://api.openai.com/v1".to_string(),
            llm_model: "gpt-4o-mini".to_string(),
            limits: SpendLimits::default(),
            default_budget: 100_000,
            max_steps: 5,
            history_capacity: 50,
            catalog_ttl: Duration::from_secs(60),
            http_timeout: Duration::from_secs(30),
            event_capacity: 256,
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Every variable is optional:
    /// - PAYPIPE_BIND_ADDR (default: 0.0.0.0:3001)
    /// - PAYPIPE_NETWORK (default: testnet)
    /// - PAYPIPE_REGISTRY_URL
    /// - PAYPIPE_PAYMENT_MODE (mock | http, default: mock)
    /// - PAYPIPE_PAYER_ADDRESS
    /// - PAYPIPE_MOCK_BALANCE (micro-STX, mock mode only)
    /// - PAYPIPE_LLM_API_KEY, PAYPIPE_LLM_BASE_URL, PAYPIPE_LLM_MODEL
    /// - PAYPIPE_MAX_PER_TASK, PAYPIPE_MAX_PER_DAY (micro-STX)
    /// - PAYPIPE_DEFAULT_BUDGET (micro-STX, default: 100000)
    /// - PAYPIPE_MAX_STEPS (default: 5)
    /// - PAYPIPE_HISTORY_CAPACITY (default: 50)
    /// - PAYPIPE_CATALOG_TTL (seconds, default: 60)
    /// - PAYPIPE_HTTP_TIMEOUT (seconds, default: 30)
    /// - PAYPIPE_EVENT_CAPACITY (default: 256)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let payment_mode = match env_string("PAYPIPE_PAYMENT_MODE") {
            Some(mode) => mode.parse()?,
            None => defaults.payment_mode,
        };

        let limits = SpendLimits {
            max_per_task: env_parse("PAYPIPE_MAX_PER_TASK")?
                .unwrap_or(defaults.limits.max_per_task),
            max_per_day: env_parse("PAYPIPE_MAX_PER_DAY")?.unwrap_or(defaults.limits.max_per_day),
        };

        Ok(Self {
            bind_addr: env_string("PAYPIPE_BIND_ADDR").unwrap_or(defaults.bind_addr),
            network: env_string("PAYPIPE_NETWORK").unwrap_or(defaults.network),
            registry_url: env_string("PAYPIPE_REGISTRY_URL"),
            payment_mode,
            payer_address: env_string("PAYPIPE_PAYER_ADDRESS"),
            mock_balance: env_parse("PAYPIPE_MOCK_BALANCE")?,
            llm_api_key: env_string("PAYPIPE_LLM_API_KEY"),
            llm_base_url: env_string("PAYPIPE_LLM_BASE_URL").unwrap_or(defaults.llm_base_url),
            llm_model: env_string("PAYPIPE_LLM_MODEL").unwrap_or(defaults.llm_model),
            limits,
            default_budget: env_parse("PAYPIPE_DEFAULT_BUDGET")?
                .unwrap_or(defaults.default_budget),
            max_steps: env_parse("PAYPIPE_MAX_STEPS")?.unwrap_or(defaults.max_steps),
            history_capacity: env_parse("PAYPIPE_HISTORY_CAPACITY")?
                .unwrap_or(defaults.history_capacity),
            catalog_ttl: env_parse("PAYPIPE_CATALOG_TTL")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.catalog_ttl),
            http_timeout: env_parse("PAYPIPE_HTTP_TIMEOUT")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.http_timeout),
            event_capacity: env_parse("PAYPIPE_EVENT_CAPACITY")?
                .unwrap_or(defaults.event_capacity),
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if let Some(url) = &self.registry_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("registry_url must start with http:// or https://");
            }
        }

        if self.payment_mode == PaymentMode::Http && self.payer_address.is_none() {
            anyhow::bail!("payer_address is required in http payment mode");
        }

        if self.payment_mode == PaymentMode::Http && self.mock_balance.is_some() {
            anyhow::bail!("mock_balance only applies in mock payment mode");
        }

        if self.limits.max_per_task == 0 || self.limits.max_per_day == 0 {
            anyhow::bail!("spend limits must be greater than 0");
        }

        if self.limits.max_per_task > self.limits.max_per_day {
            anyhow::bail!("max_per_task cannot exceed max_per_day");
        }

        if self.max_steps == 0 {
            anyhow::bail!("max_steps must be greater than 0");
        }

        if self.history_capacity == 0 {
            anyhow::bail!("history_capacity must be greater than 0");
        }

        if self.event_capacity == 0 {
            anyhow::bail!("event_capacity must be greater than 0");
        }

        if self.http_timeout.is_zero() {
            anyhow::bail!("http_timeout must be greater than 0");
        }

        Ok(())
    }

    /// Run tunables handed to the orchestrator
    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            default_budget: self.default_budget,
            max_steps: self.max_steps,
            payment_timeout: self.http_timeout,
            history_capacity: self.history_capacity,
            event_capacity: self.event_capacity,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("0.0.0.0:3001".to_string())
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> anyhow::Result<Option<T>> {
    match env_string(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", key, raw)),
        None => Ok(None),
    }
}
