//! Provider Module
//!
//! Adapters for the collaborators the engine calls out to: the service
//! catalog, the payment provider and the content generator. Each one is a
//! trait with an HTTP-backed and a local implementation.

pub mod catalog;
pub mod content;
pub mod mock;
pub mod payment;

pub use catalog::{
    RegistryCatalog, ServiceCatalog, ServiceIndex, StaticCatalog, fallback_services,
};
pub use content::{
    ContentGenerator, LlmContentGenerator, MockContentGenerator, extract_json_object,
};
pub use mock::MockPaymentProvider;
pub use payment::{HttpPaymentProvider, PaidResponse, PaymentError, PaymentProvider};
