//! Test fakes for the engine services

use async_trait::async_trait;
use paypipe_core::domain::service::{Price, ServiceCategory, ServiceDescriptor};
use serde_json::{Value as JsonValue, json};
use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use crate::provider::{PaidResponse, PaymentError, PaymentProvider};

/// Scripted answer for one service
#[derive(Debug, Clone)]
pub enum Reply {
    Data(JsonValue),
    Error(PaymentError),
    Hang,
}

/// Payment provider that answers from a script and records every call
#[derive(Default)]
pub struct FakePayments {
    replies: HashMap<String, Reply>,
    calls: Mutex<Vec<(String, JsonValue)>>,
}

impl FakePayments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, service_id: &str, reply: Reply) -> Self {
        self.replies.insert(service_id.to_string(), reply);
        self
    }

    pub fn calls(&self) -> Vec<(String, JsonValue)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called_services(&self) -> Vec<String> {
        self.calls().into_iter().map(|(id, _)| id).collect()
    }
}

#[async_trait]
impl PaymentProvider for FakePayments {
    async fn pay(
        &self,
        service: &ServiceDescriptor,
        payload: &JsonValue,
    ) -> Result<PaidResponse, PaymentError> {
        let call_number = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((service.id.clone(), payload.clone()));
            calls.len()
        };

        let data = match self.replies.get(&service.id).cloned() {
            Some(Reply::Data(data)) => data,
            Some(Reply::Error(e)) => return Err(e),
            Some(Reply::Hang) => {
                tokio::time::sleep(Duration::from_secs(3_600)).await;
                return Err(PaymentError::Network("hung".to_string()));
            }
            None => json!({ "type": "data", "service": service.id }),
        };

        Ok(PaidResponse {
            tx_id: format!("0xfake{}", call_number),
            amount: service.price.amount,
            asset: service.price.asset,
            data,
        })
    }
}

pub fn service(id: &str, category: ServiceCategory, amount: u64) -> ServiceDescriptor {
    ServiceDescriptor {
        id: id.to_string(),
        name: format!("{} service", id),
        description: format!("Test service {}", id),
        category,
        tags: BTreeSet::new(),
        price: Price::stx(amount),
        endpoint: format!("http://localhost/{}", id),
        network: "testnet".to_string(),
        metrics: None,
    }
}
