//! Mock geocoder for testing.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::geocode::{GeocodeError, Geocoder};

/// Mock implementation of the Geocoder trait.
///
/// Returns a configurable JSON value and records every query.
#[derive(Debug, Clone)]
pub struct MockGeocoder {
    result: Arc<RwLock<Value>>,
    queries: Arc<RwLock<Vec<String>>>,
    next_error: Arc<RwLock<Option<GeocodeError>>>,
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self {
            result: Arc::new(RwLock::new(Value::Array(Vec::new()))),
            queries: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn set_result(&self, result: Value) {
        *self.result.write().await = result;
    }

    pub async fn set_next_error(&self, error: GeocodeError) {
        *self.next_error.write().await = Some(error);
    }

    pub async fn queries(&self) -> Vec<String> {
        self.queries.read().await.clone()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn search(&self, query: &str) -> Result<Value, GeocodeError> {
        self.queries.write().await.push(query.to_string());

        if let Some(error) = self.next_error.write().await.take() {
            return Err(error);
        }
        if query.trim().is_empty() {
            return Err(GeocodeError::EmptyQuery);
        }

        Ok(self.result.read().await.clone())
    }
}
