use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::record::{Datapoint, Record};
use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Trait for log store implementations
///
/// The store is an external append-only collection of records ordered by
/// their `timestamp` field. The monitor only ever needs the most recent
/// record and the ability to delete one anomalous record by its key.
#[cfg_attr(test, mockall::automock)]
pub trait LogStore: Send + Sync {
    /// Fetch the record with the maximum `timestamp` field
    ///
    /// Fails with [`StoreError::Empty`] if the collection holds no records.
    fn latest(&self) -> Pin<Box<dyn Future<Output = Result<Datapoint, StoreError>> + Send>>;

    /// Delete exactly one record by its store-assigned key
    fn delete(&self, key: &str) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send>>;
}

/// Firebase Realtime Database client
///
/// Talks to the RTDB REST API: an indexed query ordered by the `timestamp`
/// child limited to the last entry for reads, and a delete-by-key for
/// garbage removal. Both calls are bounded by the configured request
/// timeout so a hung store call cannot stall an evaluation cycle.
pub struct FirebaseStore {
    client: Client,
    base_url: String,
    path: String,
    auth_token: Option<String>,
}

impl FirebaseStore {
    /// Create a new store client from configuration
    pub fn new(config: &StoreConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            path: config.path.clone(),
            auth_token: config.auth_token.clone(),
        }
    }

    /// URL of the whole collection, e.g. `https://x.firebaseio.com/log.json`
    fn collection_url(&self) -> String {
        format!("{}{}.json", self.base_url, self.path)
    }

    /// URL of a single record within the collection
    fn record_url(&self, key: &str) -> String {
        format!("{}{}/{}.json", self.base_url, self.path, key)
    }

    /// Parse the response body of a limit-1 ordered query
    ///
    /// Firebase returns `null` for an empty collection and an object keyed
    /// by push id otherwise. The limit-1 query should yield a single entry,
    /// but if the server ever returns more, the record with the maximum
    /// timestamp wins, which is the contract callers rely on.
    fn parse_latest(body: Value) -> Result<Datapoint, StoreError> {
        let entries = match body {
            Value::Null => return Err(StoreError::Empty),
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Parse(format!(
                    "expected object keyed by record id, got {}",
                    other
                )))
            }
        };

        let mut latest: Option<Datapoint> = None;
        for (key, value) in entries {
            let record: Record = serde_json::from_value(value)
                .map_err(|e| StoreError::Parse(format!("record '{}': {}", key, e)))?;
            let candidate = Datapoint::new(key, record);
            match &latest {
                Some(current) if current.record.timestamp >= candidate.record.timestamp => {}
                _ => latest = Some(candidate),
            }
        }

        latest.ok_or(StoreError::Empty)
    }
}

impl LogStore for FirebaseStore {
    fn latest(&self) -> Pin<Box<dyn Future<Output = Result<Datapoint, StoreError>> + Send>> {
        let client = self.client.clone();
        let url = self.collection_url();
        let auth_token = self.auth_token.clone();

        Box::pin(async move {
            let mut request = client
                .get(&url)
                .query(&[("orderBy", "\"timestamp\""), ("limitToLast", "1")]);
            if let Some(ref token) = auth_token {
                request = request.query(&[("auth", token.as_str())]);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<unreadable body>".to_string());
                return Err(StoreError::Backend(format!(
                    "query returned {}: {}",
                    status, body
                )));
            }

            let body: Value = response
                .json()
                .await
                .map_err(|e| StoreError::Parse(format!("response body: {}", e)))?;
            Self::parse_latest(body)
        })
    }

    fn delete(&self, key: &str) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send>> {
        let client = self.client.clone();
        let url = self.record_url(key);
        let auth_token = self.auth_token.clone();

        Box::pin(async move {
            let mut request = client.delete(&url);
            if let Some(ref token) = auth_token {
                request = request.query(&[("auth", token.as_str())]);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                let status = response.status();
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "<unreadable body>".to_string());
                return Err(StoreError::Backend(format!(
                    "delete returned {}: {}",
                    status, body
                )));
            }

            Ok(())
        })
    }
}
