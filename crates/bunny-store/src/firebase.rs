//! Firebase Realtime Database over REST
//!
//! A `set` is a `PUT {database_url}/{path}.json?auth={secret}` with the value
//! as the JSON body, which replaces whatever the node held before.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::{KeyValueStore, StoreError, StorePath};

pub struct FirebaseStore {
    http: reqwest::Client,
    database_url: String,
    secret: Option<String>,
}

impl FirebaseStore {
    /// # Arguments
    /// * `database_url` - e.g. `https://my-project.firebaseio.com`
    /// * `secret` - database secret or ID token passed as the `auth` query parameter
    pub fn new(database_url: impl Into<String>, secret: Option<String>, timeout: Duration) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            database_url: database_url.into().trim_end_matches('/').to_string(),
            secret,
        })
    }

    fn node_url(&self, path: &StorePath) -> String {
        format!("{}/{}.json", self.database_url, path)
    }
}

#[async_trait]
impl KeyValueStore for FirebaseStore {
    async fn set(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        let url = self.node_url(path);
        debug!("firebase PUT {}", url);

        let mut request = self.http.put(&url).json(&value);
        if let Some(secret) = &self.secret {
            request = request.query(&[("auth", secret)]);
        }

        // `auth` rides in the query string; keep it out of error messages
        let response = request
            .send()
            .await
            .map_err(|e| StoreError::Http(e.without_url()))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "firebase"
    }
}
