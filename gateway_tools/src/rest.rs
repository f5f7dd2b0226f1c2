use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use shopkeep_common::Secret;

use crate::error::RestError;

/// A JSON-over-HTTPS client with a bearer key and a request timeout, shared by [`crate::PayGateApi`] and
/// [`crate::ShipperApi`].
#[derive(Clone)]
pub struct RestClient {
    base_url: String,
    client: Arc<Client>,
}

impl RestClient {
    pub fn new(base_url: &str, key: &Secret<String>, timeout: Duration) -> Result<Self, String> {
        let mut headers = HeaderMap::with_capacity(2);
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", key.reveal())).map_err(|e| e.to_string())?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client =
            Client::builder().default_headers(headers).timeout(timeout).build().map_err(|e| e.to_string())?;
        Ok(Self { base_url: base_url.to_string(), client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<B>,
    ) -> Result<T, RestError> {
        let url = self.url(path);
        trace!("Sending {method} request: {url}");
        let mut req = self.client.request(method, url);
        if let Some(body) = body {
            req = req.json(&body);
        }
        let response = req.send().await?;
        if response.status().is_success() {
            trace!("Request successful. {}", response.status());
            let text = response.text().await?;
            serde_json::from_str::<T>(&text).map_err(|e| RestError::Json(format!("{e}. Body: {text}")))
        } else {
            let status = response.status().as_u16();
            let message = response.text().await?;
            Err(RestError::Status { status, message })
        }
    }
}
