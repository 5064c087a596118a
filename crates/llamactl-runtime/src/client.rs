//! HTTP client for a running llama-server.
//!
//! Covers the two endpoints the host needs from a ready server:
//! - `GET /model.json` for the loaded model's parameters
//! - `POST /tokenize` to turn text into token ids

use llamactl_core::{ModelParameters, SupervisorError};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ModelJson {
    n_ctx: u64,
    model: String,
}

#[derive(Debug, Serialize)]
struct TokenizeRequest<'a> {
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenizeResponse {
    tokens: Vec<i32>,
}

/// Client bound to one server's base URL.
#[derive(Debug, Clone)]
pub struct ServerClient {
    http: Client,
    base_url: String,
}

impl ServerClient {
    /// Create a client for `http://<host>:<port>` with its own connection pool.
    pub fn new(host: &str, port: u16, timeout: Duration) -> Result<Self, SupervisorError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SupervisorError::Client(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(http, host, port))
    }

    /// Create a client that shares an existing connection pool.
    pub fn with_client(http: Client, host: &str, port: u16) -> Self {
        Self {
            http,
            base_url: format!("http://{host}:{port}"),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch `n_ctx` and the model path from `/model.json`.
    pub async fn model_parameters(&self) -> Result<ModelParameters, SupervisorError> {
        let url = format!("{}/model.json", self.base_url);
        debug!(%url, "Fetching model parameters");

        let response = self.http.get(&url).send().await.map_err(request_error(&url))?;
        let data: ModelJson = Self::decode(&url, response).await?;

        Ok(ModelParameters {
            context_size: data.n_ctx,
            model_path: data.model,
        })
    }

    /// Tokenize `content` with `/tokenize`.
    pub async fn encode(&self, content: &str) -> Result<Vec<i32>, SupervisorError> {
        let url = format!("{}/tokenize", self.base_url);
        debug!(%url, chars = content.len(), "Tokenizing");

        let response = self
            .http
            .post(&url)
            .json(&TokenizeRequest { content })
            .send()
            .await
            .map_err(request_error(&url))?;
        let data: TokenizeResponse = Self::decode(&url, response).await?;

        Ok(data.tokens)
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        url: &str,
        response: Response,
    ) -> Result<T, SupervisorError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SupervisorError::Client(format!(
                "{url} returned {status}: {body}"
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SupervisorError::Client(format!("invalid response from {url}: {e}")))
    }
}

fn request_error(url: &str) -> impl FnOnce(reqwest::Error) -> SupervisorError + '_ {
    move |e| SupervisorError::Client(format!("request to {url} failed: {e}"))
}
