use super::ApiError;
use super::auth::AuthProvider;
use crate::config::ApiConfig;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client as ReqwestClient, Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

/// Thin wrapper over `reqwest` that knows the API root and how to authorize
#[derive(Clone)]
pub struct ApiClient {
    http: ReqwestClient,
    root_url: String,
    request_timeout: Duration,
    auth: Arc<dyn AuthProvider>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("root_url", &self.root_url)
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(config: &ApiConfig, auth: Arc<dyn AuthProvider>) -> Result<Self, ApiError> {
        // No client-wide timeout: it would also cut long-lived streams.
        let http = ReqwestClient::builder()
            .connect_timeout(config.connect_timeout())
            .tcp_keepalive(Duration::from_secs(60))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| ApiError::Network(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            root_url: config.root_url.trim_end_matches('/').to_string(),
            request_timeout: config.request_timeout(),
            auth,
        })
    }

    pub fn root_url(&self) -> &str {
        &self.root_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.root_url, path)
    }

    /// Request builder with the authorization and content-type headers set
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header(AUTHORIZATION, self.auth.authorization_header())
            .header(CONTENT_TYPE, "application/json")
    }

    /// POST a JSON body and decode a JSON response
    pub async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, ApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        tracing::debug!(path, "POST");
        let response = self
            .request(Method::POST, path)
            .timeout(self.request_timeout)
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    /// GET and decode a JSON response
    pub async fn get_json<R>(&self, path: &str) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
    {
        tracing::debug!(path, "GET");
        let response = self
            .request(Method::GET, path)
            .timeout(self.request_timeout)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<R>(response: reqwest::Response) -> Result<R, ApiError>
    where
        R: DeserializeOwned,
    {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status, body));
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}
