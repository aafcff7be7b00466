//! HTTP implementation of the core `Transport` port

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use restq_core::{HttpMethod, Transport, TransportRequest, TransportResponse};
use restq_domain::{ClientConfig, RestqError, Result};
use tracing::{debug, instrument};
use url::Url;

use super::client::HttpClient;
use crate::auth::AccessTokenProvider;
use crate::errors::InfraError;

/// Sends each request of a batch to `{service_root}/{address}`, one after
/// the other, in submission order.
///
/// Non-success statuses are returned as responses; the execution context
/// decides what they mean.
pub struct HttpTransport {
    client: HttpClient,
    service_root: Url,
    auth: Option<Arc<dyn AccessTokenProvider>>,
}

impl HttpTransport {
    /// Build a transport from client configuration.
    ///
    /// Each request is sent once; retrying is the retry controller's job.
    ///
    /// # Errors
    /// Returns `RestqError::Config` for an unusable service root or client
    /// settings.
    pub fn new(
        config: &ClientConfig,
        auth: Option<Arc<dyn AccessTokenProvider>>,
    ) -> Result<Self> {
        let client = HttpClient::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Self::with_client(client, &config.service_root, auth)
    }

    /// # Errors
    /// Returns `RestqError::Config` if `service_root` is not a valid URL.
    pub fn with_client(
        client: HttpClient,
        service_root: &str,
        auth: Option<Arc<dyn AccessTokenProvider>>,
    ) -> Result<Self> {
        // A trailing slash makes `join` append instead of replacing the last segment
        let mut root = service_root.trim().to_string();
        if !root.ends_with('/') {
            root.push('/');
        }
        let service_root =
            Url::parse(&root).map_err(|err| RestqError::from(InfraError::from(err)))?;
        Ok(Self { client, service_root, auth })
    }

    pub fn service_root(&self) -> &Url {
        &self.service_root
    }

    /// Absolute URL for a request address relative to the service root.
    ///
    /// # Errors
    /// Returns `RestqError::Config` if the address cannot be joined.
    pub fn resolve(&self, address: &str) -> Result<Url> {
        self.service_root
            .join(address.trim_start_matches('/'))
            .map_err(|err| RestqError::from(InfraError::from(err)))
    }

    async fn send_one(&self, request: &TransportRequest) -> Result<TransportResponse> {
        let url = self.resolve(&request.address)?;
        let mut builder = self.client.request(to_reqwest_method(request.method), url);

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(auth) = &self.auth {
            let token = auth.access_token().await?;
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = self.client.send(builder).await?;
        let status = response.status().as_u16();
        let body =
            response.bytes().await.map_err(|err| RestqError::from(InfraError::from(err)))?;
        debug!(query_id = %request.query_id, status, bytes = body.len(), "Response received");

        Ok(TransportResponse::new(status, body.to_vec()))
    }
}

fn to_reqwest_method(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, batch), fields(count = batch.len(), root = %self.service_root))]
    async fn submit(&self, batch: &[TransportRequest]) -> Result<Vec<TransportResponse>> {
        let mut responses = Vec::with_capacity(batch.len());
        for request in batch {
            responses.push(self.send_one(request).await?);
        }
        Ok(responses)
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("service_root", &self.service_root.as_str())
            .field("authenticated", &self.auth.is_some())
            .finish()
    }
}
