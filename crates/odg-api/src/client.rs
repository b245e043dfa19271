//! HTTP client for the Open Delivery Gear API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};
use url::Url;

use crate::error::{ApiError, Result};
use crate::traits::DeliveryService;
use crate::types::{
    ArtefactMetadata, ComponentArtefactId, Entries, LabelSet, RuntimeArtefactResultItem,
    RuntimeArtefactUpload,
};

const METADATA_PATH: &str = "artefacts/metadata";
const METADATA_QUERY_PATH: &str = "artefacts/metadata/query";
const RUNTIME_ARTEFACTS_PATH: &str = "service-extensions/runtime-artefacts";

/// Default user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("inventory-extension-odg/", env!("CARGO_PKG_VERSION"));

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How the client authenticates against the API.
#[derive(Clone, Default)]
pub enum Authentication {
    /// No authentication.
    #[default]
    None,
    /// Exchange a GitHub access token for a session cookie.
    Github { api_url: String, access_token: String },
}

impl std::fmt::Debug for Authentication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Github { api_url, .. } => f
                .debug_struct("Github")
                .field("api_url", api_url)
                .field("access_token", &"[REDACTED]")
                .finish(),
        }
    }
}

/// Builder for [`OdgClient`].
#[derive(Debug)]
pub struct OdgClientBuilder {
    endpoint: String,
    user_agent: String,
    timeout: Duration,
    auth: Authentication,
}

impl OdgClientBuilder {
    /// Sets the user agent.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Authenticates via GitHub using the given API URL and access token.
    #[must_use]
    pub fn github_authentication(
        mut self,
        api_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        self.auth = Authentication::Github {
            api_url: api_url.into(),
            access_token: access_token.into(),
        };
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidConfig` if the endpoint is not a valid URL.
    pub fn build(self) -> Result<OdgClient> {
        if self.endpoint.is_empty() {
            return Err(ApiError::invalid_config("no api endpoint specified"));
        }
        Url::parse(&self.endpoint)
            .map_err(|e| ApiError::invalid_config(format!("invalid endpoint: {e}")))?;

        let http = reqwest::Client::builder()
            .user_agent(self.user_agent)
            .timeout(self.timeout)
            .cookie_store(true)
            .build()?;

        Ok(OdgClient {
            http,
            endpoint: self.endpoint.trim_end_matches('/').to_string(),
            auth: self.auth,
        })
    }
}

/// Client for the Open Delivery Gear API.
///
/// The session cookie obtained by [`OdgClient::authenticate`] is kept in the
/// client's cookie store and sent with every subsequent request.
#[derive(Debug, Clone)]
pub struct OdgClient {
    http: reqwest::Client,
    endpoint: String,
    auth: Authentication,
}

impl OdgClient {
    /// Creates a builder for a client against `endpoint`.
    pub fn builder(endpoint: impl Into<String>) -> OdgClientBuilder {
        OdgClientBuilder {
            endpoint: endpoint.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
            auth: Authentication::None,
        }
    }

    /// Returns the API endpoint without a trailing slash.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns `true` if the client is configured to authenticate.
    pub fn requires_authentication(&self) -> bool {
        !matches!(self.auth, Authentication::None)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path)
    }

    /// Obtains a session cookie. A no-op without configured authentication.
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    pub async fn authenticate(&self) -> Result<()> {
        let Authentication::Github {
            api_url,
            access_token,
        } = &self.auth
        else {
            return Ok(());
        };

        let request = self
            .http
            .get(self.url("auth"))
            .query(&[("api_url", api_url.as_str()), ("access_token", access_token.as_str())]);
        send(request, &Method::GET, "/auth").await?;

        info!(api_url = %api_url, "authenticated against odg api");
        Ok(())
    }

    /// Terminates the session obtained by [`OdgClient::authenticate`].
    pub async fn logout(&self) -> Result<()> {
        if !self.requires_authentication() {
            return Ok(());
        }
        send(self.http.get(self.url("auth/logout")), &Method::GET, "/auth/logout").await?;
        debug!("logged out from odg api");
        Ok(())
    }
}

#[async_trait]
impl DeliveryService for OdgClient {
    #[instrument(
        skip(self, filter),
        fields(
            component = %filter.component_name,
            artefact_type = %filter.artefact.artefact_type,
        )
    )]
    async fn query_artefact_metadata(
        &self,
        datatype: &str,
        filter: &ComponentArtefactId,
    ) -> Result<Vec<ArtefactMetadata>> {
        let entries = std::slice::from_ref(filter);
        let request = self
            .http
            .post(self.url(METADATA_QUERY_PATH))
            .query(&[("type", datatype)])
            .json(&Entries { entries });

        let response = send(request, &Method::POST, METADATA_QUERY_PATH).await?;
        decode(response, METADATA_QUERY_PATH).await
    }

    async fn delete_artefact_metadata(&self, entries: &[ArtefactMetadata]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let request = self
            .http
            .delete(self.url(METADATA_PATH))
            .json(&Entries { entries });
        send(request, &Method::DELETE, METADATA_PATH).await?;
        debug!(count = entries.len(), "deleted artefact metadata");
        Ok(())
    }

    async fn submit_artefact_metadata(&self, entries: &[ArtefactMetadata]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let request = self
            .http
            .put(self.url(METADATA_PATH))
            .json(&Entries { entries });
        send(request, &Method::PUT, METADATA_PATH).await?;
        debug!(count = entries.len(), "submitted artefact metadata");
        Ok(())
    }

    async fn query_runtime_artefacts(
        &self,
        labels: &LabelSet,
    ) -> Result<Vec<RuntimeArtefactResultItem>> {
        let request = self
            .http
            .get(self.url(RUNTIME_ARTEFACTS_PATH))
            .query(&labels.to_query());
        let response = send(request, &Method::GET, RUNTIME_ARTEFACTS_PATH).await?;
        decode(response, RUNTIME_ARTEFACTS_PATH).await
    }

    async fn delete_runtime_artefacts(&self, names: &[String]) -> Result<()> {
        if names.is_empty() {
            return Ok(());
        }
        let params: Vec<(&str, &str)> = names.iter().map(|n| ("name", n.as_str())).collect();
        let request = self
            .http
            .delete(self.url(RUNTIME_ARTEFACTS_PATH))
            .query(&params);
        send(request, &Method::DELETE, RUNTIME_ARTEFACTS_PATH).await?;
        debug!(count = names.len(), "deleted runtime artefacts");
        Ok(())
    }

    async fn submit_runtime_artefacts(
        &self,
        labels: &LabelSet,
        artefacts: &[ComponentArtefactId],
    ) -> Result<()> {
        if artefacts.is_empty() {
            return Ok(());
        }
        let request = self
            .http
            .put(self.url(RUNTIME_ARTEFACTS_PATH))
            .query(&labels.to_query())
            .json(&RuntimeArtefactUpload { artefacts });
        send(request, &Method::PUT, RUNTIME_ARTEFACTS_PATH).await?;
        debug!(count = artefacts.len(), "submitted runtime artefacts");
        Ok(())
    }
}

async fn send(request: RequestBuilder, method: &Method, path: &str) -> Result<Response> {
    let response = request.send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::status(status.as_u16(), method.as_str(), path, body));
    }
    Ok(response)
}

async fn decode<T: DeserializeOwned + Default>(response: Response, path: &str) -> Result<T> {
    let body = response.text().await?;
    if body.trim().is_empty() || body.trim() == "null" {
        return Ok(T::default());
    }
    serde_json::from_str(&body).map_err(|e| ApiError::decode(path, e.to_string()))
}
