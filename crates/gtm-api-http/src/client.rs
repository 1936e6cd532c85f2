//! Shared HTTP client
//!
//! Holds the base URL, the bearer token and one `reqwest::Client` reused by
//! both services. Request paths are passed as segments and percent-encoded
//! one by one, so names containing `/`, `?` or spaces stay a single segment.

use gtm_core::config::ServiceConfig;
use gtm_core::{Error, Result};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;

/// Authenticated client for the GTM APIs
#[derive(Clone)]
pub struct ApiClient {
    /// Parsed base URL, possibly with a path prefix
    base_url: Url,

    /// API access token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// HTTP client for API requests
    client: reqwest::Client,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_token", &"<REDACTED>")
            .finish()
    }
}

impl ApiClient {
    /// Build a client from validated service settings
    ///
    /// # Returns
    ///
    /// - `Ok(ApiClient)`: Ready to issue requests
    /// - `Err(Error::Config)`: Settings are invalid or the HTTP client could not be built
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::config(format!("Invalid API base URL: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(format!(
                "API base URL cannot carry a path. Got: {}",
                config.base_url
            )));
        }

        Ok(Self {
            base_url,
            api_token: config.api_token.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Absolute URL for an API path given as unencoded segments
    pub(crate) fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Start an authenticated request
    pub(crate) fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.client
            .request(method, self.url(segments))
            .bearer_auth(&self.api_token)
            .header("Accept", "application/json")
    }

    /// Send a request and decode a successful JSON response
    ///
    /// `service` names the API in error messages, `what` the requested object
    /// in not-found errors.
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        service: &'static str,
        what: &str,
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| Error::http(format!("{} request failed: {}", service, e)))?;

        let response = check_status(response, service, what).await?;

        response
            .json()
            .await
            .map_err(|e| Error::service(service, format!("Failed to parse response: {}", e)))
    }
}

async fn check_status(response: Response, service: &'static str, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string());
    Err(status_error(status, service, what, &error_text))
}

/// Map a non-success HTTP status to an error
pub(crate) fn status_error(
    status: StatusCode,
    service: &'static str,
    what: &str,
    error_text: &str,
) -> Error {
    match status.as_u16() {
        401 | 403 => Error::auth(format!(
            "Invalid API token or insufficient permissions. Status: {}",
            status
        )),
        404 => Error::not_found(what.to_string()),
        429 => Error::rate_limited(format!(
            "Rate limit exceeded. Please retry later. Status: {}",
            status
        )),
        500..=599 => Error::service(
            service,
            format!("Server error (transient): {} - {}", status, error_text),
        ),
        _ => Error::service(service, format!("{} - {}", status, error_text)),
    }
}
