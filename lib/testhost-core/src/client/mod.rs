//! Lightweight HTTP client bound to a base address.
//!
//! [`HttpClient`] issues requests against paths relative to a configured base
//! URI. The test host factory hands out clients preconfigured for the
//! in-process host; the client itself knows nothing about the host lifecycle
//! and stays usable only as long as the host is running.

use http::{Method, Uri};

mod builder;
pub use self::builder::HttpClientBuilder;

mod call;
pub use self::call::{Call, Response};

mod error;
pub use self::error::HttpClientError;

/// HTTP client scoped to a base address and base path.
///
/// Create instances with [`HttpClient::builder`], or let a
/// [`TestHost`](crate::TestHost) produce clients already bound to the
/// in-process host.
///
/// # Example
///
/// ```rust,no_run
/// use testhost_core::HttpClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::builder()
///     .with_host("localhost")
///     .with_port(8080)
///     .with_base_path("/api/")?
///     .build()?;
///
/// let response = client.get("/users")?.await?;
/// assert_eq!(response.status(), 200);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_uri: Uri,
    base_path: String,
}

impl HttpClient {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn builder() -> HttpClientBuilder {
        HttpClientBuilder::default()
    }

    /// The base URI every request is resolved against.
    #[must_use]
    pub fn base_uri(&self) -> &Uri {
        &self.base_uri
    }

    /// The base path prepended to all request paths.
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Starts a request with an arbitrary method.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError::UrlError`] if the path cannot be resolved
    /// against the base URI (e.g. it contains characters that are invalid in
    /// a URL).
    pub fn call(&self, method: Method, path: impl Into<String>) -> Result<Call, HttpClientError> {
        let path = path.into();
        call::validate_path(&self.base_uri, &path)?;
        Ok(Call {
            client: self.client.clone(),
            base_uri: self.base_uri.clone(),
            method,
            path,
            query: None,
            headers: Vec::new(),
            body: None,
        })
    }

    /// Starts a GET request.
    ///
    /// # Errors
    ///
    /// See [`HttpClient::call`].
    pub fn get(&self, path: impl Into<String>) -> Result<Call, HttpClientError> {
        self.call(Method::GET, path)
    }

    /// Starts a POST request.
    ///
    /// # Errors
    ///
    /// See [`HttpClient::call`].
    pub fn post(&self, path: impl Into<String>) -> Result<Call, HttpClientError> {
        self.call(Method::POST, path)
    }

    /// Starts a PUT request.
    ///
    /// # Errors
    ///
    /// See [`HttpClient::call`].
    pub fn put(&self, path: impl Into<String>) -> Result<Call, HttpClientError> {
        self.call(Method::PUT, path)
    }

    /// Starts a DELETE request.
    ///
    /// # Errors
    ///
    /// See [`HttpClient::call`].
    pub fn delete(&self, path: impl Into<String>) -> Result<Call, HttpClientError> {
        self.call(Method::DELETE, path)
    }

    /// Starts a PATCH request.
    ///
    /// # Errors
    ///
    /// See [`HttpClient::call`].
    pub fn patch(&self, path: impl Into<String>) -> Result<Call, HttpClientError> {
        self.call(Method::PATCH, path)
    }
}
