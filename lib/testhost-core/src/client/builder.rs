use std::fmt::Debug;
use std::net::{IpAddr, Ipv4Addr};

use http::Uri;
use http::uri::{PathAndQuery, Scheme};

use super::{HttpClient, HttpClientError};

/// Builder for creating [`HttpClient`] instances.
///
/// # Default Configuration
///
/// - **Scheme**: HTTP
/// - **Host**: 127.0.0.1 (localhost)
/// - **Port**: 80
/// - **Base path**: None (requests go to the root path)
///
/// # Example
///
/// ```rust
/// use testhost_core::HttpClient;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::builder()
///     .with_host("localhost")
///     .with_port(8080)
///     .with_base_path("/api/")?
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClientBuilder {
    client: reqwest::Client,
    scheme: Scheme,
    host: String,
    port: u16,
    base_path: Option<PathAndQuery>,
}

impl HttpClientBuilder {
    /// Builds the final [`HttpClient`] with all configured settings.
    ///
    /// # Errors
    ///
    /// Fails with [`HttpClientError::HttpError`] if the base URI cannot be
    /// constructed from the provided scheme, host, and port.
    pub fn build(self) -> Result<HttpClient, HttpClientError> {
        let Self {
            client,
            scheme,
            host,
            port,
            base_path,
        } = self;

        let builder = Uri::builder()
            .scheme(scheme)
            .authority(format!("{host}:{port}"));
        let builder = if let Some(path) = &base_path {
            builder.path_and_query(path.path())
        } else {
            builder.path_and_query("/")
        };

        let base_uri = builder.build()?;
        let base_path = base_path
            .as_ref()
            .map(|it| it.path().to_string())
            .unwrap_or_default();

        Ok(HttpClient {
            client,
            base_uri,
            base_path,
        })
    }

    /// Sets the HTTP scheme (protocol).
    #[must_use]
    pub fn with_scheme(mut self, scheme: Scheme) -> Self {
        self.scheme = scheme;
        self
    }

    /// Sets the hostname or IP address.
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the port number.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the base path prepended to all request paths.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError::InvalidBasePath`] if the path contains
    /// invalid characters (such as spaces) or cannot be parsed as a URI path.
    pub fn with_base_path<P>(mut self, base_path: P) -> Result<Self, HttpClientError>
    where
        P: TryInto<PathAndQuery>,
        P::Error: Debug + 'static,
    {
        let base_path = base_path
            .try_into()
            .map_err(|err| HttpClientError::InvalidBasePath {
                error: format!("{err:?}"),
            })?;
        self.base_path = Some(base_path);
        Ok(self)
    }
}

impl Default for HttpClientBuilder {
    fn default() -> Self {
        Self {
            client: reqwest::Client::new(),
            scheme: Scheme::HTTP,
            host: IpAddr::V4(Ipv4Addr::LOCALHOST).to_string(),
            port: 80,
            base_path: None,
        }
    }
}
