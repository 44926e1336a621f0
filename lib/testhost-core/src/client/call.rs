use std::future::{Future, IntoFuture};
use std::pin::Pin;

use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::HttpClientError;

/// A single HTTP request under construction.
///
/// Created by the verb methods on [`HttpClient`](super::HttpClient). The
/// request is executed with [`Call::exchange`], or by awaiting the call
/// directly since `Call` implements [`IntoFuture`]:
///
/// ```rust,no_run
/// # use testhost_core::HttpClient;
/// # async fn example(client: &HttpClient) -> Result<(), Box<dyn std::error::Error>> {
/// let response = client.get("/users")?.await?;
/// assert_eq!(response.status(), 200);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Call {
    pub(super) client: reqwest::Client,
    pub(super) base_uri: Uri,
    pub(super) method: Method,
    pub(super) path: String,
    pub(super) query: Option<String>,
    pub(super) headers: Vec<(HeaderName, HeaderValue)>,
    pub(super) body: Option<Body>,
}

#[derive(Debug)]
pub(super) struct Body {
    content_type: &'static str,
    data: Vec<u8>,
}

impl Call {
    /// Sets query parameters from a serializable value.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError::QuerySerializationError`] if the value
    /// cannot be encoded as a URL query string.
    pub fn query<T: Serialize>(mut self, query: &T) -> Result<Self, HttpClientError> {
        let query = serde_urlencoded::to_string(query)?;
        self.query = Some(query);
        Ok(self)
    }

    /// Adds a request header.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError::InvalidHeaderName`] or
    /// [`HttpClientError::InvalidHeaderValue`] if either part is malformed.
    pub fn header(mut self, name: &str, value: &str) -> Result<Self, HttpClientError> {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.headers.push((name, value));
        Ok(self)
    }

    /// Sets the request body to the JSON encoding of a value.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError::JsonValueError`] if serialization fails.
    pub fn json<T: Serialize>(mut self, body: &T) -> Result<Self, HttpClientError> {
        let data = serde_json::to_vec(body)?;
        self.body = Some(Body {
            content_type: "application/json",
            data,
        });
        Ok(self)
    }

    /// Sets the request body to plain text.
    #[must_use]
    pub fn text(mut self, text: &str) -> Self {
        self.body = Some(Body {
            content_type: "text/plain; charset=utf-8",
            data: text.as_bytes().to_vec(),
        });
        self
    }

    /// Executes the request and buffers the response.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError::ReqwestError`] on transport failures, e.g.
    /// when the host has been shut down, and [`HttpClientError::UrlError`]
    /// if the request URL cannot be assembled.
    pub async fn exchange(self) -> Result<Response, HttpClientError> {
        let Self {
            client,
            base_uri,
            method,
            path,
            query,
            headers,
            body,
        } = self;

        let url = build_url(&base_uri, &path, query.as_deref())?;

        let mut request = client.request(method, url);
        for (name, value) in headers {
            request = request.header(name, value);
        }
        if let Some(Body { content_type, data }) = body {
            request = request.header(http::header::CONTENT_TYPE, content_type);
            request = request.body(data);
        }

        let request = request.build()?;
        debug!(?request, "sending...");
        let response = client.execute(request).await?;
        debug!(?response, "...receiving");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

impl IntoFuture for Call {
    type Output = Result<Response, HttpClientError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.exchange())
    }
}

/// Checks early that a path resolves to a valid URL against the base URI.
pub(super) fn validate_path(base_uri: &Uri, path: &str) -> Result<(), HttpClientError> {
    build_url(base_uri, path, None).map(|_| ())
}

fn build_url(base_uri: &Uri, path: &str, query: Option<&str>) -> Result<Url, HttpClientError> {
    let base = base_uri.to_string();
    let url = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let mut url = url.parse::<Url>()?;

    if let Some(query) = query.filter(|it| !it.is_empty()) {
        url.set_query(Some(query));
    }

    Ok(url)
}

/// A buffered HTTP response.
///
/// The status, headers, and full body are read eagerly when the call is
/// exchanged, so accessors are synchronous and may be used repeatedly.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Response {
    /// HTTP status code of the response.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw response body.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.body
    }

    /// Response body decoded as UTF-8 text.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError::InvalidTextBody`] if the body is not valid
    /// UTF-8.
    pub fn as_text(&self) -> Result<String, HttpClientError> {
        let text = String::from_utf8(self.body.clone())?;
        Ok(text)
    }

    /// Response body deserialized from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`HttpClientError::JsonError`] carrying the JSON path of the
    /// failure and the raw body when deserialization fails.
    pub fn as_json<T: DeserializeOwned>(&self) -> Result<T, HttpClientError> {
        let deserializer = &mut serde_json::Deserializer::from_slice(&self.body);
        serde_path_to_error::deserialize(deserializer).map_err(|error| {
            HttpClientError::JsonError {
                path: error.path().to_string(),
                error: error.into_inner(),
                body: String::from_utf8_lossy(&self.body).into_owned(),
            }
        })
    }
}
