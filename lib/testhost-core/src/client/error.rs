//! Error types for the HTTP client.

/// Errors that can occur when building or using an [`HttpClient`].
///
/// [`HttpClient`]: super::HttpClient
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum HttpClientError {
    /// HTTP client error from the underlying reqwest library.
    ///
    /// Occurs when requests fail at the transport level, e.g. when the host
    /// has been shut down and the connection is refused.
    ReqwestError(reqwest::Error),

    /// URL parsing error when constructing request URLs.
    UrlError(url::ParseError),

    /// HTTP protocol error from the http crate.
    ///
    /// Occurs when the base URI cannot be assembled from its parts.
    HttpError(http::Error),

    /// Invalid HTTP header name.
    InvalidHeaderName(http::header::InvalidHeaderName),

    /// Invalid HTTP header value.
    InvalidHeaderValue(http::header::InvalidHeaderValue),

    /// JSON serialization error for a request body.
    JsonValueError(serde_json::Error),

    /// Query parameter serialization error.
    ///
    /// Occurs when converting structures to URL query strings.
    QuerySerializationError(serde_urlencoded::ser::Error),

    /// Invalid base path configuration.
    ///
    /// Occurs when the provided base path cannot be used for URL construction.
    #[display("Invalid base path: {error}")]
    InvalidBasePath {
        /// Description of why the base path is invalid.
        error: String,
    },

    /// JSON response deserialization failure.
    ///
    /// Occurs when the response body cannot be parsed as the expected
    /// structure. Carries the JSON path of the failure and the raw body.
    #[display("Failed to deserialize JSON at '{path}': {error}\n{body}")]
    #[from(skip)]
    JsonError {
        /// JSON path where deserialization failed.
        path: String,
        /// The underlying JSON parsing error.
        error: serde_json::Error,
        /// The response body that failed to parse.
        body: String,
    },

    /// Response body is not valid UTF-8 text.
    #[display("Response body is not valid UTF-8: {_0}")]
    InvalidTextBody(std::string::FromUtf8Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_client_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<HttpClientError>();
        assert_sync::<HttpClientError>();
    }

    #[test]
    fn test_invalid_base_path_display() {
        let error = HttpClientError::InvalidBasePath {
            error: "contains spaces".to_string(),
        };
        assert_eq!(format!("{error}"), "Invalid base path: contains spaces");
    }

    #[test]
    fn test_json_error_display_includes_path_and_body() {
        let inner = serde_json::from_str::<u32>("true").unwrap_err();
        let error = HttpClientError::JsonError {
            path: "user.age".to_string(),
            error: inner,
            body: "{\"user\":{\"age\":true}}".to_string(),
        };
        let rendered = format!("{error}");
        assert!(rendered.contains("user.age"));
        assert!(rendered.contains("{\"user\":{\"age\":true}}"));
    }
}
