//! Error types for the test host factory.

use std::time::Duration;

use crate::{HttpClientError, SettingsError};

/// Errors raised by the test host factory across its lifecycle.
///
/// Configuration errors surface at [`HostFactory::configure`], build and
/// readiness errors at [`HostFactory::start`]. The factory performs no
/// recovery: every error propagates synchronously to the caller and fails
/// the test that triggered it.
///
/// [`HostFactory::configure`]: crate::HostFactory::configure
/// [`HostFactory::start`]: crate::HostFactory::start
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum HostError {
    /// The settings file could not be loaded.
    ///
    /// Raised at configuration time, before any host exists.
    #[display("Configuration error: {_0}")]
    Configuration(SettingsError),

    /// I/O failure while binding or inspecting the host listener.
    #[display("I/O error: {_0}")]
    IoError(std::io::Error),

    /// The preconfigured client could not be built.
    #[display("Client error: {_0}")]
    ClientError(HttpClientError),

    /// The startup's serve future failed while the host was being brought up.
    ///
    /// Raised at first host access, when pipeline assembly or service
    /// registration fails.
    #[from(ignore)]
    #[display("Host build failed: {error}")]
    HostBuild {
        /// Message of the startup failure.
        error: String,
    },

    /// The host never became healthy within the readiness wait.
    #[from(ignore)]
    #[display("Host failed to become healthy within {timeout:?}")]
    UnhealthyHost {
        /// The backoff ceiling that was in effect when the wait gave up.
        timeout: Duration,
    },
}
