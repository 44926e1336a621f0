use std::future::Future;
use std::net::TcpListener;
use std::time::Duration;

use crate::{HttpClient, Settings};

/// The composition root of the application under test.
///
/// A `Startup` value describes, explicitly and in one place, how the
/// application assembles its request pipeline from the loaded
/// [`Settings`](crate::Settings) and how it serves requests on a listener.
/// There is no ambient or global wiring: the factory only knows what the
/// passed-in startup tells it.
///
/// # Example
///
/// ```rust,no_run
/// use std::net::TcpListener;
///
/// use testhost_core::{Settings, Startup};
///
/// #[derive(Debug)]
/// struct AppStartup;
///
/// impl Startup for AppStartup {
///     type Error = std::io::Error;
///
///     async fn serve(&self, listener: TcpListener, settings: Settings) -> Result<(), Self::Error> {
///         listener.set_nonblocking(true)?;
///         let listener = tokio::net::TcpListener::from_std(listener)?;
///         let _greeting = settings.get("app.greeting").unwrap_or("hello");
///         // Build the router from the settings and serve on the listener,
///         // e.g. with axum: axum::serve(listener, app).await
///         # let _ = listener;
///         Ok(())
///     }
/// }
/// ```
///
/// # Readiness
///
/// [`Startup::health`] lets the factory know when the host is ready. The
/// default returns [`Health::Unknown`], which makes the factory fall back to
/// a plain TCP connection test against the bound address.
pub trait Startup {
    /// Failure type of pipeline assembly and serving.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Assembles the request pipeline from the settings and serves it on the
    /// listener.
    ///
    /// This future runs on a background task for the whole lifetime of the
    /// host; for a healthy host it only resolves when the host is torn down.
    /// Resolving with `Err` during startup surfaces as
    /// [`HostError::HostBuild`](crate::HostError::HostBuild).
    fn serve(
        &self,
        listener: TcpListener,
        settings: Settings,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Reports whether the host is ready to accept requests.
    ///
    /// Called repeatedly while the factory waits for startup, with a client
    /// already bound to the host address.
    fn health(&self, _client: &HttpClient) -> impl Future<Output = Health> + Send {
        std::future::ready(Health::Unknown)
    }

    /// Tuning for the startup readiness wait.
    fn config(&self) -> HostConfig {
        HostConfig::default()
    }
}

/// Readiness of the host, as reported by [`Startup::health`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Health {
    /// The host is ready to accept requests.
    Healthy,
    /// The host is running but not yet ready.
    Unhealthy,
    /// The startup cannot tell; the factory falls back to a TCP connect test.
    Unknown,
}

/// Default upper bound for a single readiness backoff delay.
pub const DEFAULT_MAX_BACKOFF_DELAY: Duration = Duration::from_secs(1);

/// Tuning for the readiness wait performed by
/// [`HostFactory::start`](crate::HostFactory::start).
///
/// The factory retries the health probe with exponential backoff until it
/// reports [`Health::Healthy`] or the attempt cap is reached.
#[derive(Debug, Clone)]
pub struct HostConfig {
    /// Minimum delay between readiness probes.
    pub min_backoff_delay: Duration,
    /// Maximum delay between readiness probes.
    pub max_backoff_delay: Duration,
    /// Whether to add jitter to backoff delays.
    pub backoff_jitter: bool,
    /// Maximum number of readiness probes before giving up.
    pub max_retry_attempts: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            min_backoff_delay: Duration::from_millis(10),
            max_backoff_delay: DEFAULT_MAX_BACKOFF_DELAY,
            backoff_jitter: true,
            max_retry_attempts: 10,
        }
    }
}
