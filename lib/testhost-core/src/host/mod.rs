//! Test host factory with an explicit two-phase lifecycle.
//!
//! The factory moves through the states of the fixture it implements:
//!
//! 1. **Configured**: [`HostFactory::configure`] loads the settings file
//!    (`appsettings.json` by default) and binds the factory to a [`Startup`]
//!    composition root. No host exists yet.
//! 2. **Hosted**: [`HostFactory::start`] binds an ephemeral loopback port,
//!    spawns the startup's serve future on a background task, waits for the
//!    host to become ready, and returns a [`TestHost`].
//! 3. **Disposed**: [`TestHost::shutdown`] (or dropping the `TestHost`)
//!    aborts the serve task; clients created earlier fail from then on.
//!
//! Every client handed out by a [`TestHost`] targets the same fixed base
//! address: `localhost`, the bound port, and the [`CLIENT_BASE_PATH`]
//! (`/api/`) path prefix.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::net::TcpListener;
//!
//! use testhost_core::{HostFactory, Settings, Startup};
//!
//! #[derive(Debug)]
//! struct AppStartup;
//!
//! impl Startup for AppStartup {
//!     type Error = std::io::Error;
//!
//!     async fn serve(&self, listener: TcpListener, settings: Settings) -> Result<(), Self::Error> {
//!         listener.set_nonblocking(true)?;
//!         let listener = tokio::net::TcpListener::from_std(listener)?;
//!         // Assemble the application from the settings and serve it here.
//!         # let _ = (listener, settings);
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let factory = HostFactory::configure(AppStartup)?;
//! let host = factory.start().await?;
//!
//! let client = host.client()?;
//! let response = client.get("/users")?.await?;
//! assert_eq!(response.status(), 200);
//! # Ok(())
//! # }
//! ```

use std::net::{Ipv4Addr, SocketAddr, TcpListener};
use std::path::Path;
use std::sync::Arc;

use backon::{ExponentialBuilder, Retryable};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::settings::DEFAULT_SETTINGS_FILE;
use crate::{HttpClient, Settings};

mod error;
pub use self::error::HostError;

mod startup;
pub use self::startup::{DEFAULT_MAX_BACKOFF_DELAY, Health, HostConfig, Startup};

/// Host name every produced client targets.
pub const CLIENT_HOST: &str = "localhost";

/// Base path every produced client targets.
pub const CLIENT_BASE_PATH: &str = "/api/";

/// A configured test host factory: settings loaded, host not yet built.
///
/// Owns the frozen [`Settings`] and the [`Startup`] composition root.
/// Consumed by [`HostFactory::start`], which brings up the host.
#[derive(Debug)]
pub struct HostFactory<S> {
    startup: S,
    settings: Settings,
}

impl<S> HostFactory<S> {
    /// Configures a factory from `appsettings.json` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Configuration`] if the file is missing,
    /// unreadable, or malformed. No host is built when configuration fails.
    pub fn configure(startup: S) -> Result<Self, HostError> {
        Self::configure_with(startup, DEFAULT_SETTINGS_FILE)
    }

    /// Configures a factory from an explicit settings file path.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Configuration`] if the file is missing,
    /// unreadable, or malformed.
    pub fn configure_with(startup: S, path: impl AsRef<Path>) -> Result<Self, HostError> {
        let settings = Settings::from_file(path)?;
        Ok(Self { startup, settings })
    }

    /// Configures a factory from settings already in hand.
    ///
    /// Useful when the settings come from somewhere other than a file, e.g.
    /// an inline fixture in a test.
    pub fn from_settings(startup: S, settings: Settings) -> Self {
        Self { startup, settings }
    }

    /// The frozen settings this factory was configured with.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}

impl<S> HostFactory<S>
where
    S: Startup + Send + Sync + 'static,
{
    /// Starts the host and returns the hosted state.
    ///
    /// Binds an ephemeral loopback port, spawns [`Startup::serve`] on a
    /// background task, and waits for the host to report ready using
    /// exponential backoff as tuned by [`Startup::config`].
    ///
    /// # Errors
    ///
    /// - [`HostError::IoError`] if the listener cannot be bound
    /// - [`HostError::HostBuild`] if the serve future fails (or resolves)
    ///   while the factory is still waiting for readiness
    /// - [`HostError::UnhealthyHost`] if the readiness wait gives up
    pub async fn start(self) -> Result<TestHost<S>, HostError> {
        let Self { startup, settings } = self;

        let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
        let listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;

        let startup = Arc::new(startup);
        let handle = tokio::spawn({
            let startup = Arc::clone(&startup);
            let settings = settings.clone();
            async move {
                if let Err(error) = startup.serve(listener, settings).await {
                    error!(?error, "Host serve task failed");
                    return Err(error.to_string());
                }
                Ok(())
            }
        });

        let config = startup.config();
        let probe_client = client_for(local_addr.port())?;
        let healthy = wait_for_health(&startup, &probe_client, local_addr, &config).await;

        // A finished serve task means the host died during bring-up; that
        // failure takes precedence over the readiness verdict.
        if handle.is_finished() {
            let error = match handle.await {
                Ok(Err(error)) => error,
                Ok(Ok(())) => "serve future resolved before the host became ready".to_string(),
                Err(join_error) => join_error.to_string(),
            };
            return Err(HostError::HostBuild { error });
        }

        if !healthy {
            handle.abort();
            return Err(HostError::UnhealthyHost {
                timeout: config.max_backoff_delay,
            });
        }

        Ok(TestHost {
            local_addr,
            settings,
            handle: Some(handle),
            startup,
        })
    }
}

/// A running in-process host.
///
/// Owns the background serve task for its whole lifetime. Clients created
/// with [`TestHost::client`] are transient, non-owning handles: they all
/// target the same base address and stop working once the host is shut down.
#[derive(Debug)]
pub struct TestHost<S> {
    local_addr: SocketAddr,
    settings: Settings,
    handle: Option<JoinHandle<Result<(), String>>>,
    startup: Arc<S>,
}

impl<S> TestHost<S> {
    /// Creates an HTTP client bound to this host.
    ///
    /// Every call returns a client with the same fixed base address:
    /// `http://localhost:{port}/api/`. No retries, timeouts, or randomness
    /// are applied here. Clients are independent of each other and of the
    /// host's lifetime; after [`TestHost::shutdown`] their requests fail.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::ClientError`] if the client cannot be assembled.
    pub fn client(&self) -> Result<HttpClient, HostError> {
        let client = client_for(self.local_addr.port())?;
        Ok(client)
    }

    /// The frozen settings the host was built from.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The startup composition root the host was built from.
    ///
    /// The host keeps the startup alive for its whole lifetime; this gives
    /// tests access to any state the startup carries.
    #[must_use]
    pub fn startup(&self) -> &S {
        &self.startup
    }

    /// The loopback address the host is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Tears the host down explicitly.
    ///
    /// Aborts the background serve task. Equivalent to dropping the host,
    /// but makes the lifecycle transition visible at the call site.
    pub fn shutdown(mut self) {
        self.abort_serve_task();
    }

    fn abort_serve_task(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl<S> Drop for TestHost<S> {
    fn drop(&mut self) {
        self.abort_serve_task();
    }
}

fn client_for(port: u16) -> Result<HttpClient, crate::HttpClientError> {
    HttpClient::builder()
        .with_host(CLIENT_HOST)
        .with_port(port)
        .with_base_path(CLIENT_BASE_PATH)?
        .build()
}

async fn wait_for_health<S>(
    startup: &Arc<S>,
    client: &HttpClient,
    local_addr: SocketAddr,
    config: &HostConfig,
) -> bool
where
    S: Startup + Send + Sync,
{
    let mut backoff = ExponentialBuilder::default()
        .with_min_delay(config.min_backoff_delay)
        .with_max_delay(config.max_backoff_delay)
        .with_max_times(config.max_retry_attempts);
    if config.backoff_jitter {
        backoff = backoff.with_jitter();
    }

    let probe = || {
        let client = client.clone();
        let startup = Arc::clone(startup);
        async move {
            match startup.health(&client).await {
                Health::Healthy => {
                    debug!("host healthy");
                    Ok(true)
                }
                Health::Unhealthy => {
                    debug!("host not yet healthy, retrying");
                    Err(std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "host not healthy yet",
                    ))
                }
                Health::Unknown => {
                    debug!("waiting until a connection can be established");
                    match tokio::net::TcpStream::connect(local_addr).await {
                        Ok(_) => Ok(true),
                        Err(err) => {
                            debug!(?err, %local_addr, "connection not yet accepted");
                            Err(err)
                        }
                    }
                }
            }
        }
    };

    probe.retry(&backoff).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener as TokioTcpListener;

    use super::*;
    use crate::SettingsError;

    fn test_settings() -> Settings {
        Settings::from_json_str(r#"{"app": {"name": "sample", "greeting": "hello"}}"#)
            .expect("valid settings")
    }

    fn fast_config() -> HostConfig {
        HostConfig {
            min_backoff_delay: Duration::from_millis(1),
            max_backoff_delay: Duration::from_millis(20),
            backoff_jitter: false,
            max_retry_attempts: 5,
        }
    }

    async fn respond(mut stream: tokio::net::TcpStream, body: String) {
        let mut buffer = [0u8; 1024];
        // Drain the request head before answering.
        loop {
            match stream.read(&mut buffer).await {
                Ok(0) => break,
                Ok(read) => {
                    if buffer[..read].windows(4).any(|win| win == b"\r\n\r\n") {
                        break;
                    }
                }
                Err(_) => return,
            }
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;
    }

    /// Mock startup answering every request with 200 and a per-host counter.
    #[derive(Debug, Default)]
    struct CounterStartup {
        hits: Arc<AtomicUsize>,
        startup_delay: Option<Duration>,
    }

    impl Startup for CounterStartup {
        type Error = std::io::Error;

        async fn serve(&self, listener: TcpListener, _settings: Settings) -> Result<(), Self::Error> {
            if let Some(delay) = self.startup_delay {
                tokio::time::sleep(delay).await;
            }
            listener.set_nonblocking(true)?;
            let listener = TokioTcpListener::from_std(listener)?;

            loop {
                let (stream, _) = listener.accept().await?;
                let hit = self.hits.fetch_add(1, Ordering::SeqCst) + 1;
                tokio::spawn(respond(stream, hit.to_string()));
            }
        }

        fn config(&self) -> HostConfig {
            fast_config()
        }
    }

    /// Mock startup with a controllable health verdict.
    #[derive(Debug)]
    struct HealthyFlagStartup {
        healthy: Arc<AtomicBool>,
    }

    impl Startup for HealthyFlagStartup {
        type Error = std::io::Error;

        async fn serve(&self, listener: TcpListener, _settings: Settings) -> Result<(), Self::Error> {
            listener.set_nonblocking(true)?;
            let listener = TokioTcpListener::from_std(listener)?;
            loop {
                let (stream, _) = listener.accept().await?;
                tokio::spawn(respond(stream, String::new()));
            }
        }

        async fn health(&self, _client: &HttpClient) -> Health {
            if self.healthy.load(Ordering::Relaxed) {
                Health::Healthy
            } else {
                Health::Unhealthy
            }
        }

        fn config(&self) -> HostConfig {
            fast_config()
        }
    }

    /// Mock startup echoing the raw request (head and body) back as the
    /// response body, so tests can assert what actually reached the host.
    #[derive(Debug)]
    struct EchoStartup;

    impl Startup for EchoStartup {
        type Error = std::io::Error;

        async fn serve(&self, listener: TcpListener, _settings: Settings) -> Result<(), Self::Error> {
            listener.set_nonblocking(true)?;
            let listener = TokioTcpListener::from_std(listener)?;

            loop {
                let (mut stream, _) = listener.accept().await?;
                tokio::spawn(async move {
                    let mut data = Vec::new();
                    let mut buffer = [0u8; 1024];
                    loop {
                        match stream.read(&mut buffer).await {
                            Ok(0) => break,
                            Ok(read) => {
                                data.extend_from_slice(&buffer[..read]);
                                if let Some(head_end) =
                                    data.windows(4).position(|win| win == b"\r\n\r\n")
                                {
                                    let head = String::from_utf8_lossy(&data[..head_end]);
                                    let content_length = head
                                        .lines()
                                        .filter_map(|line| line.split_once(':'))
                                        .find(|(name, _)| {
                                            name.eq_ignore_ascii_case("content-length")
                                        })
                                        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                                        .unwrap_or(0);
                                    if data.len() >= head_end + 4 + content_length {
                                        break;
                                    }
                                }
                            }
                            Err(_) => return,
                        }
                    }
                    let body = String::from_utf8_lossy(&data).into_owned();
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        }

        fn config(&self) -> HostConfig {
            fast_config()
        }
    }

    /// Mock startup whose serve future fails immediately.
    #[derive(Debug)]
    struct BrokenStartup;

    impl Startup for BrokenStartup {
        type Error = std::io::Error;

        async fn serve(
            &self,
            _listener: TcpListener,
            _settings: Settings,
        ) -> Result<(), Self::Error> {
            Err(std::io::Error::other("service registration failed"))
        }

        // The listener backlog would accept TCP probes even though serve
        // already failed, so report Unhealthy instead of relying on the
        // connect fallback.
        async fn health(&self, _client: &HttpClient) -> Health {
            Health::Unhealthy
        }

        fn config(&self) -> HostConfig {
            fast_config()
        }
    }

    #[tokio::test]
    async fn test_start_binds_an_ephemeral_loopback_port() {
        let factory = HostFactory::from_settings(CounterStartup::default(), test_settings());

        let host = factory.start().await.expect("host should start");
        assert_eq!(host.local_addr().ip(), Ipv4Addr::LOCALHOST);
        assert_ne!(host.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_every_client_targets_the_fixed_api_base() {
        let factory = HostFactory::from_settings(CounterStartup::default(), test_settings());
        let host = factory.start().await.expect("host should start");

        let first = host.client().expect("client");
        let second = host.client().expect("client");

        assert_eq!(first.base_path(), "/api/");
        assert_eq!(second.base_path(), "/api/");
        assert_eq!(first.base_uri(), second.base_uri());
        assert_eq!(
            first.base_uri().to_string(),
            format!("http://localhost:{}/api/", host.local_addr().port())
        );
    }

    #[tokio::test]
    async fn test_multiple_clients_reach_the_same_host_state() {
        let factory = HostFactory::from_settings(CounterStartup::default(), test_settings());
        let host = factory.start().await.expect("host should start");

        let first = host.client().expect("client");
        let second = host.client().expect("client");

        let response = first.get("/hits").expect("call").await.expect("response");
        let first_count: usize = response
            .as_text()
            .expect("text body")
            .parse()
            .expect("counter");

        let response = second.get("/hits").expect("call").await.expect("response");
        let second_count: usize = response
            .as_text()
            .expect("text body")
            .parse()
            .expect("counter");

        // Both clients hit the same counter, so the second request observes
        // the state left behind by the first.
        assert!(second_count > first_count);
        assert_eq!(host.startup().hits.load(Ordering::SeqCst), second_count);
    }

    #[tokio::test]
    async fn test_call_query_and_header_reach_the_host() {
        #[derive(serde::Serialize)]
        struct Paging {
            page: u32,
            name: &'static str,
        }

        let factory = HostFactory::from_settings(EchoStartup, test_settings());
        let host = factory.start().await.expect("host should start");
        let client = host.client().expect("client");

        let echoed = client
            .get("/things")
            .expect("call")
            .query(&Paging {
                page: 2,
                name: "a b",
            })
            .expect("query")
            .header("x-request-id", "test-42")
            .expect("header")
            .await
            .expect("response")
            .as_text()
            .expect("text body");

        assert!(echoed.contains("GET /api/things?page=2&name=a+b HTTP/1.1"));
        assert!(echoed.contains("x-request-id: test-42"));
    }

    #[tokio::test]
    async fn test_call_json_body_reaches_the_host() {
        let factory = HostFactory::from_settings(EchoStartup, test_settings());
        let host = factory.start().await.expect("host should start");
        let client = host.client().expect("client");

        let echoed = client
            .post("/things")
            .expect("call")
            .json(&serde_json::json!({"name": "Ada"}))
            .expect("json body")
            .await
            .expect("response")
            .as_text()
            .expect("text body");

        assert!(echoed.contains("POST /api/things HTTP/1.1"));
        assert!(echoed.contains("content-type: application/json"));
        assert!(echoed.contains(r#"{"name":"Ada"}"#));
    }

    #[tokio::test]
    async fn test_call_text_body_reaches_the_host() {
        let factory = HostFactory::from_settings(EchoStartup, test_settings());
        let host = factory.start().await.expect("host should start");
        let client = host.client().expect("client");

        let echoed = client
            .post("/notes")
            .expect("call")
            .text("a plain note")
            .await
            .expect("response")
            .as_text()
            .expect("text body");

        assert!(echoed.contains("POST /api/notes HTTP/1.1"));
        assert!(echoed.contains("content-type: text/plain; charset=utf-8"));
        assert!(echoed.contains("a plain note"));
    }

    #[tokio::test]
    async fn test_start_waits_for_a_slow_host() {
        let startup = CounterStartup {
            startup_delay: Some(Duration::from_millis(30)),
            ..CounterStartup::default()
        };
        let factory = HostFactory::from_settings(startup, test_settings());

        let result = factory.start().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_start_with_explicit_health_probe() {
        let startup = HealthyFlagStartup {
            healthy: Arc::new(AtomicBool::new(true)),
        };
        let factory = HostFactory::from_settings(startup, test_settings());

        let result = factory.start().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_unhealthy_host_fails_with_timeout() {
        let startup = HealthyFlagStartup {
            healthy: Arc::new(AtomicBool::new(false)),
        };
        let factory = HostFactory::from_settings(startup, test_settings());

        let result = factory.start().await;
        match result {
            Err(HostError::UnhealthyHost { timeout }) => {
                assert_eq!(timeout, fast_config().max_backoff_delay);
            }
            other => panic!("expected UnhealthyHost, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_broken_startup_surfaces_as_host_build_error() {
        let factory = HostFactory::from_settings(BrokenStartup, test_settings());

        let result = factory.start().await;
        match result {
            Err(HostError::HostBuild { error }) => {
                assert!(error.contains("service registration failed"));
            }
            other => panic!("expected HostBuild, got: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_shutdown_invalidates_existing_clients() {
        let factory = HostFactory::from_settings(CounterStartup::default(), test_settings());
        let host = factory.start().await.expect("host should start");
        let client = host.client().expect("client");

        let response = client.get("/hits").expect("call").await.expect("response");
        assert_eq!(response.status(), 200);

        host.shutdown();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let result = client.get("/hits").expect("call").await;
        assert!(result.is_err(), "requests must fail after shutdown");
    }

    #[tokio::test]
    async fn test_drop_aborts_the_serve_task() {
        let factory = HostFactory::from_settings(CounterStartup::default(), test_settings());
        let host = factory.start().await.expect("host should start");
        let addr = host.local_addr();

        drop(host);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let connection = tokio::net::TcpStream::connect(addr).await;
        assert!(connection.is_err(), "listener must be gone after drop");
    }

    #[tokio::test]
    async fn test_host_exposes_the_frozen_settings() {
        let settings = test_settings();
        let factory = HostFactory::from_settings(CounterStartup::default(), settings.clone());
        assert_eq!(factory.settings(), &settings);

        let host = factory.start().await.expect("host should start");
        assert_eq!(host.settings(), &settings);
        assert_eq!(host.settings().get("app.greeting"), Some("hello"));
    }

    #[test]
    fn test_configure_with_missing_file_fails_before_any_host_exists() {
        let path =
            std::env::temp_dir().join(format!("testhost-missing-{}.json", uuid::Uuid::new_v4()));

        let result = HostFactory::configure_with(BrokenStartup, &path);
        match result {
            Err(HostError::Configuration(SettingsError::Io { .. })) => {}
            other => panic!("expected Configuration error, got: {other:?}"),
        }
    }

    #[test]
    fn test_configure_with_reads_the_settings_file() {
        let path =
            std::env::temp_dir().join(format!("testhost-settings-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, r#"{"logging": {"level": "warn"}}"#).expect("write fixture");

        let factory =
            HostFactory::configure_with(CounterStartup::default(), &path).expect("configured");
        assert_eq!(factory.settings().get("logging.level"), Some("warn"));

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_configure_with_malformed_file_is_a_configuration_error() {
        let path =
            std::env::temp_dir().join(format!("testhost-malformed-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(&path, "{not json").expect("write fixture");

        let result = HostFactory::configure_with(BrokenStartup, &path);
        match result {
            Err(HostError::Configuration(SettingsError::Malformed { .. })) => {}
            other => panic!("expected Configuration error, got: {other:?}"),
        }

        let _ = std::fs::remove_file(&path);
    }
}
