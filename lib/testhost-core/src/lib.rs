//! # Testhost Core
//!
//! Boot an in-process web host for HTTP integration testing.
//!
//! This crate is a test-fixture factory: it loads a settings file, assembles
//! a host from an explicit [`Startup`] composition root, and hands out HTTP
//! clients preconfigured for the running host. Tests talk to the application
//! under test only through those clients.
//!
//! The lifecycle is explicit and two-phase:
//!
//! - [`HostFactory::configure`] loads `appsettings.json` from the working
//!   directory (**Configured**: settings frozen, no host yet);
//! - [`HostFactory::start`] binds an ephemeral loopback port, runs the
//!   startup's serve future on a background task, and waits for readiness
//!   (**Hosted**);
//! - [`TestHost::client`] creates clients fixed to the `/api/` base path;
//! - [`TestHost::shutdown`] (or drop) tears the host down (**Disposed**).
//!
//! ## Quick start
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
//!         // Assemble the request pipeline from `settings` and serve it.
//!         # let _ = (listener, settings);
//!         Ok(())
//!     }
//! }
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let host = HostFactory::configure(AppStartup)?.start().await?;
//!
//! let client = host.client()?;
//! let response = client.get("/users")?.await?;
//! assert_eq!(response.status(), 200);
//!
//! host.shutdown();
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - Settings are loaded once at configure time and never mutated.
//! - Every client of one [`TestHost`] targets the same base address
//!   (`http://localhost:{port}/api/`) and the same host instance.
//! - Errors propagate synchronously: a missing or malformed settings file
//!   fails `configure`, a failing startup fails `start`, and clients of a
//!   shut-down host fail their requests instead of silently succeeding.

mod client;
pub use self::client::{Call, HttpClient, HttpClientBuilder, HttpClientError, Response};

mod host;
pub use self::host::{
    CLIENT_BASE_PATH, CLIENT_HOST, DEFAULT_MAX_BACKOFF_DELAY, Health, HostConfig, HostError,
    HostFactory, Startup, TestHost,
};

mod settings;
pub use self::settings::{DEFAULT_SETTINGS_FILE, Settings, SettingsError};
