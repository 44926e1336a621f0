use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use testhost_core::{HostFactory, Settings, Startup};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// A minimal hand-rolled HTTP host that counts requests.
#[derive(Debug, Default)]
struct CounterStartup {
    hits: Arc<AtomicUsize>,
}

impl Startup for CounterStartup {
    type Error = std::io::Error;

    async fn serve(&self, listener: TcpListener, settings: Settings) -> Result<(), Self::Error> {
        listener.set_nonblocking(true)?;
        let listener = tokio::net::TcpListener::from_std(listener)?;
        let greeting = settings.get("app.greeting").unwrap_or("hits").to_string();

        loop {
            let (mut stream, _) = listener.accept().await?;
            let hit = self.hits.fetch_add(1, Ordering::SeqCst) + 1;
            let greeting = greeting.clone();
            tokio::spawn(async move {
                let mut buffer = [0u8; 1024];
                let _ = stream.read(&mut buffer).await;
                let body = format!("{greeting}: {hit}");
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().pretty().init();

    let settings = Settings::from_json_str(r#"{"app": {"greeting": "requests served"}}"#)?;
    let host = HostFactory::from_settings(CounterStartup::default(), settings)
        .start()
        .await?;

    let client = host.client()?;
    for _ in 0..3 {
        let response = client.get("/count")?.await?;
        println!("{}", response.as_text()?);
    }

    host.shutdown();
    Ok(())
}
