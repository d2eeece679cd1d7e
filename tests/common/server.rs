//! Test server management.
//!
//! Spawns and manages esl-pushd instances for integration testing.

use serde_json::Value;
use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::sleep;

/// A test server instance.
pub struct TestServer {
    child: Child,
    port: u16,
    http: reqwest::Client,
    _data_dir: TempDir,
}

impl TestServer {
    /// Spawn a server with default limits.
    pub async fn spawn(port: u16) -> anyhow::Result<Self> {
        Self::spawn_with_limits(port, 500, 50, 16).await
    }

    /// Spawn a server with the given connection caps and per-stream buffer.
    pub async fn spawn_with_limits(
        port: u16,
        max_connections: usize,
        max_connections_per_store: usize,
        channel_capacity: usize,
    ) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let config_path = data_dir.path().join("config.toml");
        let config_content = format!(
            r#"
[server]
name = "esl-pushd-test"
metrics_port = 0

[listen]
address = "127.0.0.1:{port}"

[limits]
max_connections = {max_connections}
max_connections_per_store = {max_connections_per_store}
channel_capacity = {channel_capacity}
"#
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_esl-pushd"))
            .arg(&config_path)
            .env("RUST_LOG", "warn")
            .spawn()?;

        let server = Self {
            child,
            port,
            http: reqwest::Client::new(),
            _data_dir: data_dir,
        };

        server.wait_until_ready().await?;
        Ok(server)
    }

    /// Wait until the server is accepting connections.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port))
                .await
                .is_ok()
            {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Server failed to start within 5 seconds")
    }

    /// Base URL of the API.
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Publish an event to a store, optionally naming the originating stream.
    pub async fn publish(
        &self,
        store: &str,
        event: Value,
        origin: Option<&str>,
    ) -> anyhow::Result<reqwest::Response> {
        let mut request = self
            .http
            .post(format!("{}/api/stores/{}/events", self.base_url(), store))
            .json(&event);
        if let Some(origin) = origin {
            request = request.header("x-client-id", origin);
        }
        Ok(request.send().await?)
    }

    /// GET a JSON document from the API.
    pub async fn get_json(&self, path: &str) -> anyhow::Result<Value> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
