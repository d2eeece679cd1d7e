//! Test event-stream client.
//!
//! Opens a store's event stream and decodes its `data:` frames.

use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;

/// An open event stream.
pub struct StreamClient {
    response: reqwest::Response,
    buffer: String,
}

impl StreamClient {
    /// Open a stream for `store` as `user`, optionally choosing the client id.
    ///
    /// Fails on any non-success status.
    pub async fn connect(
        base_url: &str,
        store: &str,
        user: &str,
        client_id: Option<&str>,
    ) -> anyhow::Result<Self> {
        let response = Self::open(base_url, store, user, client_id).await?;
        if !response.status().is_success() {
            anyhow::bail!("stream refused with {}", response.status());
        }
        Ok(Self {
            response,
            buffer: String::new(),
        })
    }

    /// Open a stream and return the raw response, successful or not.
    pub async fn open(
        base_url: &str,
        store: &str,
        user: &str,
        client_id: Option<&str>,
    ) -> anyhow::Result<reqwest::Response> {
        let mut query = vec![("userId", user.to_string())];
        if let Some(id) = client_id {
            query.push(("clientId", id.to_string()));
        }
        let response = reqwest::Client::new()
            .get(format!("{base_url}/api/stores/{store}/events"))
            .query(&query)
            .send()
            .await?;
        Ok(response)
    }

    /// Receive the next event.
    pub async fn recv(&mut self) -> anyhow::Result<Value> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive the next event, failing after `dur`.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<Value> {
        timeout(dur, self.next_frame()).await?
    }

    /// Assert that no event arrives within `dur`.
    pub async fn expect_silence(&mut self, dur: Duration) -> anyhow::Result<()> {
        match timeout(dur, self.next_frame()).await {
            Err(_) => Ok(()),
            Ok(Ok(event)) => anyhow::bail!("unexpected event: {event}"),
            Ok(Err(e)) => Err(e),
        }
    }

    async fn next_frame(&mut self) -> anyhow::Result<Value> {
        loop {
            if let Some(end) = self.buffer.find("\n\n") {
                let frame: String = self.buffer.drain(..end + 2).collect();
                let body = frame
                    .trim_end()
                    .strip_prefix("data: ")
                    .ok_or_else(|| anyhow::anyhow!("malformed frame: {frame:?}"))?;
                return Ok(serde_json::from_str(body)?);
            }
            match self.response.chunk().await? {
                Some(chunk) => self.buffer.push_str(std::str::from_utf8(&chunk)?),
                None => anyhow::bail!("stream closed"),
            }
        }
    }
}
