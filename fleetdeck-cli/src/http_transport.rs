//! `Transport` over HTTP: JSON requests plus the `text/event-stream` push
//! channel.

use std::time::Duration;

use anyhow::{Context, Result};
use frontend::dataflow::Relay;
use frontend::{Transport, TransportError};
use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;
use shared::{ServerSection, SseDecoder, SseFrame};

/// Reconnect delay until the server advertises its own via `retry:`.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

const ERROR_FIELDS: [&str; 3] = ["detail", "message", "error"];

pub struct HttpTransport {
    client: Client,
    /// No overall timeout: the event stream stays open indefinitely.
    stream_client: Client,
    base_url: String,
    events_path: String,
}

impl HttpTransport {
    pub fn new(server: &ServerSection) -> Result<Self> {
        let timeout = Duration::from_millis(server.request_timeout_ms);
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let stream_client = Client::builder()
            .connect_timeout(timeout)
            .build()
            .context("Failed to build event stream client")?;
        Ok(Self {
            client,
            stream_client,
            base_url: server.base_url.trim_end_matches('/').to_string(),
            events_path: server.events_path.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder, is_get: bool) -> Result<Value, TransportError> {
        let response = request
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if is_get && matches!(status, StatusCode::NOT_FOUND | StatusCode::METHOD_NOT_ALLOWED) {
            debug!("{} answered {}, treating as empty", response.url(), status);
            return Ok(Value::Array(Vec::new()));
        }

        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;
        let body = parse_body(&text);
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                message: error_message(status.as_u16(), &body),
            });
        }
        Ok(body)
    }
}

/// JSON when it parses, otherwise the raw text. An empty body is null.
fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

pub fn error_message(status: u16, body: &Value) -> String {
    ERROR_FIELDS
        .iter()
        .find_map(|field| {
            body.get(*field)
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty())
        })
        .map(str::to_string)
        .unwrap_or_else(|| format!("Request failed with status {}", status))
}

impl Transport for HttpTransport {
    async fn fetch_json(&self, path: &str) -> Result<Value, TransportError> {
        self.send(self.client.get(self.url(path)), true).await
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value, TransportError> {
        self.send(self.client.post(self.url(path)).json(&body), false)
            .await
    }

    async fn delete(&self, path: &str) -> Result<Value, TransportError> {
        self.send(self.client.delete(self.url(path)), false).await
    }

    fn subscribe_push(&self, frame_received_relay: Relay<SseFrame>) {
        let client = self.stream_client.clone();
        let url = self.url(&self.events_path);

        tokio::task::spawn_local(async move {
            let mut reconnect_delay = DEFAULT_RECONNECT_DELAY;
            loop {
                // an idle connection must not outlive the bus
                let outcome = tokio::select! {
                    outcome = stream_events(&client, &url, &frame_received_relay, &mut reconnect_delay) => outcome,
                    () = frame_received_relay.closed() => break,
                };
                match outcome {
                    Ok(()) => debug!("Event stream ended"),
                    Err(e) => warn!("Event stream error: {}", e),
                }
                if frame_received_relay.is_closed() {
                    break;
                }
                debug!("Reconnecting to {} in {:?}", url, reconnect_delay);
                tokio::select! {
                    () = tokio::time::sleep(reconnect_delay) => {}
                    () = frame_received_relay.closed() => break,
                }
            }
            info!("Event stream closed");
        });
    }
}

/// Read one connection until it ends or the bus stops listening.
async fn stream_events(
    client: &Client,
    url: &str,
    frame_received_relay: &Relay<SseFrame>,
    reconnect_delay: &mut Duration,
) -> Result<(), reqwest::Error> {
    let response = client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await?
        .error_for_status()?;
    debug!("Connected to event stream {}", url);

    let mut decoder = SseDecoder::new();
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        for frame in decoder.push(&chunk) {
            if frame_received_relay.try_send(frame).is_err() {
                return Ok(());
            }
        }
        if let Some(delay) = decoder.retry() {
            *reconnect_delay = delay;
        }
    }
    Ok(())
}
