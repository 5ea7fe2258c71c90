//! HTTP client for the Nanoleaf OpenAPI

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::color::Rgb;
use crate::error::{ApiError, Result};
use crate::events::EventDomain;
use crate::info::DeviceInfo;
use crate::stream::{pump, EventCallback, EventStreamHandle};

/// Port the controllers listen on
pub const DEFAULT_PORT: u16 = 16021;

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(10000);

/// Operations the adapter needs from a controller
///
/// Each call resolves once the controller answered or failed with either an
/// HTTP status ([`ApiError::Http`]) or a transport error.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// Full snapshot of identity and state
    async fn get_info(&self) -> Result<DeviceInfo>;

    async fn turn_on(&self) -> Result<()>;

    async fn turn_off(&self) -> Result<()>;

    /// Brightness in percent, faded over `duration` seconds
    async fn set_brightness(&self, value: u8, duration: u32) -> Result<()>;

    async fn set_hue(&self, value: u16) -> Result<()>;

    async fn set_saturation(&self, value: u8) -> Result<()>;

    /// Colour temperature in Kelvin
    async fn set_color_temperature(&self, value: u16) -> Result<()>;

    /// Set a colour; the controller only understands HSV so it is converted first
    async fn set_rgb(&self, rgb: Rgb) -> Result<()>;

    async fn set_effect(&self, name: &str) -> Result<()>;

    /// Send a raw effect command and return the controller's response body
    async fn write_effect(&self, effect: &Value) -> Result<String>;

    /// Flash the panels
    async fn identify(&self) -> Result<()>;

    /// Rhythm module input: 0 microphone, 1 aux cable
    async fn set_rhythm_mode(&self, mode: u8) -> Result<()>;

    /// Subscribe to server-sent events for `domains`
    async fn start_events(&self, domains: &[EventDomain], on_event: EventCallback) -> Result<EventStreamHandle>;
}

/// [`DeviceApi`] over HTTP
#[derive(Debug, Clone)]
pub struct OpenApiClient {
    http: reqwest::Client,
    stream_http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct AuthTokenResponse {
    auth_token: String,
}

impl OpenApiClient {
    /// Client for `http://{host}:{port}/api/v1/{token}`
    pub fn new(host: &str, port: u16, token: &str, timeout: Duration) -> Result<Self> {
        Self::with_base_url(&format!("http://{}:{}", host, port), token, timeout)
    }

    /// Client for an explicit server root such as `http://127.0.0.1:8080`
    pub fn with_base_url(server: &str, token: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        // The event stream stays open indefinitely, so only connecting is bounded
        let stream_http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            stream_http,
            base_url: format!("{}/api/v1/{}", server.trim_end_matches('/'), token),
        })
    }

    /// Ask a controller in pairing mode for a new authorization token
    pub async fn request_auth_token(host: &str, port: u16, timeout: Duration) -> Result<String> {
        Self::request_auth_token_at(&format!("http://{}:{}", host, port), timeout).await
    }

    /// [`OpenApiClient::request_auth_token`] against an explicit server root
    pub async fn request_auth_token_at(server: &str, timeout: Duration) -> Result<String> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        let url = format!("{}/api/v1/new", server.trim_end_matches('/'));

        let response = http.post(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http(status.as_u16()));
        }
        let body: AuthTokenResponse = response.json().await?;
        Ok(body.auth_token)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn put(&self, path: &str, body: Value) -> Result<String> {
        tracing::trace!("PUT {} {}", path, body);
        let response = self.http.put(self.url(path)).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http(status.as_u16()));
        }
        Ok(response.text().await?)
    }

    async fn put_state(&self, body: Value) -> Result<()> {
        self.put("state", body).await.map(|_| ())
    }
}

#[async_trait]
impl DeviceApi for OpenApiClient {
    async fn get_info(&self) -> Result<DeviceInfo> {
        let response = self.http.get(self.url("")).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http(status.as_u16()));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn turn_on(&self) -> Result<()> {
        self.put_state(json!({ "on": { "value": true } })).await
    }

    async fn turn_off(&self) -> Result<()> {
        self.put_state(json!({ "on": { "value": false } })).await
    }

    async fn set_brightness(&self, value: u8, duration: u32) -> Result<()> {
        self.put_state(json!({ "brightness": { "value": value, "duration": duration } }))
            .await
    }

    async fn set_hue(&self, value: u16) -> Result<()> {
        self.put_state(json!({ "hue": { "value": value } })).await
    }

    async fn set_saturation(&self, value: u8) -> Result<()> {
        self.put_state(json!({ "sat": { "value": value } })).await
    }

    async fn set_color_temperature(&self, value: u16) -> Result<()> {
        self.put_state(json!({ "ct": { "value": value } })).await
    }

    async fn set_rgb(&self, rgb: Rgb) -> Result<()> {
        let hsv = rgb.to_hsv();
        self.put_state(json!({
            "hue": { "value": hsv.hue },
            "sat": { "value": hsv.saturation },
            "brightness": { "value": hsv.brightness },
        }))
        .await
    }

    async fn set_effect(&self, name: &str) -> Result<()> {
        self.put("effects", json!({ "select": name })).await.map(|_| ())
    }

    async fn write_effect(&self, effect: &Value) -> Result<String> {
        if !effect.is_object() {
            return Err(ApiError::InvalidPayload("effect must be a JSON object".to_string()));
        }
        self.put("effects", json!({ "write": effect })).await
    }

    async fn identify(&self) -> Result<()> {
        self.put("identify", json!({})).await.map(|_| ())
    }

    async fn set_rhythm_mode(&self, mode: u8) -> Result<()> {
        self.put("rhythm/rhythmMode", json!({ "rhythmMode": mode }))
            .await
            .map(|_| ())
    }

    async fn start_events(&self, domains: &[EventDomain], on_event: EventCallback) -> Result<EventStreamHandle> {
        let ids: Vec<String> = domains.iter().map(|d| d.id().to_string()).collect();
        let url = format!("{}?id={}", self.url("events"), ids.join(","));

        let response = self.stream_http.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Http(status.as_u16()));
        }
        tracing::debug!("Event stream opened for domains {}", ids.join(","));

        let task = tokio::spawn(pump(response, Arc::clone(&on_event)));
        Ok(EventStreamHandle::new(task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_layout() {
        let client = OpenApiClient::new("10.0.0.5", DEFAULT_PORT, "abc", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(client.url(""), "http://10.0.0.5:16021/api/v1/abc/");
        assert_eq!(client.url("state"), "http://10.0.0.5:16021/api/v1/abc/state");
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = OpenApiClient::with_base_url("http://127.0.0.1:8080/", "t", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(client.url("effects"), "http://127.0.0.1:8080/api/v1/t/effects");
    }
}
