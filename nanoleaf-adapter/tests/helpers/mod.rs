//! Scripted controller for supervisor tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nanoleaf_adapter::{AdapterConfig, SupervisorHandle, Transition};
use nanoleaf_api::{
    deliver_chunk, ApiError, DeviceApi, DeviceInfo, EventCallback, EventDomain, EventStreamHandle, Result, Rgb,
    SseDecoder, StreamPayload,
};
use nanoleaf_discovery::Notification;
use serde_json::Value;
use tokio::sync::broadcast;

pub const HOST: &str = "192.168.1.40";
pub const TOKEN: &str = "Ob5C8QzXU7l2kA1fXz3uUgsnQYbiWL4t";
pub const CANVAS_NT: &str = "nanoleaf:nl29";

pub fn config() -> AdapterConfig {
    AdapterConfig::new(HOST, TOKEN)
}

pub fn canvas_info(firmware: &str) -> DeviceInfo {
    let body = format!(
        r#"{{
            "name": "Canvas 4A2B",
            "serialNo": "S19124C1234",
            "manufacturer": "Nanoleaf",
            "firmwareVersion": "{}",
            "model": "NL29",
            "state": {{
                "on": {{"value": true}},
                "brightness": {{"value": 80, "max": 100, "min": 0}},
                "hue": {{"value": 120, "max": 360, "min": 0}},
                "sat": {{"value": 100, "max": 100, "min": 0}},
                "ct": {{"value": 3000, "max": 6500, "min": 1200}},
                "colorMode": "hs"
            }},
            "effects": {{"select": "Flames", "effectsList": ["Flames", "Forest"]}}
        }}"#,
        firmware
    );
    serde_json::from_str(&body).unwrap()
}

/// A presence notification as the listener would parse it
pub fn notification(nts: &str, usn: &str, location: Option<&str>) -> Notification {
    let mut packet = format!(
        "NOTIFY * HTTP/1.1\r\nHOST: 239.255.255.250:1900\r\nNT: {}\r\nNTS: {}\r\nUSN: {}\r\n",
        CANVAS_NT, nts, usn
    );
    if let Some(location) = location {
        packet.push_str(&format!("Location: {}\r\n", location));
    }
    packet.push_str("\r\n");
    Notification::parse(&packet, IpAddr::V4(Ipv4Addr::new(192, 168, 1, 40))).unwrap()
}

/// Let the supervisor task drain its queue
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Transitions received so far
pub fn drain(rx: &mut broadcast::Receiver<Transition>) -> Vec<Transition> {
    let mut seen = Vec::new();
    while let Ok(transition) = rx.try_recv() {
        seen.push(transition);
    }
    seen
}

pub async fn wait_for_state(handle: &SupervisorHandle, state: nanoleaf_adapter::ConnectionState) {
    let mut rx = handle.watch_state();
    rx.wait_for(|s| *s == state).await.unwrap();
}

/// [`DeviceApi`] with scripted info results and recorded commands
#[derive(Default)]
pub struct MockDevice {
    info: Mutex<Option<DeviceInfo>>,
    info_script: Mutex<VecDeque<ApiError>>,
    info_requests: AtomicUsize,
    command_script: Mutex<VecDeque<Result<String>>>,
    command_delay: Mutex<Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    stream: Mutex<Option<EventCallback>>,
    decoder: Mutex<SseDecoder>,
    stream_starts: AtomicUsize,
}

impl MockDevice {
    pub fn new(info: DeviceInfo) -> Arc<Self> {
        let device = Self::default();
        *device.info.lock().unwrap() = Some(info);
        Arc::new(device)
    }

    /// Fail the next info requests with these errors, in order
    pub fn fail_info(&self, errors: impl IntoIterator<Item = ApiError>) {
        self.info_script.lock().unwrap().extend(errors);
    }

    pub fn update_info(&self, update: impl FnOnce(&mut DeviceInfo)) {
        if let Some(info) = self.info.lock().unwrap().as_mut() {
            update(info);
        }
    }

    /// Results of the next commands, in order; unscripted commands succeed
    pub fn script_commands(&self, results: impl IntoIterator<Item = Result<String>>) {
        self.command_script.lock().unwrap().extend(results);
    }

    pub fn set_command_delay(&self, delay: Duration) {
        *self.command_delay.lock().unwrap() = delay;
    }

    pub fn info_requests(&self) -> usize {
        self.info_requests.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn stream_starts(&self) -> usize {
        self.stream_starts.load(Ordering::SeqCst)
    }

    /// Deliver a payload through the open event stream
    pub fn push_event(&self, payload: StreamPayload) {
        let callback = self.stream.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback(Ok(payload));
        }
    }

    /// Feed raw SSE bytes through the client's framing; returns the payloads delivered
    pub fn push_raw(&self, chunk: &[u8]) -> usize {
        let callback = self.stream.lock().unwrap().clone();
        let Some(callback) = callback else {
            return 0;
        };
        let mut decoder = self.decoder.lock().unwrap();
        deliver_chunk(&mut decoder, chunk, &callback)
    }

    /// End the open event stream with an error
    pub fn close_stream(&self, err: ApiError) {
        let callback = self.stream.lock().unwrap().take();
        if let Some(callback) = callback {
            callback(Err(err));
        }
    }

    async fn command(&self, call: String) -> Result<String> {
        self.calls.lock().unwrap().push(call);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = *self.command_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let scripted = self.command_script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| Ok(String::new()))
    }
}

#[async_trait]
impl DeviceApi for MockDevice {
    async fn get_info(&self) -> Result<DeviceInfo> {
        self.info_requests.fetch_add(1, Ordering::SeqCst);
        let scripted = self.info_script.lock().unwrap().pop_front();
        if let Some(err) = scripted {
            return Err(err);
        }
        self.info
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ApiError::Transport("no device".to_string()))
    }

    async fn turn_on(&self) -> Result<()> {
        self.command("turn_on".to_string()).await.map(|_| ())
    }

    async fn turn_off(&self) -> Result<()> {
        self.command("turn_off".to_string()).await.map(|_| ())
    }

    async fn set_brightness(&self, value: u8, duration: u32) -> Result<()> {
        self.command(format!("set_brightness({}, {})", value, duration)).await.map(|_| ())
    }

    async fn set_hue(&self, value: u16) -> Result<()> {
        self.command(format!("set_hue({})", value)).await.map(|_| ())
    }

    async fn set_saturation(&self, value: u8) -> Result<()> {
        self.command(format!("set_saturation({})", value)).await.map(|_| ())
    }

    async fn set_color_temperature(&self, value: u16) -> Result<()> {
        self.command(format!("set_color_temperature({})", value)).await.map(|_| ())
    }

    async fn set_rgb(&self, rgb: Rgb) -> Result<()> {
        self.command(format!("set_rgb({})", rgb.to_hex())).await.map(|_| ())
    }

    async fn set_effect(&self, name: &str) -> Result<()> {
        self.command(format!("set_effect({})", name)).await.map(|_| ())
    }

    async fn write_effect(&self, effect: &Value) -> Result<String> {
        self.command(format!("write_effect({})", effect)).await
    }

    async fn identify(&self) -> Result<()> {
        self.command("identify".to_string()).await.map(|_| ())
    }

    async fn set_rhythm_mode(&self, mode: u8) -> Result<()> {
        self.command(format!("set_rhythm_mode({})", mode)).await.map(|_| ())
    }

    async fn start_events(&self, _domains: &[EventDomain], on_event: EventCallback) -> Result<EventStreamHandle> {
        self.stream_starts.fetch_add(1, Ordering::SeqCst);
        *self.stream.lock().unwrap() = Some(on_event);
        Ok(EventStreamHandle::detached())
    }
}
