//! Server-sent event payloads and framing
//!
//! The controller pushes one SSE message per change batch. The `id:` field
//! carries the event domain and `data:` a JSON object `{"events": [...]}`.

use serde::Deserialize;

use crate::error::{ApiError, Result};

/// Event domains the controller can stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventDomain {
    State,
    Layout,
    Effects,
    Touch,
}

impl EventDomain {
    pub fn id(self) -> u8 {
        match self {
            EventDomain::State => 1,
            EventDomain::Layout => 2,
            EventDomain::Effects => 3,
            EventDomain::Touch => 4,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(EventDomain::State),
            2 => Some(EventDomain::Layout),
            3 => Some(EventDomain::Effects),
            4 => Some(EventDomain::Touch),
            _ => None,
        }
    }
}

/// Attribute ids of the state domain
pub mod state_attr {
    pub const ON: u8 = 1;
    pub const BRIGHTNESS: u8 = 2;
    pub const HUE: u8 = 3;
    pub const SATURATION: u8 = 4;
    pub const COLOR_TEMPERATURE: u8 = 5;
    pub const COLOR_MODE: u8 = 6;
}

/// Attribute ids of the effects domain
pub mod effects_attr {
    pub const SELECTED: u8 = 1;
    pub const LIST: u8 = 2;
}

/// One entry of an event batch
///
/// State and effects events carry `attr`/`value`, touch events carry
/// `panelId`/`gesture`.
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEvent {
    #[serde(default)]
    pub attr: Option<u8>,
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(default)]
    pub panel_id: Option<i64>,
    #[serde(default)]
    pub gesture: Option<i64>,
}

impl RawEvent {
    pub fn attribute(attr: u8, value: serde_json::Value) -> Self {
        Self {
            attr: Some(attr),
            value: Some(value),
            ..Self::default()
        }
    }

    pub fn touch(gesture: i64, panel_id: i64) -> Self {
        Self {
            gesture: Some(gesture),
            panel_id: Some(panel_id),
            ..Self::default()
        }
    }
}

/// A decoded event batch
#[derive(Debug, Clone, PartialEq)]
pub struct StreamPayload {
    /// Raw domain id; unknown ids are kept so callers can report them
    pub event_id: u8,
    pub events: Vec<RawEvent>,
}

#[derive(Deserialize)]
struct EventBatch {
    #[serde(default)]
    events: Vec<RawEvent>,
}

impl StreamPayload {
    pub fn new(domain: EventDomain, events: Vec<RawEvent>) -> Self {
        Self {
            event_id: domain.id(),
            events,
        }
    }

    pub fn domain(&self) -> Option<EventDomain> {
        EventDomain::from_id(self.event_id)
    }

    /// Decode one SSE message
    pub fn parse(id: &str, data: &str) -> Result<Self> {
        let event_id = id
            .trim()
            .parse::<u8>()
            .map_err(|_| ApiError::Parse(format!("invalid event id '{}'", id)))?;
        let batch: EventBatch = serde_json::from_str(data)?;

        Ok(Self {
            event_id,
            events: batch.events,
        })
    }
}

/// One complete SSE message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseMessage {
    pub id: Option<String>,
    pub data: String,
}

impl SseMessage {
    pub fn into_payload(self) -> Result<StreamPayload> {
        let id = self
            .id
            .ok_or_else(|| ApiError::Parse("event without id".to_string()))?;
        StreamPayload::parse(&id, &self.data)
    }
}

/// Incremental SSE framing over arbitrary chunk boundaries
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
    id: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return every message completed by them
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseMessage> {
        self.pending.extend_from_slice(chunk);
        let mut messages = Vec::new();

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if !self.data.is_empty() {
                    messages.push(SseMessage {
                        id: self.id.clone(),
                        data: self.data.join("\n"),
                    });
                    self.data.clear();
                }
                continue;
            }
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line, ""),
            };
            match field {
                "id" => self.id = Some(value.to_string()),
                "data" => self.data.push(value.to_string()),
                _ => {}
            }
        }

        messages
    }
}
