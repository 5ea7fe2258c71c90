//! Event decoder - converts streamed payloads into attribute deltas
//!
//! Every event of a batch decodes to exactly one [`Delta`] except touch
//! events, which carry both a gesture and a panel id.

use nanoleaf_api::{effects_attr, state_attr, EventDomain, RawEvent, StreamPayload};
use serde_json::Value;
use state_store::StateValue;

use crate::attribute::Attribute;

/// A single change decoded from the event stream
#[derive(Debug, Clone, PartialEq)]
pub enum Delta {
    /// Write one attribute; `force` bypasses the unchanged-value check
    Write {
        attribute: Attribute,
        value: StateValue,
        force: bool,
    },
    /// The set of available effects changed
    EffectList(Vec<String>),
    /// Domain or attribute this adapter does not know about
    Unrecognized { event_id: u8, attr: Option<u8> },
    /// A known attribute with a value of the wrong shape
    Malformed { event_id: u8, attr: Option<u8> },
}

impl Delta {
    fn write(attribute: Attribute, value: StateValue) -> Self {
        Delta::Write {
            attribute,
            value,
            force: attribute.is_forced(),
        }
    }

    /// Attribute touched by this delta, if any
    pub fn attribute(&self) -> Option<Attribute> {
        match self {
            Delta::Write { attribute, .. } => Some(*attribute),
            Delta::EffectList(_) => Some(Attribute::EffectsList),
            Delta::Unrecognized { .. } | Delta::Malformed { .. } => None,
        }
    }
}

/// Decode one event batch
pub fn decode_payload(payload: &StreamPayload) -> Vec<Delta> {
    let event_id = payload.event_id;
    let mut deltas = Vec::with_capacity(payload.events.len());

    for event in &payload.events {
        match payload.domain() {
            Some(EventDomain::State) => deltas.push(decode_state(event_id, event)),
            Some(EventDomain::Effects) => deltas.push(decode_effects(event_id, event)),
            Some(EventDomain::Touch) => deltas.extend(decode_touch(event)),
            Some(EventDomain::Layout) | None => deltas.push(Delta::Unrecognized {
                event_id,
                attr: event.attr,
            }),
        }
    }

    deltas
}

fn decode_state(event_id: u8, event: &RawEvent) -> Delta {
    let attribute = match event.attr {
        Some(state_attr::ON) => Attribute::State,
        Some(state_attr::BRIGHTNESS) => Attribute::Brightness,
        Some(state_attr::HUE) => Attribute::Hue,
        Some(state_attr::SATURATION) => Attribute::Saturation,
        Some(state_attr::COLOR_TEMPERATURE) => Attribute::ColorTemp,
        Some(state_attr::COLOR_MODE) => Attribute::ColorMode,
        attr => return Delta::Unrecognized { event_id, attr },
    };
    Delta::write(attribute, json_to_value(event.value.as_ref()))
}

fn decode_effects(event_id: u8, event: &RawEvent) -> Delta {
    match event.attr {
        Some(effects_attr::SELECTED) => Delta::write(Attribute::Effect, json_to_value(event.value.as_ref())),
        Some(effects_attr::LIST) => match event.value.as_ref() {
            Some(Value::Array(items)) => Delta::EffectList(
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => Delta::Malformed {
                event_id,
                attr: event.attr,
            },
        },
        attr => Delta::Unrecognized { event_id, attr },
    }
}

fn decode_touch(event: &RawEvent) -> Vec<Delta> {
    let number = |value: Option<i64>| value.map(StateValue::from).unwrap_or_default();
    vec![
        Delta::write(Attribute::TouchGesture, number(event.gesture)),
        Delta::write(Attribute::TouchPanelId, number(event.panel_id)),
    ]
}

/// Convert a reported JSON value into a state value
///
/// Arrays and objects have no state representation and are kept as their
/// JSON text.
pub fn json_to_value(value: Option<&Value>) -> StateValue {
    match value {
        None | Some(Value::Null) => StateValue::Null,
        Some(Value::Bool(b)) => StateValue::Bool(*b),
        Some(Value::Number(n)) => n.as_f64().map(StateValue::Number).unwrap_or_default(),
        Some(Value::String(s)) => StateValue::Text(s.clone()),
        Some(other) => StateValue::Text(other.to_string()),
    }
}
