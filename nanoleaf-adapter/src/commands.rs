//! Command serializer
//!
//! Unacknowledged writes under the device tree become [`PendingCommand`]s.
//! They are sent to the controller one at a time in arrival order; a failed
//! command is logged and processing moves on to the next one.

use std::collections::VecDeque;

use nanoleaf_api::{ApiError, DeviceApi, Rgb};
use nanoleaf_state::{Attribute, RHYTHM_DEVICE};
use serde_json::Value;
use state_store::{ChangeEvent, StateStore, StateValue};
use thiserror::Error;

/// A user request waiting to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct PendingCommand {
    /// Last id component, e.g. `brightness`
    pub state_name: String,
    /// Requested value
    pub value: StateValue,
    /// Full id of the originating state
    pub id: String,
}

impl PendingCommand {
    pub fn new(id: impl Into<String>, value: impl Into<StateValue>) -> Self {
        let id = id.into();
        let state_name = id.rsplit('.').next().unwrap_or(&id).to_string();
        Self {
            state_name,
            value: value.into(),
            id,
        }
    }

    /// Command for an unacknowledged write directly below `device_name` or the rhythm device
    pub fn from_change(event: &ChangeEvent, device_name: &str) -> Option<Self> {
        if event.state.ack {
            return None;
        }
        match event.parent_name() {
            Some(parent) if parent == device_name || parent == RHYTHM_DEVICE => Some(Self {
                state_name: event.state_name().to_string(),
                value: event.state.val.clone(),
                id: event.id.clone(),
            }),
            _ => None,
        }
    }
}

/// Why a command was dropped without contacting the controller
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("Command for state '{0}' invalid, skipping...")]
    Unknown(String),

    /// Helper state consumed by another command
    #[error("State '{0}' is not sent on its own")]
    Ignored(String),

    #[error("OpenAPI: set RGB color: Supplied RGB hex string '{0}' is invalid!")]
    InvalidRgb(String),

    #[error("The supplied value for 'effectWrite' is no valid JSON! Error: {0}")]
    InvalidEffect(String),

    #[error("Invalid value '{value}' for state '{name}'")]
    InvalidValue { name: String, value: String },
}

/// One controller request, validated and ready to send
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Power(bool),
    Brightness { value: u8, duration: u32 },
    Hue(u16),
    Saturation(u8),
    ColorTemperature(u16),
    Rgb(Rgb),
    Effect(String),
    WriteEffect(Value),
    Identify,
    RhythmMode(u8),
}

impl DeviceCall {
    /// Translate a command into a request, rejecting malformed values locally
    ///
    /// Brightness commands read the transition time from the
    /// `brightness_duration` state of `device_name`.
    pub fn prepare(command: &PendingCommand, store: &StateStore, device_name: &str) -> Result<Self, CommandError> {
        let attribute = Attribute::from_state_name(&command.state_name)
            .ok_or_else(|| CommandError::Unknown(command.state_name.clone()))?;
        let value = &command.value;
        let invalid = || CommandError::InvalidValue {
            name: command.state_name.clone(),
            value: value.to_string(),
        };

        let call = match attribute {
            Attribute::State => DeviceCall::Power(value.as_bool().ok_or_else(invalid)?),
            Attribute::Brightness => DeviceCall::Brightness {
                value: integer(value).ok_or_else(invalid)?,
                duration: brightness_duration(store, device_name),
            },
            Attribute::Hue => DeviceCall::Hue(integer(value).ok_or_else(invalid)?),
            Attribute::Saturation => DeviceCall::Saturation(integer(value).ok_or_else(invalid)?),
            Attribute::ColorTemp => DeviceCall::ColorTemperature(integer(value).ok_or_else(invalid)?),
            Attribute::ColorRgb => {
                let hex = value.to_string();
                let rgb = Rgb::from_hex(&hex).map_err(|_| CommandError::InvalidRgb(hex.clone()))?;
                DeviceCall::Rgb(rgb)
            }
            Attribute::Effect => DeviceCall::Effect(value.to_string()),
            Attribute::EffectWrite => {
                let raw = value
                    .as_str()
                    .ok_or_else(|| CommandError::InvalidEffect(format!("expected a string, got '{}'", value)))?;
                let effect: Value =
                    serde_json::from_str(raw).map_err(|e| CommandError::InvalidEffect(e.to_string()))?;
                if !effect.is_object() {
                    return Err(CommandError::InvalidEffect("expected a JSON object".to_string()));
                }
                DeviceCall::WriteEffect(effect)
            }
            Attribute::Identify => DeviceCall::Identify,
            Attribute::RhythmMode => DeviceCall::RhythmMode(integer(value).ok_or_else(invalid)?),
            other if other.is_ignorable() => return Err(CommandError::Ignored(command.state_name.clone())),
            _ => return Err(CommandError::Unknown(command.state_name.clone())),
        };
        Ok(call)
    }

    /// Send the request; returns the response body for effect writes
    pub async fn execute(&self, api: &dyn DeviceApi) -> Result<Option<String>, ApiError> {
        match self {
            DeviceCall::Power(true) => api.turn_on().await?,
            DeviceCall::Power(false) => api.turn_off().await?,
            DeviceCall::Brightness { value, duration } => api.set_brightness(*value, *duration).await?,
            DeviceCall::Hue(value) => api.set_hue(*value).await?,
            DeviceCall::Saturation(value) => api.set_saturation(*value).await?,
            DeviceCall::ColorTemperature(value) => api.set_color_temperature(*value).await?,
            DeviceCall::Rgb(rgb) => api.set_rgb(*rgb).await?,
            DeviceCall::Effect(name) => api.set_effect(name).await?,
            DeviceCall::WriteEffect(effect) => return api.write_effect(effect).await.map(Some),
            DeviceCall::Identify => api.identify().await?,
            DeviceCall::RhythmMode(mode) => api.set_rhythm_mode(*mode).await?,
        }
        Ok(None)
    }

    /// Log line for a successful call
    pub fn describe(&self) -> String {
        match self {
            DeviceCall::Power(true) => "Device turned on".to_string(),
            DeviceCall::Power(false) => "Device turned off".to_string(),
            DeviceCall::Brightness { value, duration } => {
                format!("Brightness set to {} with duration of {} seconds", value, duration)
            }
            DeviceCall::Hue(value) => format!("Hue set to {}", value),
            DeviceCall::Saturation(value) => format!("Saturation set to {}", value),
            DeviceCall::ColorTemperature(value) => format!("Color temperature set to {}", value),
            DeviceCall::Rgb(rgb) => format!("RGB color set to {} ({},{},{})", rgb.to_hex(), rgb.r, rgb.g, rgb.b),
            DeviceCall::Effect(name) => format!("Effect set to '{}'", name),
            DeviceCall::WriteEffect(effect) => format!("Write Effect '{}'", effect),
            DeviceCall::Identify => "Identify panels enabled!".to_string(),
            DeviceCall::RhythmMode(mode) => format!("Rhythm mode set to '{}'", mode),
        }
    }
}

/// Integer view of a user value; fractions are truncated, out-of-range values rejected
fn integer<T: TryFrom<i64>>(value: &StateValue) -> Option<T> {
    value.as_i64().and_then(|n| T::try_from(n).ok())
}

fn brightness_duration(store: &StateStore, device_name: &str) -> u32 {
    store
        .get_state(&Attribute::BrightnessDuration.state_id(device_name))
        .and_then(|state| state.val.as_f64())
        .filter(|seconds| seconds.fract() == 0.0 && *seconds >= 0.0)
        .map(|seconds| seconds as u32)
        .unwrap_or(0)
}

/// Log a failed device call at the severity its status deserves
///
/// Bad requests and unprocessable values point at user input and log as
/// errors, a missing resource as a warning, anything else at debug.
pub fn log_api_error(context: &str, err: &ApiError) {
    let message = format!("{}, {}", context, err.format_error());
    match err.status() {
        Some(400) | Some(422) => tracing::error!("{}", message),
        Some(404) => tracing::warn!("{}", message),
        _ => tracing::debug!("{}", message),
    }
}

/// FIFO of pending commands with at most one in flight
#[derive(Debug, Default)]
pub struct CommandSerializer {
    queue: VecDeque<PendingCommand>,
    processing: bool,
}

impl CommandSerializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command; returns it (or the head) if it should be dispatched now
    pub fn enqueue(&mut self, command: PendingCommand) -> Option<PendingCommand> {
        self.queue.push_back(command);
        if self.processing {
            None
        } else {
            self.next()
        }
    }

    /// Pop the next command once the previous one settled
    pub fn next(&mut self) -> Option<PendingCommand> {
        match self.queue.pop_front() {
            Some(command) => {
                self.processing = true;
                tracing::debug!(
                    "Process new command '{}' with value '{}' from queue. Commands remaining: {}",
                    command.state_name,
                    command.value,
                    self.queue.len()
                );
                Some(command)
            }
            None => {
                if self.processing {
                    tracing::debug!("No further commands in queue. Processing finished.");
                }
                self.processing = false;
                None
            }
        }
    }

    /// Drop the backlog; an in-flight command is forgotten as well
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.processing = false;
        tracing::debug!("Command queue cleared!");
        dropped
    }

    pub fn is_processing(&self) -> bool {
        self.processing
    }

    /// Commands waiting behind the one in flight
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use state_store::{ObjectDescriptor, State, ValueType};

    fn command(name: &str, value: impl Into<StateValue>) -> PendingCommand {
        PendingCommand::new(format!("Canvas.{}", name), value)
    }

    fn prepare(name: &str, value: impl Into<StateValue>) -> Result<DeviceCall, CommandError> {
        DeviceCall::prepare(&command(name, value), &StateStore::new(), "Canvas")
    }

    #[test]
    fn test_from_change_filters() {
        let unacked = ChangeEvent::new("Canvas.hue", State::new(StateValue::from(10u8), false));
        let acked = ChangeEvent::new("Canvas.hue", State::new(StateValue::from(10u8), true));
        let rhythm = ChangeEvent::new("Rhythm.rhythmMode", State::new(StateValue::from(1u8), false));
        let nested = ChangeEvent::new("Canvas.touch.gesture", State::new(StateValue::from(1u8), false));
        let other = ChangeEvent::new("Shapes.hue", State::new(StateValue::from(10u8), false));

        let cmd = PendingCommand::from_change(&unacked, "Canvas").unwrap();
        assert_eq!(cmd.state_name, "hue");
        assert_eq!(cmd.id, "Canvas.hue");
        assert!(PendingCommand::from_change(&acked, "Canvas").is_none());
        assert!(PendingCommand::from_change(&rhythm, "Canvas").is_some());
        assert!(PendingCommand::from_change(&nested, "Canvas").is_none());
        assert!(PendingCommand::from_change(&other, "Canvas").is_none());
    }

    #[rstest]
    #[case("state", StateValue::Bool(true), DeviceCall::Power(true))]
    #[case("state", StateValue::Text("off".into()), DeviceCall::Power(false))]
    #[case("hue", StateValue::Text("120".into()), DeviceCall::Hue(120))]
    #[case("saturation", StateValue::Number(55.7), DeviceCall::Saturation(55))]
    #[case("colorTemp", StateValue::Number(2700.0), DeviceCall::ColorTemperature(2700))]
    #[case("colorRGB", StateValue::Text("#1a2b3c".into()), DeviceCall::Rgb(Rgb::new(26, 43, 60)))]
    #[case("effect", StateValue::Text("Flames".into()), DeviceCall::Effect("Flames".into()))]
    #[case("identify", StateValue::Bool(true), DeviceCall::Identify)]
    #[case("rhythmMode", StateValue::Number(1.0), DeviceCall::RhythmMode(1))]
    fn test_prepare(#[case] name: &str, #[case] value: StateValue, #[case] expected: DeviceCall) {
        assert_eq!(prepare(name, value), Ok(expected));
    }

    #[rstest]
    #[case("colorRGB", StateValue::Text("#zzzzzz".into()), CommandError::InvalidRgb("#zzzzzz".into()))]
    #[case("bogus", StateValue::Bool(true), CommandError::Unknown("bogus".into()))]
    #[case("colorMode", StateValue::Text("hs".into()), CommandError::Unknown("colorMode".into()))]
    #[case("brightness_duration", StateValue::Number(3.0), CommandError::Ignored("brightness_duration".into()))]
    fn test_prepare_rejects(#[case] name: &str, #[case] value: StateValue, #[case] expected: CommandError) {
        assert_eq!(prepare(name, value), Err(expected));
    }

    #[test]
    fn test_prepare_rejects_out_of_range() {
        assert!(matches!(
            prepare("brightness", 300u16),
            Err(CommandError::InvalidValue { .. })
        ));
        assert!(matches!(prepare("hue", "red"), Err(CommandError::InvalidValue { .. })));
    }

    #[test]
    fn test_prepare_effect_write() {
        let call = prepare("effectWrite", r#"{"command":"display","animType":"random"}"#).unwrap();
        match call {
            DeviceCall::WriteEffect(effect) => assert_eq!(effect["animType"], "random"),
            other => panic!("unexpected call {:?}", other),
        }

        assert!(matches!(prepare("effectWrite", "{not json"), Err(CommandError::InvalidEffect(_))));
        assert!(matches!(prepare("effectWrite", "[1, 2]"), Err(CommandError::InvalidEffect(_))));
    }

    #[test]
    fn test_brightness_reads_duration() {
        let store = StateStore::new();
        store.set_object(
            "Canvas.brightness_duration",
            ObjectDescriptor::state("Brightness duration", ValueType::Number),
        );
        store.set_state("Canvas.brightness_duration", 5u8, true).unwrap();

        let call = DeviceCall::prepare(&command("brightness", 40u8), &store, "Canvas").unwrap();
        assert_eq!(call, DeviceCall::Brightness { value: 40, duration: 5 });

        store.set_state("Canvas.brightness_duration", 2.5, true).unwrap();
        let call = DeviceCall::prepare(&command("brightness", 40u8), &store, "Canvas").unwrap();
        assert_eq!(call, DeviceCall::Brightness { value: 40, duration: 0 });
    }

    #[test]
    fn test_serializer_single_flight() {
        let mut serializer = CommandSerializer::new();

        let first = serializer.enqueue(command("hue", 1u8));
        assert_eq!(first.map(|c| c.value), Some(StateValue::from(1u8)));
        assert!(serializer.enqueue(command("hue", 2u8)).is_none());
        assert!(serializer.enqueue(command("hue", 3u8)).is_none());
        assert!(serializer.is_processing());
        assert_eq!(serializer.len(), 2);

        assert_eq!(serializer.next().map(|c| c.value), Some(StateValue::from(2u8)));
        assert_eq!(serializer.next().map(|c| c.value), Some(StateValue::from(3u8)));
        assert!(serializer.next().is_none());
        assert!(!serializer.is_processing());
    }

    #[test]
    fn test_serializer_clear() {
        let mut serializer = CommandSerializer::new();
        serializer.enqueue(command("hue", 1u8));
        serializer.enqueue(command("hue", 2u8));

        assert_eq!(serializer.clear(), 1);
        assert!(!serializer.is_processing());
        assert!(serializer.enqueue(command("hue", 3u8)).is_some());
    }

    proptest! {
        #[test]
        fn prop_fifo_with_single_flight(ops in proptest::collection::vec(any::<bool>(), 1..64)) {
            let mut serializer = CommandSerializer::new();
            let mut in_flight: Option<u32> = None;
            let mut dispatched = Vec::new();
            let mut next_value = 0u32;

            // true enqueues a command, false settles the one in flight
            for enqueue in ops {
                if enqueue {
                    if let Some(cmd) = serializer.enqueue(command("hue", next_value)) {
                        prop_assert!(in_flight.is_none());
                        in_flight = cmd.value.as_i64().map(|v| v as u32);
                        dispatched.push(in_flight.unwrap());
                    }
                    next_value += 1;
                } else if in_flight.take().is_some() {
                    if let Some(cmd) = serializer.next() {
                        in_flight = cmd.value.as_i64().map(|v| v as u32);
                        dispatched.push(in_flight.unwrap());
                    }
                }
            }
            while in_flight.take().is_some() {
                if let Some(cmd) = serializer.next() {
                    in_flight = cmd.value.as_i64().map(|v| v as u32);
                    dispatched.push(in_flight.unwrap());
                }
            }

            let expected: Vec<u32> = (0..next_value).collect();
            prop_assert_eq!(dispatched, expected);
        }
    }
}
