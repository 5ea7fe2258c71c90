//! Applies device snapshots and streamed deltas to the state store
//!
//! Every write goes through [`StateSynchronizer::set_changed_state`], which
//! compares against the stored value first. Applying the same snapshot
//! twice therefore produces no second write.

use std::collections::BTreeMap;

use nanoleaf_api::{hsv_to_rgb_hex, DeviceInfo, EventDomain, RhythmInfo, StreamPayload};
use state_store::{StateStore, StateValue};

use crate::attribute::Attribute;
use crate::decoder::{decode_payload, Delta};
use crate::error::Result;
use crate::objects::{
    self, RHYTHM_ACTIVE, RHYTHM_AUX_AVAILABLE, RHYTHM_CONNECTED, RHYTHM_FIRMWARE_VERSION, RHYTHM_HARDWARE_VERSION,
    RHYTHM_MODE,
};
use crate::profile::DeviceProfile;

/// Colour mode tag for which RGB is derived from hue, saturation and brightness
pub const HUE_SATURATION_MODE: &str = "hs";

/// Presence change of the rhythm module observed in a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RhythmTransition {
    Attached,
    Detached,
}

/// Outcome of applying one snapshot or delta batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Ids written, in write order
    pub written: Vec<String>,
    /// Writes rejected by the store
    pub failed: Vec<String>,
    /// Whether the effect state's enumerated values were replaced
    pub effects_metadata_changed: bool,
    pub rhythm: Option<RhythmTransition>,
    /// Events that could not be mapped to an attribute
    pub unrecognized: usize,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.written.is_empty() && !self.effects_metadata_changed && self.rhythm.is_none()
    }

    pub fn was_written(&self, id: &str) -> bool {
        self.written.iter().any(|written| written == id)
    }
}

/// Writes device state for one profile into the store
#[derive(Clone)]
pub struct StateSynchronizer {
    store: StateStore,
    profile: DeviceProfile,
}

impl StateSynchronizer {
    pub fn new(store: StateStore, profile: DeviceProfile) -> Self {
        Self { store, profile }
    }

    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    fn id(&self, attribute: Attribute) -> String {
        attribute.state_id(self.profile.device_name)
    }

    /// Prepare the object tree for a freshly connected device
    ///
    /// Trees of other models are removed and the rhythm tree follows the
    /// presence of a rhythm block in `info`.
    pub fn provision(&self, info: &DeviceInfo) {
        objects::remove_other_models(&self.store, &self.profile);
        match &info.rhythm {
            Some(rhythm) => objects::provision_rhythm(&self.store, rhythm.rhythm_connected),
            None => objects::remove_rhythm(&self.store),
        }
        tracing::debug!("nanoleaf Device '{}' ({}) detected!", self.profile.name, info.model);
        objects::provision_device(&self.store, &self.profile);
    }

    /// Write `value` with `ack = true` unless it equals the acknowledged stored value
    ///
    /// Returns whether a write happened.
    pub fn set_changed_state(&self, id: &str, value: impl Into<StateValue>, force: bool) -> Result<bool> {
        let value = value.into();
        let changed = match self.store.get_state(id) {
            None => true,
            Some(old) => old.val != value || force || !old.ack,
        };
        if !changed {
            return Ok(false);
        }

        tracing::debug!("Update from OpenAPI: value for state '{}' changed >>>> set new value: {}", id, value);
        self.store.set_state(id, value, true)?;
        Ok(true)
    }

    fn write(&self, report: &mut SyncReport, id: &str, value: impl Into<StateValue>, force: bool) {
        match self.set_changed_state(id, value, force) {
            Ok(true) => report.written.push(id.to_string()),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("State '{}' does not exist and will be ignored!", id);
                tracing::debug!("State '{}' does not exist and will be ignored! {}", id, e);
                report.failed.push(id.to_string());
            }
        }
    }

    fn write_attribute(&self, report: &mut SyncReport, attribute: Attribute, value: impl Into<StateValue>) {
        let id = self.id(attribute);
        self.write(report, &id, value, attribute.is_forced());
    }

    /// Apply a full snapshot from a poll
    pub fn apply_snapshot(&self, info: &DeviceInfo) -> SyncReport {
        let mut report = SyncReport::default();
        let state = &info.state;

        self.write_attribute(&mut report, Attribute::State, state.on.value);
        self.write_attribute(&mut report, Attribute::Brightness, state.brightness.value);
        self.write_attribute(&mut report, Attribute::Hue, state.hue.value);
        self.write_attribute(&mut report, Attribute::Saturation, state.sat.value);
        self.write_attribute(&mut report, Attribute::ColorTemp, state.ct.value);

        if state.color_mode == HUE_SATURATION_MODE {
            let rgb = hsv_to_rgb_hex(
                f64::from(state.hue.value),
                f64::from(state.sat.value),
                f64::from(state.brightness.value),
            );
            self.write_attribute(&mut report, Attribute::ColorRgb, rgb);
        }
        self.write_attribute(&mut report, Attribute::ColorMode, state.color_mode.as_str());

        if let Some(selected) = &info.effects.select {
            self.write_attribute(&mut report, Attribute::Effect, selected.as_str());
        }
        self.update_effect_list(&mut report, &info.effects.effects_list);

        self.write_attribute(&mut report, Attribute::InfoName, info.name.as_str());
        self.write_attribute(&mut report, Attribute::InfoSerialNo, info.serial_no.as_str());
        self.write_attribute(&mut report, Attribute::InfoFirmwareVersion, info.firmware_version.as_str());
        self.write_attribute(&mut report, Attribute::InfoModel, info.model.as_str());

        if let Some(rhythm) = &info.rhythm {
            self.apply_rhythm(&mut report, rhythm);
        }

        report
    }

    fn apply_rhythm(&self, report: &mut SyncReport, rhythm: &RhythmInfo) {
        let was_connected = self
            .store
            .get_state(RHYTHM_CONNECTED)
            .and_then(|state| state.val.as_bool())
            .unwrap_or(false);
        self.write(report, RHYTHM_CONNECTED, rhythm.rhythm_connected, false);

        if rhythm.rhythm_connected {
            if !was_connected {
                tracing::info!("Rhythm module attached!");
                objects::create_rhythm_module_states(&self.store);
                report.rhythm = Some(RhythmTransition::Attached);
            }
            self.write(report, RHYTHM_ACTIVE, rhythm.rhythm_active, false);
            self.write(report, RHYTHM_HARDWARE_VERSION, rhythm.hardware_version.as_deref(), false);
            self.write(report, RHYTHM_FIRMWARE_VERSION, rhythm.firmware_version.as_deref(), false);
            self.write(report, RHYTHM_AUX_AVAILABLE, rhythm.aux_available, false);
            self.write(report, RHYTHM_MODE, rhythm.rhythm_mode, false);
        } else if was_connected {
            tracing::info!("Rhythm module detached!");
            objects::delete_rhythm_module_states(&self.store);
            report.rhythm = Some(RhythmTransition::Detached);
        }
    }

    /// Rewrite the joined effect list and the effect state's enumerated values
    fn update_effect_list(&self, report: &mut SyncReport, effects: &[String]) {
        let joined = if effects.is_empty() {
            StateValue::Null
        } else {
            StateValue::from(effects.join(";"))
        };
        self.write_attribute(report, Attribute::EffectsList, joined);

        let id = self.id(Attribute::Effect);
        let Some(mut object) = self.store.get_object(&id) else {
            tracing::debug!("Error getting '{}'. States will not be updated!", id);
            return;
        };
        let states: BTreeMap<String, String> = effects.iter().map(|name| (name.clone(), name.clone())).collect();
        if object.common.states.as_ref() != Some(&states) {
            tracing::debug!(
                "Update from OpenAPI: possible states for state 'effect' changed >>>> set new states: {:?}",
                effects
            );
            object.common.states = Some(states);
            self.store.set_object(&id, object);
            report.effects_metadata_changed = true;
        }
    }

    /// Apply one batch from the event stream
    pub fn apply_delta(&self, payload: &StreamPayload) -> SyncReport {
        let mut report = SyncReport::default();
        let mut update_rgb = false;
        let known_domain = matches!(payload.domain(), Some(EventDomain::State | EventDomain::Effects));

        for delta in decode_payload(payload) {
            match delta {
                Delta::Write { attribute, value, force } => {
                    update_rgb |= attribute.affects_rgb();
                    let id = self.id(attribute);
                    self.write(&mut report, &id, value, force);
                }
                Delta::EffectList(effects) => self.update_effect_list(&mut report, &effects),
                Delta::Unrecognized { event_id, attr } => {
                    report.unrecognized += 1;
                    match attr {
                        Some(attr) if known_domain => tracing::warn!(
                            "Attribute '{}' for event ID '{}' is not implemented. Please report that to the developer!",
                            attr,
                            event_id
                        ),
                        _ => tracing::warn!(
                            "Invalid eventID '{}' received from device. Please report that to the developer!",
                            event_id
                        ),
                    }
                }
                Delta::Malformed { event_id, attr } => {
                    report.unrecognized += 1;
                    tracing::warn!(
                        "Invalid value for attribute '{:?}' of event ID '{}' received from device",
                        attr,
                        event_id
                    );
                }
            }
        }

        if update_rgb {
            self.refresh_rgb(&mut report);
        }
        report
    }

    /// Recompute the RGB colour from stored values when in hue/saturation mode
    fn refresh_rgb(&self, report: &mut SyncReport) {
        let value = |attribute: Attribute| self.store.get_state(&self.id(attribute)).map(|state| state.val);

        let in_hs_mode = value(Attribute::ColorMode)
            .as_ref()
            .and_then(StateValue::as_str)
            .is_some_and(|mode| mode == HUE_SATURATION_MODE);
        if !in_hs_mode {
            return;
        }

        let number = |attribute: Attribute| value(attribute).and_then(|val| val.as_f64()).unwrap_or(0.0);
        let rgb = hsv_to_rgb_hex(
            number(Attribute::Hue),
            number(Attribute::Saturation),
            number(Attribute::Brightness),
        );
        self.write_attribute(report, Attribute::ColorRgb, rgb);
    }
}
