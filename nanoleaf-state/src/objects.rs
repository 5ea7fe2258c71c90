//! Provisioning of the object tree in the state store
//!
//! Objects are created only when missing, so running provisioning on every
//! connect keeps user edits to names or roles intact.

use state_store::{ObjectDescriptor, StateStore, ValueType};

use crate::attribute::{Attribute, RHYTHM_DEVICE};
use crate::profile::{DeviceProfile, PROFILES};

/// Adapter-level connection indicator
pub const CONNECTION_STATE: &str = "info.connection";

pub const RHYTHM_INFO: &str = "Rhythm.info";
pub const RHYTHM_CONNECTED: &str = "Rhythm.info.connected";
pub const RHYTHM_ACTIVE: &str = "Rhythm.info.active";
pub const RHYTHM_AUX_AVAILABLE: &str = "Rhythm.info.auxAvailable";
pub const RHYTHM_FIRMWARE_VERSION: &str = "Rhythm.info.firmwareVersion";
pub const RHYTHM_HARDWARE_VERSION: &str = "Rhythm.info.hardwareVersion";
pub const RHYTHM_MODE: &str = "Rhythm.rhythmMode";

/// States that exist only while a rhythm module is attached
pub const RHYTHM_MODULE_STATES: [&str; 5] = [
    RHYTHM_ACTIVE,
    RHYTHM_AUX_AVAILABLE,
    RHYTHM_FIRMWARE_VERSION,
    RHYTHM_HARDWARE_VERSION,
    RHYTHM_MODE,
];

pub const GESTURES: [(&str, &str); 6] = [
    ("0", "Single Tap"),
    ("1", "Double Tap"),
    ("2", "Swipe Up"),
    ("3", "Swipe Down"),
    ("4", "Swipe Left"),
    ("5", "Swipe Right"),
];

pub fn provision_adapter(store: &StateStore) {
    store.set_object_not_exists("info", ObjectDescriptor::channel("Information"));
    store.set_object_not_exists(
        CONNECTION_STATE,
        ObjectDescriptor::state("Device or service connected", ValueType::Boolean)
            .role("indicator.connection")
            .default_value(false),
    );
}

/// Create the state tree of `profile`, returning whether the device was new
pub fn provision_device(store: &StateStore, profile: &DeviceProfile) -> bool {
    let root = profile.device_name;
    let id = |attribute: Attribute| attribute.state_id(root);

    let created = store.set_object_not_exists(root, ObjectDescriptor::device(format!("{} Device", profile.name)));
    if created {
        tracing::info!("New nanoleaf device '{}' ({}) detected!", profile.name, profile.model);
    }

    store.set_object_not_exists(
        &format!("{}.info", root),
        ObjectDescriptor::channel(format!("{} Device Information", profile.name)),
    );
    let info = [
        (Attribute::InfoFirmwareVersion, "Firmware Version of nanoleaf device", "info.version"),
        (Attribute::InfoModel, "Model of nanoleaf device", "info.model"),
        (Attribute::InfoName, "Name of nanoleaf device", "info.name"),
        (Attribute::InfoSerialNo, "Serial No. of nanoleaf device", "info.serial"),
    ];
    for (attribute, name, role) in info {
        store.set_object_not_exists(&id(attribute), ObjectDescriptor::state(name, ValueType::String).role(role));
    }

    store.set_object_not_exists(
        &id(Attribute::State),
        ObjectDescriptor::state("Power State", ValueType::Boolean)
            .writable()
            .role("switch.light")
            .default_value(false)
            .desc("Switch on/off"),
    );
    store.set_object_not_exists(
        &id(Attribute::Brightness),
        ObjectDescriptor::state("Brightness level", ValueType::Number)
            .writable()
            .role("level.dimmer")
            .unit("%")
            .range(0.0, 100.0)
            .default_value(100u8)
            .desc("Brightness level in %"),
    );
    store.set_object_not_exists(
        &id(Attribute::BrightnessDuration),
        ObjectDescriptor::state("Brightness duration", ValueType::Number)
            .writable()
            .role("level.interval")
            .unit("sec")
            .range(0.0, 60.0)
            .default_value(0u8)
            .desc("Brightness transition duration in seconds"),
    );
    store.set_object_not_exists(
        &id(Attribute::Hue),
        ObjectDescriptor::state("Hue value", ValueType::Number)
            .writable()
            .role("level.color.hue")
            .unit("°")
            .range(0.0, 360.0)
            .default_value(100u16)
            .desc("Hue value"),
    );
    store.set_object_not_exists(
        &id(Attribute::Saturation),
        ObjectDescriptor::state("Saturation value", ValueType::Number)
            .writable()
            .role("level.color.saturation")
            .unit("%")
            .range(0.0, 100.0)
            .default_value(100u8)
            .desc("Saturation value"),
    );
    store.set_object_not_exists(
        &id(Attribute::ColorMode),
        ObjectDescriptor::state("Color Mode", ValueType::String)
            .role("value.color.mode")
            .desc("Color Mode"),
    );
    store.set_object_not_exists(
        &id(Attribute::ColorRgb),
        ObjectDescriptor::state("RGB Color", ValueType::String)
            .writable()
            .role("level.color.rgb")
            .desc("Color in RGB hex format (#000000 to #FFFFFF)"),
    );
    store.set_object_not_exists(
        &id(Attribute::ColorTemp),
        ObjectDescriptor::state("Color Temperature", ValueType::Number)
            .writable()
            .role("level.color.temperature")
            .unit("K")
            .range(1200.0, 6500.0)
            .default_value(4000u16)
            .desc("Color Temperature"),
    );
    store.set_object_not_exists(
        &id(Attribute::Effect),
        ObjectDescriptor::state("Current effect", ValueType::String)
            .writable()
            .role("text")
            .states(std::iter::empty::<(String, String)>())
            .desc("Current effect"),
    );
    store.set_object_not_exists(
        &id(Attribute::EffectsList),
        ObjectDescriptor::state("Effects list", ValueType::String)
            .role("text")
            .desc("List of available effects"),
    );
    store.set_object_not_exists(
        &id(Attribute::EffectWrite),
        ObjectDescriptor::state("Write effect", ValueType::String)
            .writable()
            .role("text")
            .desc("Writes a user defined effect to the device"),
    );
    store.set_object_not_exists(
        &id(Attribute::EffectWriteResponse),
        ObjectDescriptor::state("Response of write effect request", ValueType::String)
            .role("text")
            .desc("Response of the write request for user defined effect"),
    );

    let touch = format!("{}.touch", root);
    if profile.has_touch {
        tracing::debug!("Touch capability available, create 'touch' event channel");
        store.set_object_not_exists(&touch, ObjectDescriptor::channel(format!("{} Touch event", profile.name)));
        store.set_object_not_exists(
            &id(Attribute::TouchGesture),
            ObjectDescriptor::state("Gesture of touch event", ValueType::Number)
                .role("value")
                .states(GESTURES),
        );
        store.set_object_not_exists(
            &id(Attribute::TouchPanelId),
            ObjectDescriptor::state("Panel ID of touch event", ValueType::Number).role("value"),
        );
    } else if store.object_exists(&touch) {
        tracing::debug!("No touch capability, delete 'touch' event channel");
        store.del_object_recursive(&touch);
    }

    store.set_object_not_exists(
        &id(Attribute::Identify),
        ObjectDescriptor::state("Identify panels", ValueType::Boolean)
            .write_only()
            .role("button")
            .desc("Causes the panels to flash in unison"),
    );

    created
}

/// Delete the trees of every known model except `keep`, returning the number of objects removed
pub fn remove_other_models(store: &StateStore, keep: &DeviceProfile) -> usize {
    PROFILES
        .iter()
        .filter(|profile| profile.device_name != keep.device_name && store.object_exists(profile.device_name))
        .map(|profile| {
            tracing::debug!("Delete '{}' device...", profile.device_name);
            store.del_object_recursive(profile.device_name)
        })
        .sum()
}

/// Create the rhythm device, plus the module states when `connected`
pub fn provision_rhythm(store: &StateStore, connected: bool) {
    if !store.object_exists(RHYTHM_DEVICE) {
        tracing::debug!("Rhythm module information available. Creating Rhythm device...");
        store.set_object(RHYTHM_DEVICE, ObjectDescriptor::device("Light Panels Rhythm Module Device"));
    }
    store.set_object_not_exists(
        RHYTHM_INFO,
        ObjectDescriptor::channel("Light Panels Rhythm Module Device Information"),
    );
    store.set_object_not_exists(
        RHYTHM_CONNECTED,
        ObjectDescriptor::state("Rhythm module connected to nanoleaf light panels", ValueType::Boolean)
            .role("indicator.connected"),
    );

    if connected {
        create_rhythm_module_states(store);
    }
}

/// Delete the whole rhythm tree if present
pub fn remove_rhythm(store: &StateStore) {
    if store.object_exists(RHYTHM_DEVICE) {
        tracing::debug!("Rhythm module is not available. Delete Rhythm device...");
        store.del_object_recursive(RHYTHM_DEVICE);
    }
}

pub fn create_rhythm_module_states(store: &StateStore) {
    store.set_object_not_exists(
        RHYTHM_ACTIVE,
        ObjectDescriptor::state("Rhythm module active", ValueType::Boolean).role("indicator"),
    );
    store.set_object_not_exists(
        RHYTHM_AUX_AVAILABLE,
        ObjectDescriptor::state("AUX of rhythm module available", ValueType::Boolean).role("indicator"),
    );
    store.set_object_not_exists(
        RHYTHM_FIRMWARE_VERSION,
        ObjectDescriptor::state("Firmware Version of rhythm module", ValueType::String).role("info.version"),
    );
    store.set_object_not_exists(
        RHYTHM_HARDWARE_VERSION,
        ObjectDescriptor::state("Hardware Version of rhythm module", ValueType::String).role("info.version.hw"),
    );
    store.set_object_not_exists(
        RHYTHM_MODE,
        ObjectDescriptor::state("Mode of rhythm module", ValueType::Number)
            .writable()
            .role("state")
            .states([("0", "Microphone"), ("1", "Aux Cable")]),
    );
}

pub fn delete_rhythm_module_states(store: &StateStore) {
    tracing::debug!("Delete Rhythm module states...");
    for id in RHYTHM_MODULE_STATES {
        store.del_object(id);
    }
}
