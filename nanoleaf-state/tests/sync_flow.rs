use std::sync::{Arc, Mutex};

use nanoleaf_api::{DeviceInfo, SseDecoder};
use nanoleaf_state::{DeviceProfile, StateSynchronizer};
use state_store::{StateStore, StateValue};

const SHAPES_INFO: &str = r#"{
    "name": "Shapes 4C:7F",
    "serialNo": "S20361B0042",
    "manufacturer": "Nanoleaf",
    "firmwareVersion": "9.2.4",
    "model": "NL42",
    "state": {
        "on": {"value": false},
        "brightness": {"value": 40, "max": 100, "min": 0},
        "hue": {"value": 240, "max": 360, "min": 0},
        "sat": {"value": 100, "max": 100, "min": 0},
        "ct": {"value": 2700, "max": 6500, "min": 1200},
        "colorMode": "hs"
    },
    "effects": {"select": "*Solid*", "effectsList": ["Cocoa Beach", "Starlight"]}
}"#;

fn connected_shapes() -> (StateSynchronizer, DeviceInfo) {
    let info: DeviceInfo = serde_json::from_str(SHAPES_INFO).unwrap();
    let profile = DeviceProfile::resolve(&info.model);
    let sync = StateSynchronizer::new(StateStore::new(), profile);
    sync.provision(&info);
    sync.apply_snapshot(&info);
    (sync, info)
}

#[test]
fn test_snapshot_then_stream() {
    let (sync, _) = connected_shapes();
    let store = sync.store().clone();
    assert_eq!(store.get_state("Shapes.colorRGB").unwrap().val, StateValue::from("#000066"));

    let writes = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&writes);
    store.subscribe("Shapes.*", move |event| {
        seen.lock().unwrap().push(event.id.clone());
    });

    let mut decoder = SseDecoder::new();
    let messages = decoder.feed(
        b"id: 1\ndata: {\"events\":[{\"attr\":1,\"value\":true},{\"attr\":2,\"value\":100}]}\n\n\
          id: 4\ndata: {\"events\":[{\"panelId\":501,\"gesture\":4}]}\n\n",
    );
    for message in messages {
        sync.apply_delta(&message.into_payload().unwrap());
    }

    let writes = writes.lock().unwrap().clone();
    assert_eq!(
        writes,
        vec![
            "Shapes.state",
            "Shapes.brightness",
            "Shapes.colorRGB",
            "Shapes.touch.gesture",
            "Shapes.touch.panelID",
        ]
    );
    assert_eq!(store.get_state("Shapes.colorRGB").unwrap().val, StateValue::from("#0000ff"));
    assert!(store.get_states("Shapes.*").values().all(|state| state.ack));
}

#[test]
fn test_reconnect_to_other_model_replaces_tree() {
    let (sync, mut info) = connected_shapes();
    let store = sync.store().clone();

    info.model = "NL59".to_string();
    let lines = StateSynchronizer::new(store.clone(), DeviceProfile::resolve(&info.model));
    lines.provision(&info);
    let report = lines.apply_snapshot(&info);

    assert!(!store.object_exists("Shapes"));
    assert!(report.was_written("Lines.info.model"));
    assert!(!store.object_exists("Lines.touch"));
}
