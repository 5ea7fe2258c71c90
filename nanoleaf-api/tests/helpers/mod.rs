//! Canned controller responses

pub const TOKEN: &str = "Ob5C8QzXU7l2kA1fXz3uUgsnQYbiWL4t";

pub fn info_body(model: &str, firmware: &str) -> String {
    format!(
        r#"{{
            "name": "Canvas 4A2B",
            "serialNo": "S19124C1234",
            "manufacturer": "Nanoleaf",
            "firmwareVersion": "{}",
            "model": "{}",
            "state": {{
                "on": {{"value": true}},
                "brightness": {{"value": 80, "max": 100, "min": 0}},
                "hue": {{"value": 200, "max": 360, "min": 0}},
                "sat": {{"value": 40, "max": 100, "min": 0}},
                "ct": {{"value": 3000, "max": 6500, "min": 1200}},
                "colorMode": "hs"
            }},
            "effects": {{"select": "Flames", "effectsList": ["Flames", "Forest"]}}
        }}"#,
        firmware, model
    )
}
