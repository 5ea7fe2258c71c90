//! Known controller models

use std::cmp::Ordering;

use nanoleaf_api::EventDomain;

/// Static description of a controller model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceProfile {
    /// Model id reported by the controller (`NL29`)
    pub model: &'static str,
    /// Display name
    pub name: &'static str,
    /// Root of the model's state tree
    pub device_name: &'static str,
    /// SSDP service type the controller announces
    pub service_type: &'static str,
    /// Firmware versions above this one support the event stream
    pub sse_min_firmware: &'static str,
    pub has_touch: bool,
}

pub const LIGHT_PANELS: DeviceProfile = DeviceProfile {
    model: "NL22",
    name: "Light Panels",
    device_name: "LightPanels",
    service_type: "nanoleaf_aurora:light",
    sse_min_firmware: "3.1.0",
    has_touch: false,
};

pub const CANVAS: DeviceProfile = DeviceProfile {
    model: "NL29",
    name: "Canvas",
    device_name: "Canvas",
    service_type: "nanoleaf:nl29",
    sse_min_firmware: "1.1.0",
    has_touch: true,
};

pub const SHAPES: DeviceProfile = DeviceProfile {
    model: "NL42",
    name: "Shapes",
    device_name: "Shapes",
    service_type: "nanoleaf:nl42",
    sse_min_firmware: "4.0.2",
    has_touch: true,
};

pub const ELEMENTS: DeviceProfile = DeviceProfile {
    model: "NL52",
    name: "Elements",
    device_name: "Elements",
    service_type: "nanoleaf:nl52",
    sse_min_firmware: "1.0.0",
    has_touch: true,
};

pub const LINES: DeviceProfile = DeviceProfile {
    model: "NL59",
    name: "Lines",
    device_name: "Lines",
    service_type: "nanoleaf:nl59",
    sse_min_firmware: "1.0.0",
    has_touch: false,
};

pub const SKYLIGHT: DeviceProfile = DeviceProfile {
    model: "NL64",
    name: "Skylight",
    device_name: "Skylight",
    service_type: "nanoleaf:nl64",
    sse_min_firmware: "1.0.0",
    has_touch: false,
};

pub const PROFILES: [DeviceProfile; 6] = [LIGHT_PANELS, CANVAS, SHAPES, ELEMENTS, LINES, SKYLIGHT];

/// Profile used for models missing from the table
pub const FALLBACK: DeviceProfile = CANVAS;

impl DeviceProfile {
    pub fn by_model(model: &str) -> Option<&'static DeviceProfile> {
        PROFILES.iter().find(|profile| profile.model == model)
    }

    /// Look up a model, falling back to Canvas with a warning
    pub fn resolve(model: &str) -> DeviceProfile {
        match Self::by_model(model) {
            Some(profile) => *profile,
            None => {
                tracing::warn!(
                    "Nanoleaf device '{}' unknown! Using {} device as fallback. Please report this to the developer!",
                    model,
                    FALLBACK.name
                );
                FALLBACK
            }
        }
    }

    /// Whether `firmware` is newer than the minimum for the event stream
    pub fn supports_event_stream(&self, firmware: &str) -> bool {
        compare_firmware(firmware, self.sse_min_firmware) == Ordering::Greater
    }

    /// Event domains worth subscribing to for this model
    pub fn event_domains(&self) -> Vec<EventDomain> {
        let mut domains = vec![EventDomain::State, EventDomain::Effects];
        if self.has_touch {
            domains.push(EventDomain::Touch);
        }
        domains
    }
}

/// Service types of every known model, used to filter search replies
pub fn service_types() -> Vec<&'static str> {
    PROFILES.iter().map(|profile| profile.service_type).collect()
}

/// Compare dotted firmware versions component by component
///
/// Leading digits of each component compare numerically, any suffix as
/// text. Missing components count as `0`.
pub fn compare_firmware(a: &str, b: &str) -> Ordering {
    let mut left = a.trim().split('.');
    let mut right = b.trim().split('.');

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (l, r) => {
                let ordering = compare_component(l.unwrap_or("0"), r.unwrap_or("0"));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
        }
    }
}

fn compare_component(a: &str, b: &str) -> Ordering {
    let split = |s: &str| {
        let digits = s.bytes().take_while(u8::is_ascii_digit).count();
        let number = s[..digits].parse::<u64>().unwrap_or(0);
        (number, s[digits..].to_string())
    };
    split(a).cmp(&split(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("NL22", "LightPanels", false)]
    #[case("NL29", "Canvas", true)]
    #[case("NL42", "Shapes", true)]
    #[case("NL52", "Elements", true)]
    #[case("NL59", "Lines", false)]
    #[case("NL64", "Skylight", false)]
    fn test_profile_table(#[case] model: &str, #[case] device_name: &str, #[case] touch: bool) {
        let profile = DeviceProfile::by_model(model).unwrap();
        assert_eq!(profile.device_name, device_name);
        assert_eq!(profile.has_touch, touch);
    }

    #[test]
    fn test_unknown_model_falls_back_to_canvas() {
        assert!(DeviceProfile::by_model("NL99").is_none());
        assert_eq!(DeviceProfile::resolve("NL99"), CANVAS);
    }

    #[rstest]
    #[case("3.1.0", "3.1.0", Ordering::Equal)]
    #[case("10.0.0", "9.9.9", Ordering::Greater)]
    #[case("3.1", "3.1.0", Ordering::Equal)]
    #[case("3.1.1", "3.1", Ordering::Greater)]
    #[case("4.0.2", "4.0.10", Ordering::Less)]
    #[case("1.1.0-beta", "1.1.0", Ordering::Greater)]
    fn test_compare_firmware(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
        assert_eq!(compare_firmware(a, b), expected);
    }

    #[test]
    fn test_supports_event_stream() {
        assert!(LIGHT_PANELS.supports_event_stream("3.3.2"));
        assert!(!LIGHT_PANELS.supports_event_stream("3.1.0"));
        assert!(!SHAPES.supports_event_stream("4.0.1"));
        assert!(SHAPES.supports_event_stream("10.1.0"));
    }

    #[test]
    fn test_firmware_compared_numerically() {
        // Text comparison would put "10.0.0" before "3.1.0"
        assert!("10.0.0" < "3.1.0");
        assert_eq!(compare_firmware("10.0.0", "3.1.0"), Ordering::Greater);
        assert!(LIGHT_PANELS.supports_event_stream("10.0.0"));
        assert!(!LIGHT_PANELS.supports_event_stream("3.1.0"));
    }

    #[test]
    fn test_event_domains() {
        assert_eq!(LINES.event_domains(), vec![EventDomain::State, EventDomain::Effects]);
        assert!(CANVAS.event_domains().contains(&EventDomain::Touch));
    }

    #[test]
    fn test_service_types() {
        let types = service_types();
        assert_eq!(types.len(), 6);
        assert!(types.contains(&"nanoleaf_aurora:light"));
    }

    proptest! {
        #[test]
        fn prop_compare_firmware_is_antisymmetric(
            a in proptest::collection::vec(0u16..40, 1..4),
            b in proptest::collection::vec(0u16..40, 1..4),
        ) {
            let join = |parts: &[u16]| parts.iter().map(u16::to_string).collect::<Vec<_>>().join(".");
            let (a, b) = (join(&a), join(&b));
            prop_assert_eq!(compare_firmware(&a, &b), compare_firmware(&b, &a).reverse());
            prop_assert_eq!(compare_firmware(&a, &a), Ordering::Equal);
        }
    }
}
