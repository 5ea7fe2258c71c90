//! Closed set of attributes the adapter tracks under a device tree

use std::fmt;

/// Root of the optional rhythm module tree
pub const RHYTHM_DEVICE: &str = "Rhythm";

/// A tracked attribute, addressed relative to its tree root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    State,
    Brightness,
    BrightnessDuration,
    Hue,
    Saturation,
    ColorTemp,
    ColorRgb,
    ColorMode,
    Effect,
    EffectsList,
    EffectWrite,
    EffectWriteResponse,
    Identify,
    TouchGesture,
    TouchPanelId,
    InfoName,
    InfoSerialNo,
    InfoFirmwareVersion,
    InfoModel,
    /// Lives under [`RHYTHM_DEVICE`] rather than the device tree
    RhythmMode,
}

impl Attribute {
    pub const ALL: [Attribute; 20] = [
        Attribute::State,
        Attribute::Brightness,
        Attribute::BrightnessDuration,
        Attribute::Hue,
        Attribute::Saturation,
        Attribute::ColorTemp,
        Attribute::ColorRgb,
        Attribute::ColorMode,
        Attribute::Effect,
        Attribute::EffectsList,
        Attribute::EffectWrite,
        Attribute::EffectWriteResponse,
        Attribute::Identify,
        Attribute::TouchGesture,
        Attribute::TouchPanelId,
        Attribute::InfoName,
        Attribute::InfoSerialNo,
        Attribute::InfoFirmwareVersion,
        Attribute::InfoModel,
        Attribute::RhythmMode,
    ];

    /// Path below the tree root
    pub fn path(self) -> &'static str {
        match self {
            Attribute::State => "state",
            Attribute::Brightness => "brightness",
            Attribute::BrightnessDuration => "brightness_duration",
            Attribute::Hue => "hue",
            Attribute::Saturation => "saturation",
            Attribute::ColorTemp => "colorTemp",
            Attribute::ColorRgb => "colorRGB",
            Attribute::ColorMode => "colorMode",
            Attribute::Effect => "effect",
            Attribute::EffectsList => "effectsList",
            Attribute::EffectWrite => "effectWrite",
            Attribute::EffectWriteResponse => "effectWriteResponse",
            Attribute::Identify => "identify",
            Attribute::TouchGesture => "touch.gesture",
            Attribute::TouchPanelId => "touch.panelID",
            Attribute::InfoName => "info.name",
            Attribute::InfoSerialNo => "info.serialNo",
            Attribute::InfoFirmwareVersion => "info.firmwareVersion",
            Attribute::InfoModel => "info.model",
            Attribute::RhythmMode => "rhythmMode",
        }
    }

    /// Full state id for a device tree
    pub fn state_id(self, device_name: &str) -> String {
        let root = if self == Attribute::RhythmMode {
            RHYTHM_DEVICE
        } else {
            device_name
        };
        format!("{}.{}", root, self.path())
    }

    /// Attribute for a command's state name (the last id component)
    ///
    /// Only attributes a user can write resolve; everything else is `None`.
    pub fn from_state_name(name: &str) -> Option<Self> {
        let attribute = match name {
            "state" => Attribute::State,
            "brightness" => Attribute::Brightness,
            "brightness_duration" => Attribute::BrightnessDuration,
            "hue" => Attribute::Hue,
            "saturation" => Attribute::Saturation,
            "colorTemp" => Attribute::ColorTemp,
            "colorRGB" => Attribute::ColorRgb,
            "effect" => Attribute::Effect,
            "effectWrite" => Attribute::EffectWrite,
            "identify" => Attribute::Identify,
            "rhythmMode" => Attribute::RhythmMode,
            _ => return None,
        };
        Some(attribute)
    }

    /// Helper attributes that are read by other commands but never sent alone
    pub fn is_ignorable(self) -> bool {
        self == Attribute::BrightnessDuration
    }

    /// Written unconditionally because every event is meaningful
    pub fn is_forced(self) -> bool {
        matches!(self, Attribute::TouchGesture | Attribute::TouchPanelId)
    }

    /// Inputs of the derived RGB colour
    pub fn affects_rgb(self) -> bool {
        matches!(self, Attribute::Brightness | Attribute::Hue | Attribute::Saturation)
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_state_ids() {
        assert_eq!(Attribute::ColorRgb.state_id("Canvas"), "Canvas.colorRGB");
        assert_eq!(Attribute::TouchPanelId.state_id("Shapes"), "Shapes.touch.panelID");
        assert_eq!(Attribute::RhythmMode.state_id("LightPanels"), "Rhythm.rhythmMode");
    }

    #[rstest]
    #[case("state", Some(Attribute::State))]
    #[case("colorRGB", Some(Attribute::ColorRgb))]
    #[case("brightness_duration", Some(Attribute::BrightnessDuration))]
    #[case("rhythmMode", Some(Attribute::RhythmMode))]
    #[case("colorMode", None)]
    #[case("effectWriteResponse", None)]
    #[case("bogus", None)]
    fn test_from_state_name(#[case] name: &str, #[case] expected: Option<Attribute>) {
        assert_eq!(Attribute::from_state_name(name), expected);
    }

    #[test]
    fn test_paths_are_unique() {
        let mut paths: Vec<_> = Attribute::ALL.iter().map(|a| a.path()).collect();
        paths.sort_unstable();
        paths.dedup();
        assert_eq!(paths.len(), Attribute::ALL.len());
    }

    #[test]
    fn test_flags() {
        assert!(Attribute::BrightnessDuration.is_ignorable());
        assert!(!Attribute::Brightness.is_ignorable());
        assert!(Attribute::TouchGesture.is_forced());
        assert!(Attribute::Hue.affects_rgb());
        assert!(!Attribute::ColorTemp.affects_rgb());
    }
}
