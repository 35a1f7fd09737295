//! Per-tick event mask returned by `ControlInterface::poll`.
//!
//! Bit positions match the firmware's change bitmap so logged masks stay
//! comparable with hardware captures.

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Events raised during one control tick. Combine with `|`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
    pub struct ControlEvents: u16 {
        /// Start-time pot moved (radio mode)
        const TIME_POT_CHANGED = 1 << 0;
        /// Start-time CV moved (radio mode)
        const TIME_CV_CHANGED = 1 << 1;
        /// A different channel was selected
        const CHANNEL_CHANGED = 1 << 2;
        /// Start position should be applied immediately
        const CHANGE_START_NOW = 1 << 3;
        const BUTTON_SHORT_PRESS = 1 << 4;
        /// Button held past the long-press threshold (raised every tick)
        const BUTTON_LONG_PRESS = 1 << 5;
        const BUTTON_LONG_RELEASE = 1 << 6;
        /// Repeating pulse while the button stays held
        const BUTTON_PULSE = 1 << 7;
        /// Reset CV edge or short button press
        const RESET_TRIGGERED = 1 << 8;
        const ROOT_CV_CHANGED = 1 << 9;
        const ROOT_POT_CHANGED = 1 << 10;
        /// Integer root note changed (pitch mode)
        const ROOT_NOTE_CHANGED = 1 << 11;
    }
}

impl ControlEvents {
    /// Bits produced by the button gesture detector.
    pub const BUTTON: Self = Self::BUTTON_SHORT_PRESS
        .union(Self::BUTTON_LONG_PRESS)
        .union(Self::BUTTON_LONG_RELEASE)
        .union(Self::BUTTON_PULSE);

    /// Bits produced by the start-time controls.
    pub const START: Self = Self::TIME_POT_CHANGED
        .union(Self::TIME_CV_CHANGED)
        .union(Self::CHANGE_START_NOW);

    /// Bits produced by the root-note controls.
    pub const ROOT: Self = Self::ROOT_CV_CHANGED
        .union(Self::ROOT_POT_CHANGED)
        .union(Self::ROOT_NOTE_CHANGED);
}

impl fmt::Display for ControlEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }
        let names: Vec<&str> = self.iter_names().map(|(name, _)| name).collect();
        write!(f, "{}", names.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_positions_match_firmware() {
        assert_eq!(ControlEvents::TIME_POT_CHANGED.bits(), 0x001);
        assert_eq!(ControlEvents::TIME_CV_CHANGED.bits(), 0x002);
        assert_eq!(ControlEvents::CHANGE_START_NOW.bits(), 0x008);
        assert_eq!(ControlEvents::BUTTON_SHORT_PRESS.bits(), 0x010);
        assert_eq!(ControlEvents::BUTTON_PULSE.bits(), 0x080);
        assert_eq!(ControlEvents::ROOT_CV_CHANGED.bits(), 0x200);
        assert_eq!(ControlEvents::ROOT_NOTE_CHANGED.bits(), 0x800);
    }

    #[test]
    fn test_groups_do_not_overlap() {
        assert!(!ControlEvents::BUTTON.intersects(ControlEvents::START));
        assert!(!ControlEvents::BUTTON.intersects(ControlEvents::ROOT));
        assert!(!ControlEvents::START.intersects(ControlEvents::ROOT));
    }

    #[test]
    fn test_display() {
        assert_eq!(ControlEvents::empty().to_string(), "-");
        let ev = ControlEvents::CHANNEL_CHANGED | ControlEvents::RESET_TRIGGERED;
        assert_eq!(ev.to_string(), "CHANNEL_CHANGED RESET_TRIGGERED");
    }

    #[test]
    fn test_serde_roundtrip() {
        let ev = ControlEvents::BUTTON_LONG_PRESS | ControlEvents::BUTTON_PULSE;
        let json = serde_json::to_string(&ev).unwrap();
        let back: ControlEvents = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ev);
    }
}
