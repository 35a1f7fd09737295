//! Instrument settings consumed by the control core.
//!
//! Stored as JSON. Every field has a default, so partial files are fine.

use crate::button::ButtonTiming;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// Highest root note accepted from settings.
pub const MAX_ROOT_NOTE: i32 = 96;
/// Widest note range the root CV may span.
pub const MAX_NOTE_RANGE: i32 = 72;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Start controls select a root note instead of a start position
    pub pitch_mode: bool,
    /// Channel pot changes switch channel immediately
    pub chan_pot_immediate: bool,
    /// Channel CV changes switch channel immediately
    pub chan_cv_immediate: bool,
    /// Start pot changes jump the play position immediately
    pub start_pot_immediate: bool,
    /// Start CV changes jump the play position immediately
    pub start_cv_immediate: bool,
    /// Divides the start-control range (written for a 10-bit ADC)
    pub start_cv_divider: i32,
    /// Lowest note of the root CV range
    pub low_note: i32,
    /// Semitones covered by the root CV
    pub note_range: i32,
    /// Root note the engine starts on, until the root controls report one
    pub root_note: i32,
    pub quantise_root_cv: bool,
    pub quantise_root_pot: bool,
    pub button: ButtonTiming,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            pitch_mode: false,
            chan_pot_immediate: true,
            chan_cv_immediate: true,
            start_pot_immediate: false,
            start_cv_immediate: false,
            start_cv_divider: 2,
            low_note: 36,
            note_range: 39,
            root_note: 36,
            quantise_root_cv: true,
            quantise_root_pot: true,
            button: ButtonTiming::default(),
        }
    }
}

impl Settings {
    /// Free-running "radio" behaviour: channels switch instantly, start
    /// position changes wait for a reset.
    pub fn radio() -> Self {
        Self {
            pitch_mode: false,
            chan_pot_immediate: true,
            chan_cv_immediate: true,
            start_pot_immediate: false,
            start_cv_immediate: false,
            start_cv_divider: 2,
            ..Self::default()
        }
    }

    /// One-shot drum behaviour: pitch mode with everything immediate.
    pub fn drum() -> Self {
        Self {
            pitch_mode: true,
            chan_pot_immediate: true,
            chan_cv_immediate: true,
            start_pot_immediate: true,
            start_cv_immediate: true,
            start_cv_divider: 1,
            ..Self::default()
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "radio" => Some(Self::radio()),
            "drum" => Some(Self::drum()),
            "default" => Some(Self::default()),
            _ => None,
        }
    }

    /// Load from a JSON file. Returns None if the file is absent or malformed.
    pub fn load(path: &Path) -> Option<Self> {
        let data = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str::<Settings>(&data) {
            Ok(s) => {
                info!("Loaded settings from {:?}", path);
                Some(s.sanitized())
            }
            Err(e) => {
                warn!("Failed to parse settings file {:?}: {}", path, e);
                None
            }
        }
    }

    pub fn save(&self, path: &Path) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        std::fs::write(path, json)?;
        info!("Settings saved to {:?}", path);
        Ok(())
    }

    /// Clamp values into the ranges the control core can handle.
    pub fn sanitized(mut self) -> Self {
        self.note_range = self.note_range.clamp(1, MAX_NOTE_RANGE);
        self.root_note = self.root_note.clamp(self.low_note, MAX_ROOT_NOTE.max(self.low_note));
        self.start_cv_divider = self.start_cv_divider.max(1);
        self.button = self.button.sanitized();
        self
    }
}
