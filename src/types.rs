use crate::events::ControlEvents;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Instant;

// ─── ADC resolution ─────────────────────────────────────────────────────────

/// Onboard ADC resolution. The Teensy 4.0 ADC supports 8, 10 and 12 bits;
/// 10 bits is its usable accuracy.
pub const ADC_BITS: u32 = 10;

/// Number of ADC codes (1024 for a 10-bit converter).
pub const ADC_MAX_VALUE: i32 = 1 << ADC_BITS;

// ─── Raw input from the panel ───────────────────────────────────────────────

/// One control-loop sample of the panel hardware, as delivered by the serial
/// link or the simulator. The button level is raw (not yet debounced).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawFrame {
    /// Microseconds since session start
    pub timestamp_us: u64,
    /// Channel-select CV jack
    pub channel_cv: u16,
    /// Channel-select pot
    pub channel_pot: u16,
    /// Start-time (or root-note) CV jack
    pub start_cv: u16,
    /// Start-time (or root-note) pot
    pub start_pot: u16,
    /// Raw reset button level, true = pressed
    pub button_raw: bool,
}

impl RawFrame {
    /// All controls at zero, button released.
    pub fn at_rest(timestamp_us: u64) -> Self {
        Self {
            timestamp_us,
            channel_cv: 0,
            channel_pot: 0,
            start_cv: 0,
            start_pot: 0,
            button_raw: false,
        }
    }
}

impl fmt::Display for RawFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>10}µs  CH[cv={:>4} pot={:>4}]  ST[cv={:>4} pot={:>4}]  BTN={}",
            self.timestamp_us,
            self.channel_cv,
            self.channel_pot,
            self.start_cv,
            self.start_pot,
            if self.button_raw { "down" } else { "up" },
        )
    }
}

/// What `ControlInterface::poll` consumes each tick: the four ADC readings
/// plus the debounced button state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RawInputs {
    pub timestamp_us: u64,
    pub channel_cv: i32,
    pub channel_pot: i32,
    pub start_cv: i32,
    pub start_pot: i32,
    /// Debounced button state, true = pressed
    pub button: bool,
}

impl RawInputs {
    pub fn from_frame(frame: &RawFrame, button: bool) -> Self {
        Self {
            timestamp_us: frame.timestamp_us,
            channel_cv: frame.channel_cv as i32,
            channel_pot: frame.channel_pot as i32,
            start_cv: frame.start_cv as i32,
            start_pot: frame.start_pot as i32,
            button,
        }
    }
}

// ─── Playback hand-off ──────────────────────────────────────────────────────

/// The hand-off point between the control core and the playback engine.
///
/// The engine owns this struct. The control core writes `next_channel`,
/// `start`, `root_note` and the two commit flags; it reads `current_channel`
/// only to suppress selections that would not change anything. The engine
/// clears the commit flags once it has applied them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlayState {
    /// Channel the engine is playing right now. Written by the engine only.
    pub current_channel: u16,
    /// Channel the engine should switch to on the next commit or reset.
    pub next_channel: u16,
    /// Switch to `next_channel` immediately.
    pub channel_changed: bool,
    /// Start position in ADC units (radio mode).
    pub start: f32,
    /// Apply `start` immediately.
    pub start_changed: bool,
    /// Combined root note (pitch mode).
    pub root_note: f32,
}

impl Default for PlayState {
    fn default() -> Self {
        Self {
            current_channel: 0,
            next_channel: 0,
            channel_changed: false,
            start: 0.0,
            start_changed: false,
            root_note: 0.0,
        }
    }
}

impl PlayState {
    /// Engine side: adopt the pending channel and clear the channel commit.
    pub fn commit_channel(&mut self) {
        self.current_channel = self.next_channel;
        self.channel_changed = false;
    }
}

// ─── Output to consumers ────────────────────────────────────────────────────

/// Snapshot produced once per control tick by the coordinator and fanned
/// out to the display, logger and OSC sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlFrame {
    pub timestamp_us: u64,
    /// Events raised by this tick
    pub events: ControlEvents,
    /// Channel the (stand-in) engine is playing after this tick
    pub channel: u16,
    /// Pending channel selection
    pub next_channel: u16,
    pub start: f32,
    pub root_note: f32,
    /// Raw ADC readings: channel CV, channel pot, start CV, start pot
    pub raw: [u16; 4],
    /// Debounced button state
    pub button: bool,
}

impl fmt::Display for ControlFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "t={:>10}µs  ch={} next={} start={:>7.1} root={:>5.1}  [{}]",
            self.timestamp_us,
            self.channel,
            self.next_channel,
            self.start,
            self.root_note,
            self.events,
        )
    }
}

// ─── Session clock ──────────────────────────────────────────────────────────

/// Monotonic clock for the control session.
#[derive(Clone)]
pub struct SessionClock {
    start: Instant,
}

impl SessionClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Constants ──────────────────────────────────────────────────────────────

/// Names of the four ADC inputs, in `RawFrame` / `ControlFrame::raw` order.
pub const INPUT_NAMES: [&str; 4] = ["chan-cv", "chan-pot", "start-cv", "start-pot"];

/// Number of channel LEDs on the top row of the panel.
pub const CHANNEL_LEDS: usize = 4;
