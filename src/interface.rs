use crate::analog_input::{AnalogChannel, DEFAULT_SMOOTH_STEPS};
use crate::button::ButtonGesture;
use crate::events::ControlEvents;
use crate::settings::Settings;
use crate::types::*;
use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Hysteresis for the root-note inputs. Wide, so CV sources sitting on a
/// semitone boundary do not flicker between notes.
pub const PITCH_HYSTERESIS: u16 = 64;
/// Hysteresis for the start-position inputs.
pub const START_HYSTERESIS: u16 = 32;
/// Semitones covered by the root-note pot.
pub const ROOT_POT_RANGE: f32 = 48.0;

// ─── Reset latch ────────────────────────────────────────────────────────────

/// Edge latch for the reset CV input.
///
/// The latch itself is owned by the control thread, which calls `take` once
/// per tick. Edge sources (interrupt handler, serial reader, simulator) only
/// get a `ResetTrigger`. Any number of edges between two ticks collapse into
/// one trigger, and an edge that lands after the take is reported on the
/// following tick.
#[derive(Debug, Default)]
pub struct ResetLatch {
    flag: Arc<AtomicBool>,
}

impl ResetLatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle that can set, but never clear, this latch.
    pub fn trigger_handle(&self) -> ResetTrigger {
        ResetTrigger {
            flag: Arc::clone(&self.flag),
        }
    }

    /// Read and clear the latch.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }
}

/// Set-only side of a `ResetLatch`, handed to edge sources.
#[derive(Debug, Clone)]
pub struct ResetTrigger {
    flag: Arc<AtomicBool>,
}

impl ResetTrigger {
    /// Record a rising edge. Safe to call from any thread.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// An edge is waiting for the next control tick.
    pub fn is_pending(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

// ─── Root note ──────────────────────────────────────────────────────────────

/// Combines the root CV and root pot into a root note.
///
/// A quantised source only counts as changed when its floored value moves;
/// an unquantised one counts every change its channel reports. The combined
/// note is `cv + pot` and is reported when its integer part changes.
#[derive(Debug, Clone)]
pub struct RootNoteTracker {
    quantise_cv: bool,
    quantise_pot: bool,
    root_cv: f32,
    root_pot: f32,
    last_cv_floor: Option<f32>,
    last_pot_floor: Option<f32>,
    last_note_floor: Option<f32>,
}

impl RootNoteTracker {
    pub fn new(quantise_cv: bool, quantise_pot: bool) -> Self {
        Self {
            quantise_cv,
            quantise_pot,
            root_cv: 0.0,
            root_pot: 0.0,
            last_cv_floor: None,
            last_pot_floor: None,
            last_note_floor: None,
        }
    }

    /// Feed the outputs of the sources that changed this tick (`None` for
    /// sources that did not).
    pub fn update(&mut self, cv: Option<f32>, pot: Option<f32>) -> ControlEvents {
        let mut events = ControlEvents::empty();
        if cv.is_none() && pot.is_none() {
            return events;
        }

        if let Some(value) = cv {
            if self.quantise_cv {
                let floored = value.floor();
                self.root_cv = floored;
                if self.last_cv_floor != Some(floored) {
                    self.last_cv_floor = Some(floored);
                    events |= ControlEvents::ROOT_CV_CHANGED;
                }
            } else {
                self.root_cv = value;
                events |= ControlEvents::ROOT_CV_CHANGED;
            }
        }

        if let Some(value) = pot {
            if self.quantise_pot {
                let floored = value.floor();
                self.root_pot = floored;
                if self.last_pot_floor != Some(floored) {
                    self.last_pot_floor = Some(floored);
                    events |= ControlEvents::ROOT_POT_CHANGED;
                }
            } else {
                self.root_pot = value;
                events |= ControlEvents::ROOT_POT_CHANGED;
            }
        }

        let note_floor = self.root_note().floor();
        if self.last_note_floor != Some(note_floor) {
            self.last_note_floor = Some(note_floor);
            events |= ControlEvents::ROOT_NOTE_CHANGED;
        }

        events
    }

    pub fn root_note(&self) -> f32 {
        self.root_cv + self.root_pot
    }

    pub fn root_from_cv(&self) -> f32 {
        self.root_cv
    }

    pub fn root_from_pot(&self) -> f32 {
        self.root_pot
    }
}

// ─── Control interface ──────────────────────────────────────────────────────

/// The panel: channel and start/root controls, the reset button and the
/// reset CV latch.
///
/// `poll` is the single per-tick entry point. It runs at the control-loop
/// rate, never blocks, and reports everything that happened as one
/// `ControlEvents` mask while writing selections into the engine's
/// `PlayState`.
///
/// # Modes
///
/// In **pitch mode** the start controls pick a root note: the CV spans
/// `note_range` semitones above `low_note`, the pot adds up to 48 semitones.
///
/// Otherwise (**radio mode**) they pick a start position. Both sources are
/// smoothed and map onto `ADC_MAX_VALUE / divider`; the start position is
/// their sum scaled back up by the divider and clamped to the ADC range.
pub struct ControlInterface {
    channel_count: u16,
    pitch_mode: bool,
    start_divider: f32,
    channel_cv: AnalogChannel,
    channel_pot: AnalogChannel,
    start_cv: AnalogChannel,
    start_pot: AnalogChannel,
    chan_cv_immediate: bool,
    chan_pot_immediate: bool,
    start_cv_immediate: bool,
    start_pot_immediate: bool,
    button: ButtonGesture,
    reset: ResetLatch,
    root: RootNoteTracker,
    start: f32,
}

impl ControlInterface {
    pub fn new(channel_count: u16, settings: &Settings) -> Self {
        let settings = settings.clone().sanitized();

        // Divider values were written for a 10-bit ADC
        let divider = (settings.start_cv_divider * (ADC_MAX_VALUE / 1024)).max(1);
        let start_divider = divider as f32;

        let mut start_cv = AnalogChannel::new("start-cv");
        let mut start_pot = AnalogChannel::new("start-pot");

        if settings.pitch_mode {
            let low_note = settings.low_note as f32 + 0.5;
            start_cv.configure_range(
                low_note,
                low_note + settings.note_range as f32,
                settings.quantise_root_cv,
            );
            start_pot.configure_range(0.0, ROOT_POT_RANGE, settings.quantise_root_pot);
            start_cv.set_hysteresis(PITCH_HYSTERESIS);
            start_pot.set_hysteresis(PITCH_HYSTERESIS);
        } else {
            // Integer division, as on the firmware
            let high = (ADC_MAX_VALUE / divider) as f32;
            debug!("start range 0..{}", high);
            start_cv.configure_range(0.0, high, false);
            start_pot.configure_range(0.0, high, false);
            start_cv.configure_smoothing(true, DEFAULT_SMOOTH_STEPS);
            start_pot.configure_smoothing(true, DEFAULT_SMOOTH_STEPS);
            start_cv.set_hysteresis(START_HYSTERESIS);
            start_pot.set_hysteresis(START_HYSTERESIS);
        }

        let mut interface = Self {
            channel_count: 1,
            pitch_mode: settings.pitch_mode,
            start_divider,
            channel_cv: AnalogChannel::new("chan-cv"),
            channel_pot: AnalogChannel::new("chan-pot"),
            start_cv,
            start_pot,
            chan_cv_immediate: settings.chan_cv_immediate,
            chan_pot_immediate: settings.chan_pot_immediate,
            start_cv_immediate: settings.start_cv_immediate,
            start_pot_immediate: settings.start_pot_immediate,
            button: ButtonGesture::new(settings.button),
            reset: ResetLatch::new(),
            root: RootNoteTracker::new(settings.quantise_root_cv, settings.quantise_root_pot),
            start: 0.0,
        };
        interface.set_channel_count(channel_count);

        info!(
            "Control interface: {} channels, {} mode",
            interface.channel_count,
            if interface.pitch_mode { "pitch" } else { "radio" }
        );
        interface
    }

    /// Re-range the channel controls to `0..count`. A count of zero is
    /// treated as one.
    pub fn set_channel_count(&mut self, count: u16) {
        self.channel_count = count.max(1);
        let high = (self.channel_count - 1) as f32;
        self.channel_cv.configure_range(0.0, high, true);
        self.channel_pot.configure_range(0.0, high, true);
        debug!("channel count {}", self.channel_count);
    }

    /// Handle for the reset CV edge source.
    pub fn reset_trigger(&self) -> ResetTrigger {
        self.reset.trigger_handle()
    }

    /// Run one control tick.
    pub fn poll(&mut self, inputs: &RawInputs, play_state: &mut PlayState) -> ControlEvents {
        let mut events = self.update_channel_controls(inputs, play_state);

        events |= if self.pitch_mode {
            self.update_root_controls(inputs, play_state)
        } else {
            self.update_start_controls(inputs, play_state)
        };

        events |= self.button.poll(inputs.button, inputs.timestamp_us);

        // Taken after channel and button processing, every tick
        let reset_edge = self.reset.take();
        if reset_edge || events.contains(ControlEvents::BUTTON_SHORT_PRESS) {
            events |= ControlEvents::RESET_TRIGGERED;
        }

        events
    }

    fn update_channel_controls(
        &mut self,
        inputs: &RawInputs,
        play_state: &mut PlayState,
    ) -> ControlEvents {
        let cv_changed = self.channel_cv.poll(inputs.channel_cv);
        let pot_changed = self.channel_pot.poll(inputs.channel_pot);

        if !cv_changed && !pot_changed {
            return ControlEvents::empty();
        }

        let sum = self.channel_cv.current_output() + self.channel_pot.current_output();
        let selected = sum.round().clamp(0.0, (self.channel_count - 1) as f32) as u16;

        if selected == play_state.current_channel {
            debug!(
                "channel inputs moved but selection unchanged: {} (cv={} pot={})",
                selected,
                self.channel_cv.current_output(),
                self.channel_pot.current_output()
            );
            return ControlEvents::empty();
        }

        debug!("channel {}", selected);
        play_state.next_channel = selected;
        if (self.chan_pot_immediate && pot_changed) || (self.chan_cv_immediate && cv_changed) {
            play_state.channel_changed = true;
        }
        ControlEvents::CHANNEL_CHANGED
    }

    fn update_start_controls(
        &mut self,
        inputs: &RawInputs,
        play_state: &mut PlayState,
    ) -> ControlEvents {
        let mut events = ControlEvents::empty();

        let cv_changed = self.start_cv.poll(inputs.start_cv);
        let pot_changed = self.start_pot.poll(inputs.start_pot);

        if pot_changed {
            events |= ControlEvents::TIME_POT_CHANGED;
            if self.start_pot_immediate {
                events |= ControlEvents::CHANGE_START_NOW;
            }
        }
        if cv_changed {
            events |= ControlEvents::TIME_CV_CHANGED;
            if self.start_cv_immediate {
                events |= ControlEvents::CHANGE_START_NOW;
            }
        }

        // Both sources are scaled back up by the divider before clamping,
        // which can exceed the ADC range when both are high.
        let sum = self.start_cv.current_output() * self.start_divider
            + self.start_pot.current_output() * self.start_divider;
        self.start = sum.clamp(0.0, ADC_MAX_VALUE as f32);
        play_state.start = self.start;

        if events.contains(ControlEvents::CHANGE_START_NOW) {
            play_state.start_changed = true;
        }
        if !events.is_empty() {
            debug!("start {:.1} [{}]", self.start, events);
        }
        events
    }

    fn update_root_controls(
        &mut self,
        inputs: &RawInputs,
        play_state: &mut PlayState,
    ) -> ControlEvents {
        let cv_changed = self.start_cv.poll(inputs.start_cv);
        let pot_changed = self.start_pot.poll(inputs.start_pot);

        let cv = cv_changed.then_some(self.start_cv.current_output());
        let pot = pot_changed.then_some(self.start_pot.current_output());
        let events = self.root.update(cv, pot);
        play_state.root_note = self.root.root_note();

        if events.contains(ControlEvents::ROOT_NOTE_CHANGED) {
            debug!(
                "root note {} (cv={} pot={})",
                self.root.root_note(),
                self.root.root_from_cv(),
                self.root.root_from_pot()
            );
        }
        events
    }

    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    pub fn pitch_mode(&self) -> bool {
        self.pitch_mode
    }

    /// Start position from the last tick (radio mode).
    pub fn start(&self) -> f32 {
        self.start
    }

    /// Combined root note (pitch mode).
    pub fn root_note(&self) -> f32 {
        self.root.root_note()
    }
}
