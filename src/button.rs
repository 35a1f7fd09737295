//! Reset button: debouncing and press-gesture classification.

use crate::events::ControlEvents;
use log::debug;
use serde::{Deserialize, Serialize};

/// Debounce interval for the mechanical button (milliseconds).
pub const DEBOUNCE_MS: u64 = 5;

/// Longest accepted gesture threshold (milliseconds).
pub const MAX_TIMING_MS: u64 = 60_000;

/// Gesture thresholds, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonTiming {
    /// Shortest hold that counts as a press at all
    pub short_press_ms: u64,
    /// Hold length where a press becomes a long press
    pub long_press_ms: u64,
    /// Repeat interval of pulses while a long press is held
    pub pulse_delay_ms: u64,
}

impl Default for ButtonTiming {
    fn default() -> Self {
        Self {
            short_press_ms: 10,
            long_press_ms: 600,
            pulse_delay_ms: 600,
        }
    }
}

impl ButtonTiming {
    /// Clamp thresholds to `1..=MAX_TIMING_MS` with `short < long`, so a
    /// short press stays reachable.
    pub fn sanitized(self) -> Self {
        let long_press_ms = self.long_press_ms.clamp(2, MAX_TIMING_MS);
        Self {
            short_press_ms: self.short_press_ms.clamp(1, long_press_ms - 1),
            long_press_ms,
            pulse_delay_ms: self.pulse_delay_ms.clamp(1, MAX_TIMING_MS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GestureState {
    Idle,
    /// Held, not yet past the long-press threshold
    Pressed,
    /// Held past the long-press threshold, pulsing
    LongHeld,
}

/// Classifies press/release timing of a debounced button.
///
/// | Hold length              | On release            | While held          |
/// |--------------------------|-----------------------|---------------------|
/// | `< short`                | nothing               | nothing             |
/// | `short ..< long`         | `BUTTON_SHORT_PRESS`  | nothing             |
/// | `> long`                 | `BUTTON_LONG_RELEASE` | `BUTTON_LONG_PRESS` every poll, `BUTTON_PULSE` every `pulse_delay` |
///
/// After each pulse the timer is pulled back to the long-press boundary, so
/// pulses repeat at a fixed cadence for as long as the button stays down.
#[derive(Debug, Clone)]
pub struct ButtonGesture {
    short_us: u64,
    long_us: u64,
    pulse_us: u64,
    pressed: bool,
    press_start_us: u64,
}

impl ButtonGesture {
    pub fn new(timing: ButtonTiming) -> Self {
        Self {
            short_us: timing.short_press_ms.saturating_mul(1000),
            long_us: timing.long_press_ms.saturating_mul(1000),
            pulse_us: timing.pulse_delay_ms.max(1).saturating_mul(1000),
            pressed: false,
            press_start_us: 0,
        }
    }

    /// Feed the debounced button state at time `now_us`. Returns the button
    /// bits raised this poll.
    pub fn poll(&mut self, is_pressed: bool, now_us: u64) -> ControlEvents {
        let mut events = ControlEvents::empty();

        if is_pressed && !self.pressed {
            self.pressed = true;
            self.press_start_us = now_us;
        } else if !is_pressed && self.pressed {
            self.pressed = false;
            let held = now_us.saturating_sub(self.press_start_us);
            if held >= self.short_us && held < self.long_us {
                events |= ControlEvents::BUTTON_SHORT_PRESS;
            } else if held > self.long_us {
                events |= ControlEvents::BUTTON_LONG_RELEASE;
            }
            debug!("button released after {}µs: {}", held, events);
        }

        if self.pressed {
            let held = now_us.saturating_sub(self.press_start_us);
            if held >= self.long_us {
                events |= ControlEvents::BUTTON_LONG_PRESS;
                if held - self.long_us >= self.pulse_us {
                    events |= ControlEvents::BUTTON_PULSE;
                    self.press_start_us = now_us - self.long_us;
                }
            }
        }

        events
    }

    pub fn state(&self, now_us: u64) -> GestureState {
        if !self.pressed {
            GestureState::Idle
        } else if now_us.saturating_sub(self.press_start_us) >= self.long_us {
            GestureState::LongHeld
        } else {
            GestureState::Pressed
        }
    }
}

impl Default for ButtonGesture {
    fn default() -> Self {
        Self::new(ButtonTiming::default())
    }
}

/// Debounces a raw button level: a new level is accepted once it has been
/// stable for the debounce interval.
#[derive(Debug, Clone, Copy)]
pub struct Debouncer {
    interval_us: u64,
    stable: bool,
    current_raw: bool,
    raw_since_us: u64,
}

impl Debouncer {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_us: interval_ms * 1000,
            stable: false,
            current_raw: false,
            raw_since_us: 0,
        }
    }

    /// Feed a raw level; returns the debounced level.
    pub fn update(&mut self, raw: bool, now_us: u64) -> bool {
        if raw != self.current_raw {
            self.current_raw = raw;
            self.raw_since_us = now_us;
        } else if raw != self.stable
            && now_us.saturating_sub(self.raw_since_us) >= self.interval_us
        {
            self.stable = raw;
        }
        self.stable
    }

    pub fn is_pressed(&self) -> bool {
        self.stable
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(DEBOUNCE_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK_US: u64 = 1000;

    /// Press at t=0, hold for `held_ms` (polling every ms), release.
    /// Returns the union of all events and the release-tick events.
    fn press_for(button: &mut ButtonGesture, held_ms: u64) -> (ControlEvents, ControlEvents) {
        let mut all = ControlEvents::empty();
        for ms in 0..held_ms {
            all |= button.poll(true, ms * TICK_US);
        }
        let release = button.poll(false, held_ms * TICK_US);
        (all | release, release)
    }

    #[test]
    fn test_short_press_at_threshold() {
        let timing = ButtonTiming::default();
        let mut button = ButtonGesture::new(timing);
        let (_, release) = press_for(&mut button, timing.short_press_ms);
        assert_eq!(release, ControlEvents::BUTTON_SHORT_PRESS);
    }

    #[test]
    fn test_press_below_threshold_is_noise() {
        let timing = ButtonTiming::default();
        let mut button = ButtonGesture::new(timing);
        let (all, _) = press_for(&mut button, timing.short_press_ms - 1);
        assert!(all.is_empty());
    }

    #[test]
    fn test_huge_timing_does_not_overflow() {
        let timing = ButtonTiming {
            short_press_ms: 10,
            long_press_ms: u64::MAX,
            pulse_delay_ms: u64::MAX,
        };
        let mut button = ButtonGesture::new(timing);
        let (all, release) = press_for(&mut button, 50);
        assert_eq!(release, ControlEvents::BUTTON_SHORT_PRESS);
        assert!(!all.contains(ControlEvents::BUTTON_LONG_PRESS));
    }

    #[test]
    fn test_long_hold_releases_as_long_release() {
        let timing = ButtonTiming::default();
        let mut button = ButtonGesture::new(timing);
        let (all, release) = press_for(&mut button, timing.long_press_ms + 50);
        assert!(release.contains(ControlEvents::BUTTON_LONG_RELEASE));
        assert!(!all.contains(ControlEvents::BUTTON_SHORT_PRESS));
        assert!(all.contains(ControlEvents::BUTTON_LONG_PRESS));
    }

    #[test]
    fn test_short_press_just_below_long() {
        let timing = ButtonTiming::default();
        let mut button = ButtonGesture::new(timing);
        let (all, release) = press_for(&mut button, timing.long_press_ms - 1);
        assert_eq!(release, ControlEvents::BUTTON_SHORT_PRESS);
        assert!(!all.contains(ControlEvents::BUTTON_LONG_PRESS));
    }

    #[test]
    fn test_pulses_repeat_at_fixed_cadence() {
        let timing = ButtonTiming::default();
        let mut button = ButtonGesture::new(timing);
        let n = 4;
        let end_ms = timing.long_press_ms + n * timing.pulse_delay_ms;

        let mut pulses = 0;
        let mut pulse_times = Vec::new();
        for ms in 0..=end_ms {
            let ev = button.poll(true, ms * TICK_US);
            if ms >= timing.long_press_ms {
                assert!(ev.contains(ControlEvents::BUTTON_LONG_PRESS), "long press at {}ms", ms);
            } else {
                assert!(ev.is_empty());
            }
            if ev.contains(ControlEvents::BUTTON_PULSE) {
                pulses += 1;
                pulse_times.push(ms);
            }
        }
        assert_eq!(pulses, n);
        for pair in pulse_times.windows(2) {
            assert_eq!(pair[1] - pair[0], timing.pulse_delay_ms);
        }
    }

    #[test]
    fn test_release_after_pulse_is_long_release() {
        let timing = ButtonTiming::default();
        let mut button = ButtonGesture::new(timing);
        let (all, release) =
            press_for(&mut button, timing.long_press_ms + timing.pulse_delay_ms + 5);
        assert!(all.contains(ControlEvents::BUTTON_PULSE));
        assert_eq!(release, ControlEvents::BUTTON_LONG_RELEASE);
    }

    #[test]
    fn test_state_transitions() {
        let mut button = ButtonGesture::default();
        assert_eq!(button.state(0), GestureState::Idle);
        button.poll(true, 0);
        assert_eq!(button.state(100_000), GestureState::Pressed);
        button.poll(true, 700_000);
        assert_eq!(button.state(700_000), GestureState::LongHeld);
        button.poll(false, 800_000);
        assert_eq!(button.state(800_000), GestureState::Idle);
    }

    #[test]
    fn test_repeated_release_polls_emit_once() {
        let mut button = ButtonGesture::default();
        let (_, release) = press_for(&mut button, 50);
        assert_eq!(release, ControlEvents::BUTTON_SHORT_PRESS);
        assert!(button.poll(false, 51_000).is_empty());
        assert!(button.poll(false, 51_000).is_empty());
    }

    #[test]
    fn test_debouncer_ignores_bounce() {
        let mut db = Debouncer::default();
        // Contact bounce: level flips every 1ms for 4ms
        for ms in 0..4u64 {
            assert!(!db.update(ms % 2 == 0, ms * TICK_US));
        }
        // Settles high
        for ms in 4..9u64 {
            db.update(true, ms * TICK_US);
        }
        assert!(db.update(true, 9 * TICK_US));
        assert!(db.is_pressed());
    }

    #[test]
    fn test_debouncer_release() {
        let mut db = Debouncer::new(5);
        db.update(true, 0);
        assert!(db.update(true, 5_000));
        db.update(false, 6_000);
        assert!(db.update(false, 10_000));
        assert!(!db.update(false, 11_000));
    }
}
