use crate::interface::ResetTrigger;
use crate::types::*;
use crossbeam_channel::Sender;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::thread;
use std::time::Duration;

/// Generates panel frames from scripted gestures: knob sweeps, noisy CV,
/// button presses and reset pulses. Exercises the whole control pipeline
/// without any hardware.
pub struct Simulator {
    clock: SessionClock,
    tx: Sender<RawFrame>,
    reset: ResetTrigger,
    control_rate_hz: u32,
    /// Sleep between ticks and stamp frames with the session clock. When
    /// false, frames are stamped with the tick count and sent back to back.
    realtime: bool,
    tick: u64,
    rng: StdRng,
}

/// Mutable state that evolves as gestures are applied.
#[derive(Clone, Debug, Default)]
struct SimState {
    /// Target ADC values in `INPUT_NAMES` order
    inputs: [f32; 4],
    /// Peak-to-peak noise added to the CV inputs, in ADC codes
    cv_noise: f32,
    button: bool,
}

/// Which panel input a gesture acts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Input {
    ChannelCv = 0,
    ChannelPot = 1,
    StartCv = 2,
    StartPot = 3,
}

impl Input {
    const ALL: [Input; 4] = [Input::ChannelCv, Input::ChannelPot, Input::StartCv, Input::StartPot];

    fn name(self) -> &'static str {
        INPUT_NAMES[self as usize]
    }

    fn is_cv(self) -> bool {
        matches!(self, Input::ChannelCv | Input::StartCv)
    }
}

#[derive(Clone, Debug)]
pub enum Gesture {
    Hold { ms: u32 },
    /// Jump an input to an ADC value
    Set { input: Input, value: u16 },
    /// Move an input to an ADC value over time
    Sweep { input: Input, to: u16, ms: u32 },
    /// Set CV jack noise (peak-to-peak ADC codes)
    CvNoise { amplitude: f32 },
    /// Press and release the button, with contact bounce on both edges
    Press { ms: u32 },
    /// Rising edge on the reset CV jack
    ResetPulse,
}

impl Simulator {
    pub fn new(
        clock: SessionClock,
        tx: Sender<RawFrame>,
        reset: ResetTrigger,
        control_rate_hz: u32,
    ) -> Self {
        Self {
            clock,
            tx,
            reset,
            control_rate_hz: control_rate_hz.max(1),
            realtime: true,
            tick: 0,
            rng: StdRng::seed_from_u64(0x5eed),
        }
    }

    /// Send frames as fast as the channel accepts them, stamped with
    /// synthetic tick times.
    pub fn without_realtime(mut self) -> Self {
        self.realtime = false;
        self
    }

    fn tick_us(&self) -> u64 {
        1_000_000 / self.control_rate_hz as u64
    }

    /// Run a demo sequence, then keep the panel alive. Blocks the calling
    /// thread.
    pub fn run(&mut self, demo: &str) {
        let gestures = match demo {
            "pitch" => pitch_sequence(),
            _ => radio_sequence(),
        };
        info!("Simulator starting \"{}\" demo sequence...", demo);
        let state = self.run_sequence(&gestures);

        info!("Demo sequence complete. Holding final state...");
        while self.emit_tick(&state) {}
    }

    /// Play gestures from a resting panel. Returns once the sequence ends or
    /// the receiver hangs up.
    fn run_sequence(&mut self, gestures: &[Gesture]) -> SimState {
        let mut state = SimState::default();
        for gesture in gestures {
            if !self.execute(gesture, &mut state) {
                break;
            }
        }
        state
    }

    /// Play gestures and stop. Used by tests and scripted runs.
    pub fn play(&mut self, gestures: &[Gesture]) {
        self.run_sequence(gestures);
    }

    fn ticks_for(&self, ms: u32) -> u64 {
        (ms as u64 * 1000) / self.tick_us()
    }

    fn execute(&mut self, gesture: &Gesture, state: &mut SimState) -> bool {
        match gesture {
            Gesture::Hold { ms } => {
                info!("  hold {}ms", ms);
                for _ in 0..self.ticks_for(*ms) {
                    if !self.emit_tick(state) {
                        return false;
                    }
                }
            }

            Gesture::Set { input, value } => {
                info!("  {} = {}", input.name(), value);
                state.inputs[*input as usize] = *value as f32;
            }

            Gesture::Sweep { input, to, ms } => {
                let from = state.inputs[*input as usize];
                info!("  {} {:.0} → {} over {}ms", input.name(), from, to, ms);
                let ticks = self.ticks_for(*ms).max(1);
                for i in 0..ticks {
                    let t = i as f32 / ticks as f32;
                    state.inputs[*input as usize] = lerp(from, *to as f32, smoothstep(t));
                    if !self.emit_tick(state) {
                        return false;
                    }
                }
                state.inputs[*input as usize] = *to as f32;
            }

            Gesture::CvNoise { amplitude } => {
                info!("  CV noise ±{:.0}", amplitude / 2.0);
                state.cv_noise = *amplitude;
            }

            Gesture::Press { ms } => {
                info!("  button press {}ms", ms);
                if !self.bounce(state, true) {
                    return false;
                }
                for _ in 0..self.ticks_for(*ms) {
                    if !self.emit_tick(state) {
                        return false;
                    }
                }
                if !self.bounce(state, false) {
                    return false;
                }
            }

            Gesture::ResetPulse => {
                info!("  reset pulse");
                self.reset.trigger();
            }
        }
        true
    }

    /// Toggle the button a few times before settling on `level`.
    fn bounce(&mut self, state: &mut SimState, level: bool) -> bool {
        for i in 0..3 {
            state.button = if i % 2 == 0 { level } else { !level };
            if !self.emit_tick(state) {
                return false;
            }
        }
        state.button = level;
        true
    }

    /// Emit one frame. Returns false once the receiver is gone.
    fn emit_tick(&mut self, state: &SimState) -> bool {
        let tick_us = self.tick_us();
        let timestamp_us = if self.realtime {
            self.clock.now_us()
        } else {
            self.tick * tick_us
        };
        self.tick += 1;

        let mut adc = [0u16; 4];
        for (i, value) in adc.iter_mut().enumerate() {
            let mut v = state.inputs[i];
            if state.cv_noise > 0.0 && Input::ALL[i].is_cv() {
                let half = state.cv_noise / 2.0;
                v += self.rng.gen_range(-half..=half);
            }
            *value = v.round().clamp(0.0, (ADC_MAX_VALUE - 1) as f32) as u16;
        }

        let frame = RawFrame {
            timestamp_us,
            channel_cv: adc[0],
            channel_pot: adc[1],
            start_cv: adc[2],
            start_pot: adc[3],
            button_raw: state.button,
        };
        if self.tx.send(frame).is_err() {
            return false;
        }

        if self.realtime {
            thread::sleep(Duration::from_micros(tick_us));
        }
        true
    }
}

/// Radio-mode tour: channel sweeps, start-position moves under CV noise,
/// short and long button presses, reset pulses.
fn radio_sequence() -> Vec<Gesture> {
    vec![
        Gesture::Hold { ms: 200 },

        // Walk through the channels with the pot
        Gesture::Sweep { input: Input::ChannelPot, to: 1023, ms: 1500 },
        Gesture::Hold { ms: 300 },
        Gesture::Sweep { input: Input::ChannelPot, to: 0, ms: 800 },

        // Channel CV offsets the pot
        Gesture::Set { input: Input::ChannelCv, value: 400 },
        Gesture::Hold { ms: 500 },

        // Start position: slow pot sweep, then a noisy CV
        Gesture::Sweep { input: Input::StartPot, to: 600, ms: 1000 },
        Gesture::CvNoise { amplitude: 24.0 },
        Gesture::Sweep { input: Input::StartCv, to: 300, ms: 800 },
        Gesture::Hold { ms: 1000 },

        // Reset from the jack, then from the button
        Gesture::ResetPulse,
        Gesture::Hold { ms: 200 },
        Gesture::Press { ms: 80 },
        Gesture::Hold { ms: 400 },

        // Long hold: long press with pulses
        Gesture::Press { ms: 2000 },
        Gesture::Hold { ms: 300 },

        Gesture::CvNoise { amplitude: 0.0 },
        Gesture::Set { input: Input::ChannelCv, value: 0 },
        Gesture::Sweep { input: Input::StartPot, to: 0, ms: 500 },
        Gesture::Sweep { input: Input::StartCv, to: 0, ms: 500 },
        Gesture::Hold { ms: 500 },
    ]
}

/// Pitch-mode tour: root note from the pot, CV arpeggio around semitone
/// boundaries.
fn pitch_sequence() -> Vec<Gesture> {
    vec![
        Gesture::Hold { ms: 200 },
        Gesture::Sweep { input: Input::StartPot, to: 256, ms: 1000 },
        Gesture::Hold { ms: 300 },
        Gesture::CvNoise { amplitude: 40.0 },
        Gesture::Set { input: Input::StartCv, value: 105 },
        Gesture::Hold { ms: 400 },
        Gesture::Set { input: Input::StartCv, value: 210 },
        Gesture::Hold { ms: 400 },
        Gesture::Set { input: Input::StartCv, value: 315 },
        Gesture::Hold { ms: 400 },
        Gesture::ResetPulse,
        Gesture::Hold { ms: 200 },
        Gesture::Sweep { input: Input::ChannelPot, to: 1023, ms: 1000 },
        Gesture::Press { ms: 60 },
        Gesture::Hold { ms: 500 },
        Gesture::CvNoise { amplitude: 0.0 },
    ]
}

// ─── Math helpers ───────────────────────────────────────────────────────────

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Smooth interpolation (ease in/out)
fn smoothstep(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interface::ResetLatch;
    use crossbeam_channel::unbounded;

    fn offline() -> (Simulator, crossbeam_channel::Receiver<RawFrame>, ResetLatch) {
        let (tx, rx) = unbounded();
        let latch = ResetLatch::new();
        let sim = Simulator::new(SessionClock::new(), tx, latch.trigger_handle(), 1000)
            .without_realtime();
        (sim, rx, latch)
    }

    #[test]
    fn test_hold_emits_one_frame_per_tick() {
        let (mut sim, rx, _) = offline();
        sim.play(&[Gesture::Hold { ms: 50 }]);
        let frames: Vec<RawFrame> = rx.try_iter().collect();
        assert_eq!(frames.len(), 50);
        assert_eq!(frames[10].timestamp_us, 10_000);
    }

    #[test]
    fn test_sweep_reaches_target() {
        let (mut sim, rx, _) = offline();
        sim.play(&[
            Gesture::Sweep { input: Input::StartPot, to: 800, ms: 100 },
            Gesture::Hold { ms: 1 },
        ]);
        let frames: Vec<RawFrame> = rx.try_iter().collect();
        assert_eq!(frames.first().unwrap().start_pot, 0);
        assert_eq!(frames.last().unwrap().start_pot, 800);
        assert!(frames.windows(2).all(|w| w[1].start_pot >= w[0].start_pot));
    }

    #[test]
    fn test_noise_only_on_cv_inputs() {
        let (mut sim, rx, _) = offline();
        sim.play(&[
            Gesture::Set { input: Input::StartCv, value: 500 },
            Gesture::Set { input: Input::StartPot, value: 500 },
            Gesture::CvNoise { amplitude: 20.0 },
            Gesture::Hold { ms: 200 },
        ]);
        let frames: Vec<RawFrame> = rx.try_iter().collect();
        assert!(frames.iter().all(|f| f.start_pot == 500));
        assert!(frames.iter().all(|f| (490..=510).contains(&f.start_cv)));
        assert!(frames.iter().any(|f| f.start_cv != 500));
    }

    #[test]
    fn test_reset_pulse_sets_latch() {
        let (mut sim, _rx, latch) = offline();
        sim.play(&[Gesture::ResetPulse]);
        assert!(latch.take());
    }

    #[test]
    fn test_press_bounces_then_holds() {
        let (mut sim, rx, _) = offline();
        sim.play(&[Gesture::Press { ms: 20 }]);
        let levels: Vec<bool> = rx.try_iter().map(|f| f.button_raw).collect();
        assert_eq!(&levels[..3], &[true, false, true]);
        assert!(levels[3..23].iter().all(|&b| b));
        assert_eq!(&levels[23..], &[false, true, false]);
    }

    #[test]
    fn test_stops_when_receiver_dropped() {
        let (mut sim, rx, _) = offline();
        drop(rx);
        // Would never return if send errors were ignored
        sim.play(&[Gesture::Hold { ms: 1_000_000 }]);
    }
}
