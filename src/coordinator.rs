use crate::button::Debouncer;
use crate::events::ControlEvents;
use crate::interface::{ControlInterface, ResetTrigger};
use crate::settings::Settings;
use crate::types::*;
use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, trace};

/// The coordinator receives `RawFrame`s from the panel (serial link or
/// simulator), runs them through the control interface once per frame and
/// produces `ControlFrame`s for downstream consumers.
///
/// # Playback hand-off
///
/// The playback engine itself lives elsewhere. The coordinator stands in for
/// its side of the `PlayState` contract so the pipeline behaves like the
/// instrument: a committed channel change (or a reset) makes the pending
/// channel current, and the start commit flag is cleared once reported.
pub struct Coordinator {
    input_rx: Receiver<RawFrame>,
    frame_txs: Vec<Sender<ControlFrame>>,
    interface: ControlInterface,
    debouncer: Debouncer,
    play_state: PlayState,
}

impl Coordinator {
    pub fn new(
        input_rx: Receiver<RawFrame>,
        frame_txs: Vec<Sender<ControlFrame>>,
        settings: &Settings,
        channel_count: u16,
    ) -> Self {
        let settings = settings.clone().sanitized();
        Self {
            input_rx,
            frame_txs,
            interface: ControlInterface::new(channel_count, &settings),
            debouncer: Debouncer::default(),
            play_state: PlayState {
                root_note: settings.root_note as f32,
                ..PlayState::default()
            },
        }
    }

    /// Handle for whatever delivers reset CV edges.
    pub fn reset_trigger(&self) -> ResetTrigger {
        self.interface.reset_trigger()
    }

    pub fn play_state(&self) -> &PlayState {
        &self.play_state
    }

    /// Process one panel frame.
    pub fn step(&mut self, raw: &RawFrame) -> ControlFrame {
        let button = self.debouncer.update(raw.button_raw, raw.timestamp_us);
        let inputs = RawInputs::from_frame(raw, button);
        let events = self.interface.poll(&inputs, &mut self.play_state);

        if events.contains(ControlEvents::RESET_TRIGGERED) || self.play_state.channel_changed {
            if self.play_state.current_channel != self.play_state.next_channel {
                info!(
                    "Channel {} → {}",
                    self.play_state.current_channel, self.play_state.next_channel
                );
            }
            self.play_state.commit_channel();
        }
        if self.play_state.start_changed {
            debug!("Start jump to {:.1}", self.play_state.start);
            self.play_state.start_changed = false;
        }

        if events.contains(ControlEvents::RESET_TRIGGERED) {
            info!("Reset at t={}µs", raw.timestamp_us);
        }
        if events.contains(ControlEvents::ROOT_NOTE_CHANGED) {
            debug!("Root note {:.0}", self.play_state.root_note);
        }

        ControlFrame {
            timestamp_us: raw.timestamp_us,
            events,
            channel: self.play_state.current_channel,
            next_channel: self.play_state.next_channel,
            start: self.play_state.start,
            root_note: self.play_state.root_note,
            raw: [raw.channel_cv, raw.channel_pot, raw.start_cv, raw.start_pot],
            button,
        }
    }

    pub fn run(&mut self) {
        info!(
            "Coordinator running ({} channels, {} mode)",
            self.interface.channel_count(),
            if self.interface.pitch_mode() { "pitch" } else { "radio" }
        );

        let mut frame_count: u64 = 0;
        let mut event_count: u64 = 0;

        while let Ok(raw) = self.input_rx.recv() {
            let frame = self.step(&raw);
            if !frame.events.is_empty() {
                event_count += 1;
                trace!("{}", frame);
            }

            for tx in &self.frame_txs {
                let _ = tx.send(frame.clone());
            }

            frame_count += 1;
            if frame_count % 5000 == 0 {
                debug!(
                    "Coordinator: {} frames processed, {} with events",
                    frame_count, event_count
                );
            }
        }

        info!(
            "Coordinator shutting down after {} frames ({} with events)",
            frame_count, event_count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    fn coordinator(settings: &Settings) -> Coordinator {
        let (_tx, rx) = unbounded();
        Coordinator::new(rx, Vec::new(), settings, 4)
    }

    #[test]
    fn test_immediate_channel_change_commits() {
        let mut coord = coordinator(&Settings::radio());
        coord.step(&RawFrame::at_rest(0));
        let mut raw = RawFrame::at_rest(1000);
        raw.channel_pot = 1023;
        let frame = coord.step(&raw);
        assert!(frame.events.contains(ControlEvents::CHANNEL_CHANGED));
        assert_eq!(frame.channel, 3);
        assert!(!coord.play_state().channel_changed);
    }

    #[test]
    fn test_root_note_starts_at_configured_note() {
        let settings = Settings { root_note: 48, ..Settings::radio() };
        let mut coord = coordinator(&settings);
        assert_eq!(coord.play_state().root_note, 48.0);
        // Radio mode never touches the root note
        let frame = coord.step(&RawFrame::at_rest(0));
        assert_eq!(frame.root_note, 48.0);

        // Pitch mode replaces it with the panel's root on the first tick
        let mut coord = coordinator(&Settings { root_note: 48, ..Settings::drum() });
        let frame = coord.step(&RawFrame::at_rest(0));
        assert_eq!(frame.root_note, 36.0);
    }

    #[test]
    fn test_deferred_channel_waits_for_reset() {
        let settings = Settings {
            chan_pot_immediate: false,
            chan_cv_immediate: false,
            ..Settings::radio()
        };
        let mut coord = coordinator(&settings);
        coord.step(&RawFrame::at_rest(0));
        let mut raw = RawFrame::at_rest(1000);
        raw.channel_cv = 1023;
        let frame = coord.step(&raw);
        assert_eq!(frame.channel, 0);
        assert_eq!(frame.next_channel, 3);

        coord.reset_trigger().trigger();
        raw.timestamp_us = 2000;
        let frame = coord.step(&raw);
        assert!(frame.events.contains(ControlEvents::RESET_TRIGGERED));
        assert_eq!(frame.channel, 3);
    }

    #[test]
    fn test_button_is_debounced() {
        let mut coord = coordinator(&Settings::radio());
        let mut raw = RawFrame::at_rest(0);
        raw.button_raw = true;
        // 3ms glitch: shorter than the debounce interval
        for ms in 0..3u64 {
            raw.timestamp_us = ms * 1000;
            assert!(!coord.step(&raw).button);
        }
        raw.button_raw = false;
        for ms in 3..40u64 {
            raw.timestamp_us = ms * 1000;
            let frame = coord.step(&raw);
            assert!(!frame.button);
            assert!(!frame.events.intersects(ControlEvents::BUTTON));
        }
    }
}
