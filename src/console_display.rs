use crate::events::ControlEvents;
use crate::types::*;
use crossbeam_channel::Receiver;
use std::io::{self, Write};

/// How long an event stays highlighted on the dashboard (frames).
const EVENT_HOLD_FRAMES: u64 = 500;

/// Renders a live ASCII dashboard of the panel state.
pub struct ConsoleDisplay {
    rx: Receiver<ControlFrame>,
    update_hz: u32,
}

impl ConsoleDisplay {
    pub fn new(rx: Receiver<ControlFrame>, update_hz: u32) -> Self {
        Self { rx, update_hz }
    }

    pub fn run(&self) {
        let skip = if self.update_hz == 0 { 50 } else { (1000 / self.update_hz).max(1) as u64 };
        let mut count: u64 = 0;
        let mut stdout = io::stdout();
        // Frame index at which each event bit was last seen
        let mut last_seen = [None::<u64>; 16];

        for frame in self.rx.iter() {
            count += 1;
            for (i, seen) in last_seen.iter_mut().enumerate() {
                if frame.events.bits() & (1 << i) != 0 {
                    *seen = Some(count);
                }
            }
            if count % skip != 0 {
                continue;
            }

            // Clear screen and move cursor home
            print!("\x1b[2J\x1b[H");

            println!("╔══════════════════════════════════════════════════════════╗");
            println!("║  RAW WAVES — Control Monitor                             ║");
            println!("╠══════════════════════════════════════════════════════════╣");

            let secs = frame.timestamp_us as f64 / 1_000_000.0;
            println!("║  Time: {:<10.2}s                                       ║", secs);
            println!("║                                                          ║");

            println!("║  Inputs:                                                 ║");
            for (name, &raw) in INPUT_NAMES.iter().zip(frame.raw.iter()) {
                let level = raw as f32 / (ADC_MAX_VALUE - 1) as f32;
                println!("║    {:>9}: {} {:>4}              ║", name, make_bar(level, 26), raw);
            }
            println!("║    {:>9}: {:<42} ║", "button", if frame.button { "DOWN" } else { "up" });
            println!("║                                                          ║");

            println!(
                "║  Channel: {:>3}  next: {:>3}   LEDs: {}                 ║",
                frame.channel,
                frame.next_channel,
                led_row(frame.channel)
            );
            println!("║  Start: {:>7.1}   Root note: {:>5.1}                      ║", frame.start, frame.root_note);
            println!("║                                                          ║");

            println!("║  Events:                                                 ║");
            for (name, flag) in ControlEvents::all().iter_names() {
                let bit = flag.bits().trailing_zeros() as usize;
                let lit = last_seen[bit].is_some_and(|at| count - at < EVENT_HOLD_FRAMES);
                println!("║    {} {:<50} ║", if lit { "●" } else { "○" }, name);
            }

            println!("╚══════════════════════════════════════════════════════════╝");
            let _ = stdout.flush();
        }
    }
}

/// Top-row LED pattern for a channel: one lit LED, wrapping every four
/// channels, leftmost LED for channel 0.
pub fn led_row(channel: u16) -> String {
    let lit = channel as usize % CHANNEL_LEDS;
    (0..CHANNEL_LEDS)
        .map(|i| if i == lit { '●' } else { '○' })
        .collect()
}

fn make_bar(val: f32, width: usize) -> String {
    let filled = (val.clamp(0.0, 1.0) * width as f32).round() as usize;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_led_row() {
        assert_eq!(led_row(0), "●○○○");
        assert_eq!(led_row(3), "○○○●");
        assert_eq!(led_row(5), "○●○○");
    }

    #[test]
    fn test_make_bar_clamps() {
        assert_eq!(make_bar(2.0, 4), "[████]");
        assert_eq!(make_bar(-1.0, 4), "[░░░░]");
    }
}
