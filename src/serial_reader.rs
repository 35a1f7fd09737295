use crate::interface::ResetTrigger;
use crate::types::*;
use crate::wire::FrameDecoder;
use crossbeam_channel::Sender;
use log::{error, info, warn};
use std::io::{self, Read};
use std::time::Duration;

/// Reads panel frames from the Teensy over USB serial (format in `wire`).
///
/// Reset edges are latched by the device's interrupt handler and flagged in
/// the next frame; the reader forwards them straight to the reset latch
/// instead of queueing them behind the ADC frames.
pub struct SerialReader {
    port_name: String,
    baud_rate: u32,
    tx: Sender<RawFrame>,
    reset: ResetTrigger,
    clock: SessionClock,
}

impl SerialReader {
    pub fn new(
        port_name: String,
        tx: Sender<RawFrame>,
        reset: ResetTrigger,
        clock: SessionClock,
    ) -> Self {
        Self {
            port_name,
            baud_rate: 115200,
            tx,
            reset,
            clock,
        }
    }

    /// Run the serial reader loop. Blocks the calling thread.
    pub fn run(&self) {
        info!(
            "Opening serial port: {} @ {}",
            self.port_name, self.baud_rate
        );

        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(Duration::from_millis(100))
            .open();

        let mut port = match port {
            Ok(p) => p,
            Err(e) => {
                error!("Failed to open serial port {}: {}", self.port_name, e);
                error!("Is the panel connected? Run without --hardware for the simulator.");
                return;
            }
        };

        info!("Serial port opened. Reading frames...");
        let mut buf = [0u8; 256];
        let mut decoder = FrameDecoder::new();
        let mut frame_count: u64 = 0;

        loop {
            match port.read(&mut buf) {
                Ok(n) => {
                    decoder.push(&buf[..n]);
                    while let Some(frame) = decoder.next_frame() {
                        if frame.reset_edge {
                            self.reset.trigger();
                        }
                        // Host clock for consistent timestamps (device clock wraps)
                        let raw = frame.to_raw(self.clock.now_us());
                        if self.tx.send(raw).is_err() {
                            info!("Coordinator gone, serial reader stopping");
                            return;
                        }
                        frame_count += 1;
                        if frame_count % 5000 == 0 {
                            info!(
                                "Serial: {} frames, {} errors",
                                frame_count, decoder.error_count
                            );
                        }
                    }
                }
                Err(ref e) if e.kind() == io::ErrorKind::TimedOut => {
                    continue;
                }
                Err(e) => {
                    warn!("Serial read error: {}", e);
                    std::thread::sleep(Duration::from_millis(100));
                }
            }
        }
    }
}
