use crate::settings::Settings;
use crate::types::*;
use crossbeam_channel::Receiver;
use log::{error, info, warn};
use serde_json::json;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Writes a control session to disk:
///
/// - `manifest.json`: settings and channel count
/// - `frames.jsonl`: one `ControlFrame` per line, only frames with events
///   unless `log_all` is set
/// - `stats.json`: totals, written at shutdown
pub struct DataLogger {
    rx: Receiver<ControlFrame>,
    session_dir: PathBuf,
    settings: Settings,
    channel_count: u16,
    log_all: bool,
}

impl DataLogger {
    pub fn new(
        rx: Receiver<ControlFrame>,
        output_dir: &Path,
        settings: Settings,
        channel_count: u16,
    ) -> io::Result<Self> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let session_dir = output_dir.join(format!("session_{}", timestamp));
        fs::create_dir_all(&session_dir)?;

        Ok(Self {
            rx,
            session_dir,
            settings,
            channel_count,
            log_all: false,
        })
    }

    /// Log every frame, not just frames with events.
    pub fn with_all_frames(mut self, enabled: bool) -> Self {
        self.log_all = enabled;
        self
    }

    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Run the logger. Blocks the calling thread until the frame channel
    /// closes.
    pub fn run(&self) {
        info!("Data logger → {:?}", self.session_dir);

        if let Err(e) = self.write_manifest() {
            error!("Failed to write manifest: {}", e);
        }

        let frames_path = self.session_dir.join("frames.jsonl");
        let mut frames_writer = match File::create(&frames_path) {
            Ok(f) => BufWriter::new(f),
            Err(e) => {
                error!("Failed to create {:?}: {}", frames_path, e);
                return;
            }
        };

        let mut frame_count: u64 = 0;
        let mut logged_count: u64 = 0;
        let mut event_counts = [0u64; 16];

        for frame in self.rx.iter() {
            frame_count += 1;
            for (i, count) in event_counts.iter_mut().enumerate() {
                if frame.events.bits() & (1 << i) != 0 {
                    *count += 1;
                }
            }

            if !self.log_all && frame.events.is_empty() {
                continue;
            }
            match serde_json::to_string(&frame) {
                Ok(line) => {
                    if let Err(e) = writeln!(frames_writer, "{}", line) {
                        warn!("Frame write failed: {}", e);
                    }
                    logged_count += 1;
                }
                Err(e) => warn!("Frame serialization failed: {}", e),
            }

            if logged_count > 0 && logged_count % 1000 == 0 {
                let _ = frames_writer.flush();
                info!("Logged {} of {} frames", logged_count, frame_count);
            }
        }

        let _ = frames_writer.flush();

        let events: serde_json::Map<String, serde_json::Value> = crate::events::ControlEvents::all()
            .iter_names()
            .map(|(name, flag)| {
                let bit = flag.bits().trailing_zeros() as usize;
                (name.to_string(), json!(event_counts[bit]))
            })
            .collect();
        let stats = json!({
            "total_frames": frame_count,
            "logged_frames": logged_count,
            "events": events,
        });
        let stats_path = self.session_dir.join("stats.json");
        match serde_json::to_string_pretty(&stats) {
            Ok(s) => fs::write(&stats_path, s)
                .unwrap_or_else(|e| error!("Failed to write stats: {}", e)),
            Err(e) => error!("Failed to serialize stats: {}", e),
        }

        info!(
            "Session saved: {} frames ({} logged) → {:?}",
            frame_count, logged_count, self.session_dir
        );
    }

    fn write_manifest(&self) -> io::Result<()> {
        let manifest = json!({
            "version": env!("CARGO_PKG_VERSION"),
            "system": "raw-waves-control",
            "channel_count": self.channel_count,
            "adc_bits": ADC_BITS,
            "inputs": INPUT_NAMES,
            "settings": self.settings,
        });
        let path = self.session_dir.join("manifest.json");
        let text = serde_json::to_string_pretty(&manifest).map_err(io::Error::other)?;
        fs::write(&path, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ControlEvents;
    use crossbeam_channel::unbounded;

    fn frame(t: u64, events: ControlEvents) -> ControlFrame {
        ControlFrame {
            timestamp_us: t,
            events,
            channel: 0,
            next_channel: 0,
            start: 0.0,
            root_note: 0.0,
            raw: [0; 4],
            button: false,
        }
    }

    #[test]
    fn test_logs_only_event_frames() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = unbounded();
        let logger = DataLogger::new(rx, dir.path(), Settings::radio(), 4).unwrap();

        tx.send(frame(0, ControlEvents::CHANNEL_CHANGED)).unwrap();
        tx.send(frame(1, ControlEvents::empty())).unwrap();
        tx.send(frame(2, ControlEvents::RESET_TRIGGERED | ControlEvents::BUTTON_SHORT_PRESS))
            .unwrap();
        drop(tx);
        logger.run();

        let lines = fs::read_to_string(logger.session_dir().join("frames.jsonl")).unwrap();
        let frames: Vec<ControlFrame> = lines
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].timestamp_us, 2);
        assert!(frames[1].events.contains(ControlEvents::RESET_TRIGGERED));

        let stats: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(logger.session_dir().join("stats.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(stats["total_frames"], 3);
        assert_eq!(stats["events"]["RESET_TRIGGERED"], 1);

        let manifest: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(logger.session_dir().join("manifest.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(manifest["channel_count"], 4);
        assert_eq!(manifest["settings"]["pitch_mode"], false);
    }
}
