use raw_waves_control::coordinator;
use raw_waves_control::settings::Settings;
use raw_waves_control::simulator;
use raw_waves_control::types::*;
#[cfg(feature = "hardware")]
use raw_waves_control::serial_reader;
use raw_waves_control::console_display;
use raw_waves_control::data_logger;
use raw_waves_control::osc_sender;

use clap::Parser;
use crossbeam_channel::bounded;
use log::{error, info, warn};
use std::path::PathBuf;
use std::thread;

#[derive(Parser)]
#[command(name = "raw-waves-control")]
#[command(about = "Control core for the Raw Waves sample player panel")]
struct Cli {
    /// Read the panel over serial instead of running the simulator
    #[arg(long)]
    hardware: bool,

    /// Serial port for Teensy (e.g., /dev/ttyACM0)
    #[arg(long, default_value = "/dev/ttyACM0")]
    port: String,

    /// Settings file (JSON). Written with the active settings if absent.
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Settings preset when no settings file is given: "radio" or "drum"
    #[arg(long, default_value = "radio")]
    preset: String,

    /// Force pitch mode on, whatever the settings say
    #[arg(long)]
    pitch_mode: bool,

    /// Number of sample channels on the card
    #[arg(long, default_value_t = 16)]
    channels: u16,

    /// Control tick rate (Hz)
    #[arg(long, default_value_t = 1000)]
    control_rate: u32,

    /// Simulator demo sequence: "radio" (default) or "pitch"
    #[arg(long, default_value = "radio")]
    demo: String,

    /// OSC target address
    #[arg(long, default_value = "127.0.0.1:9000")]
    osc_target: String,

    /// Enable OSC output
    #[arg(long)]
    osc: bool,

    /// Enable data logging
    #[arg(long)]
    log_data: bool,

    /// Log every frame, not just frames with events
    #[arg(long)]
    log_all: bool,

    /// Output directory for logged sessions
    #[arg(long, default_value = "./sessions")]
    output_dir: PathBuf,

    /// Enable console display (terminal dashboard)
    #[arg(long)]
    console: bool,

    /// Console display refresh rate (Hz)
    #[arg(long, default_value_t = 20)]
    display_hz: u32,
}

fn load_settings(cli: &Cli) -> Settings {
    let mut settings = match &cli.settings {
        Some(path) => match Settings::load(path) {
            Some(s) => s,
            None => {
                let s = Settings::preset(&cli.preset).unwrap_or_else(Settings::radio);
                if !path.exists() {
                    if let Err(e) = s.save(path) {
                        warn!("Could not write settings to {:?}: {}", path, e);
                    }
                }
                s
            }
        },
        None => Settings::preset(&cli.preset).unwrap_or_else(|| {
            warn!("Unknown preset \"{}\", using radio", cli.preset);
            Settings::radio()
        }),
    };
    if cli.pitch_mode {
        settings.pitch_mode = true;
    }
    settings.sanitized()
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .format_timestamp_millis()
    .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli);
    let clock = SessionClock::new();

    info!("═══════════════════════════════════════════════");
    info!("  RAW WAVES CONTROL v{}", env!("CARGO_PKG_VERSION"));
    info!("  Channels: {}", cli.channels);
    info!("  Mode: {}", if settings.pitch_mode { "PITCH" } else { "RADIO" });
    info!("  Input: {}", if cli.hardware { "HARDWARE" } else { "SIMULATOR" });
    if cli.console { info!("  UI: Console dashboard"); }
    if cli.osc { info!("  OSC → {}", cli.osc_target); }
    info!("═══════════════════════════════════════════════");

    // Channel: panel → coordinator
    let (input_tx, input_rx) = bounded::<RawFrame>(4096);

    // Channels: coordinator → consumers
    let mut frame_txs: Vec<crossbeam_channel::Sender<ControlFrame>> = Vec::new();

    let mut handles = Vec::new();

    // ─── Console display ────────────────────────────────────────────
    if cli.console {
        let (tx, rx) = bounded::<ControlFrame>(256);
        frame_txs.push(tx);
        let hz = cli.display_hz;
        handles.push(thread::Builder::new().name("display".into()).spawn(move || {
            console_display::ConsoleDisplay::new(rx, hz).run();
        }).unwrap());
    }

    // ─── OSC sender ─────────────────────────────────────────────────
    if cli.osc {
        let (tx, rx) = bounded::<ControlFrame>(1024);
        frame_txs.push(tx);
        let target = cli.osc_target.clone();
        handles.push(thread::Builder::new().name("osc".into()).spawn(move || {
            osc_sender::OscSender::new(rx, target).run();
        }).unwrap());
    }

    // ─── Data logger ────────────────────────────────────────────────
    if cli.log_data {
        let (tx, rx) = bounded::<ControlFrame>(4096);
        match data_logger::DataLogger::new(rx, &cli.output_dir, settings.clone(), cli.channels) {
            Ok(logger) => {
                frame_txs.push(tx);
                let logger = logger.with_all_frames(cli.log_all);
                handles.push(thread::Builder::new().name("logger".into()).spawn(move || {
                    logger.run();
                }).unwrap());
            }
            Err(e) => error!("Data logging disabled, cannot create session directory: {}", e),
        }
    }

    // ─── Coordinator ────────────────────────────────────────────────
    let mut coord = coordinator::Coordinator::new(input_rx, frame_txs, &settings, cli.channels);
    let reset = coord.reset_trigger();
    handles.push(thread::Builder::new().name("coordinator".into()).spawn(move || {
        coord.run();
    }).unwrap());

    // ─── Input source ───────────────────────────────────────────────
    if !cli.hardware {
        info!("Starting simulator...");
        let sim_clock = clock.clone();
        let sim_tx = input_tx.clone();
        let rate = cli.control_rate;
        let demo = cli.demo.clone();
        handles.push(thread::Builder::new().name("simulator".into()).spawn(move || {
            simulator::Simulator::new(sim_clock, sim_tx, reset, rate).run(&demo);
        }).unwrap());
    } else {
        #[cfg(feature = "hardware")]
        {
            info!("Starting serial reader on {}...", cli.port);
            let ser_clock = clock.clone();
            let ser_tx = input_tx.clone();
            let port = cli.port.clone();
            handles.push(thread::Builder::new().name("serial".into()).spawn(move || {
                serial_reader::SerialReader::new(port, ser_tx, reset, ser_clock).run();
            }).unwrap());
        }
        #[cfg(not(feature = "hardware"))]
        {
            error!("Hardware mode requires 'hardware' feature. Falling back to simulator.");
            let sim_clock = clock.clone();
            let sim_tx = input_tx.clone();
            let rate = cli.control_rate;
            let demo = cli.demo.clone();
            handles.push(thread::Builder::new().name("simulator".into()).spawn(move || {
                simulator::Simulator::new(sim_clock, sim_tx, reset, rate).run(&demo);
            }).unwrap());
        }
    }
    drop(input_tx);

    info!("Running. Press Ctrl+C to stop.");
    for h in handles {
        let _ = h.join();
    }
}
