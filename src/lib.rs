pub mod analog_input;
pub mod button;
pub mod console_display;
pub mod coordinator;
pub mod data_logger;
pub mod events;
pub mod interface;
pub mod osc_sender;
pub mod settings;
pub mod simulator;
pub mod types;
pub mod wire;

#[cfg(feature = "hardware")]
pub mod serial_reader;
