use crate::events::ControlEvents;
use crate::types::*;
use crossbeam_channel::Receiver;
use log::{debug, error, info};
use rosc::{OscMessage, OscPacket, OscType};
use std::net::UdpSocket;

/// Forwards control events to an OSC target. Quiet frames send nothing.
pub struct OscSender {
    rx: Receiver<ControlFrame>,
    target: String,
}

impl OscSender {
    pub fn new(rx: Receiver<ControlFrame>, target: String) -> Self {
        Self { rx, target }
    }

    /// Run the OSC sender loop. Blocks the calling thread.
    pub fn run(&self) {
        let socket = match UdpSocket::bind("0.0.0.0:0") {
            Ok(s) => s,
            Err(e) => {
                error!("Failed to bind UDP socket: {}", e);
                return;
            }
        };
        info!("OSC sender → {}", self.target);

        for frame in self.rx.iter() {
            if frame.events.is_empty() {
                continue;
            }
            for packet in messages_for(&frame) {
                if let Err(e) = self.send(&socket, &packet) {
                    debug!("OSC send error: {}", e);
                }
            }
        }
        info!("OSC sender shutting down");
    }

    fn send(
        &self,
        socket: &UdpSocket,
        packet: &OscPacket,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let buf = rosc::encoder::encode(packet)?;
        socket.send_to(&buf, &self.target)?;
        Ok(())
    }
}

fn message(addr: &str, args: Vec<OscType>) -> OscPacket {
    OscPacket::Message(OscMessage {
        addr: addr.to_string(),
        args,
    })
}

/// OSC messages describing one frame's events.
///
/// ```text
/// /rawwaves/channel        i current, i next    (CHANNEL_CHANGED)
/// /rawwaves/start          f start, i now       (any start event)
/// /rawwaves/root           f root note          (any root event)
/// /rawwaves/reset                               (RESET_TRIGGERED)
/// /rawwaves/button/short                        (BUTTON_SHORT_PRESS)
/// /rawwaves/button/release                     (BUTTON_LONG_RELEASE)
/// /rawwaves/button/pulse
/// ```
pub fn messages_for(frame: &ControlFrame) -> Vec<OscPacket> {
    let ev = frame.events;
    let mut out = Vec::new();

    if ev.contains(ControlEvents::CHANNEL_CHANGED) {
        out.push(message(
            "/rawwaves/channel",
            vec![
                OscType::Int(frame.channel as i32),
                OscType::Int(frame.next_channel as i32),
            ],
        ));
    }
    if ev.intersects(ControlEvents::START) {
        let now = ev.contains(ControlEvents::CHANGE_START_NOW) as i32;
        out.push(message(
            "/rawwaves/start",
            vec![OscType::Float(frame.start), OscType::Int(now)],
        ));
    }
    if ev.intersects(ControlEvents::ROOT) {
        out.push(message("/rawwaves/root", vec![OscType::Float(frame.root_note)]));
    }
    if ev.contains(ControlEvents::RESET_TRIGGERED) {
        out.push(message("/rawwaves/reset", Vec::new()));
    }
    if ev.contains(ControlEvents::BUTTON_SHORT_PRESS) {
        out.push(message("/rawwaves/button/short", Vec::new()));
    }
    // BUTTON_LONG_PRESS is a level, raised every held tick; not forwarded
    if ev.contains(ControlEvents::BUTTON_LONG_RELEASE) {
        out.push(message("/rawwaves/button/release", Vec::new()));
    }
    if ev.contains(ControlEvents::BUTTON_PULSE) {
        out.push(message("/rawwaves/button/pulse", Vec::new()));
    }
    out
}
