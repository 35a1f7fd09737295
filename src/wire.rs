//! Binary frame format of the panel link.
//!
//! | Offset | Size | Field                                          |
//! |--------|------|------------------------------------------------|
//! | 0      | 2    | sync (0xBEEF)                                  |
//! | 2      | 4    | device timestamp_us (u32, wrapping)            |
//! | 6      | 2×4  | ADC: channel CV, channel pot, start CV, start pot |
//! | 14     | 1    | flags: bit0 button level, bit1 reset edge seen |
//! | 15     | 2    | CRC16                                          |
//! | Total: 17 bytes                                               |
//!
//! All multi-byte fields are little-endian.

use crate::types::{RawFrame, ADC_MAX_VALUE};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use log::debug;
use std::io::Cursor;
use thiserror::Error;

pub const FRAME_SIZE: usize = 17;
pub const SYNC_WORD: u16 = 0xBEEF;
pub const NUM_ADC: usize = 4;

pub const FLAG_BUTTON: u8 = 0x01;
pub const FLAG_RESET_EDGE: u8 = 0x02;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("wrong size: {0}")]
    WrongSize(usize),
    #[error("bad sync: 0x{0:04X}")]
    BadSync(u16),
    #[error("CRC mismatch: received 0x{received:04X}, computed 0x{computed:04X}")]
    CrcMismatch { received: u16, computed: u16 },
    #[error("truncated frame: {0}")]
    Truncated(#[from] std::io::Error),
}

/// One decoded panel frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireFrame {
    pub device_timestamp_us: u32,
    pub adc: [u16; NUM_ADC],
    pub button: bool,
    /// A reset CV rising edge was latched by the device since the last frame
    pub reset_edge: bool,
}

impl WireFrame {
    /// Convert to a `RawFrame` stamped with the host clock. ADC codes above
    /// the converter range are clamped.
    pub fn to_raw(&self, timestamp_us: u64) -> RawFrame {
        let max = (ADC_MAX_VALUE - 1) as u16;
        RawFrame {
            timestamp_us,
            channel_cv: self.adc[0].min(max),
            channel_pot: self.adc[1].min(max),
            start_cv: self.adc[2].min(max),
            start_pot: self.adc[3].min(max),
            button_raw: self.button,
        }
    }
}

pub fn parse_frame(data: &[u8]) -> Result<WireFrame, FrameError> {
    if data.len() != FRAME_SIZE {
        return Err(FrameError::WrongSize(data.len()));
    }

    let mut cursor = Cursor::new(data);

    let sync = cursor.read_u16::<LittleEndian>()?;
    if sync != SYNC_WORD {
        return Err(FrameError::BadSync(sync));
    }

    let device_timestamp_us = cursor.read_u32::<LittleEndian>()?;

    let mut adc = [0u16; NUM_ADC];
    for value in adc.iter_mut() {
        *value = cursor.read_u16::<LittleEndian>()?;
    }

    let flags = cursor.read_u8()?;

    let received = cursor.read_u16::<LittleEndian>()?;
    let computed = crc16(&data[..FRAME_SIZE - 2]);
    if received != computed {
        return Err(FrameError::CrcMismatch { received, computed });
    }

    Ok(WireFrame {
        device_timestamp_us,
        adc,
        button: flags & FLAG_BUTTON != 0,
        reset_edge: flags & FLAG_RESET_EDGE != 0,
    })
}

pub fn encode_frame(frame: &WireFrame) -> Vec<u8> {
    let mut buf = Vec::with_capacity(FRAME_SIZE);
    // Writes into a Vec cannot fail
    let _ = buf.write_u16::<LittleEndian>(SYNC_WORD);
    let _ = buf.write_u32::<LittleEndian>(frame.device_timestamp_us);
    for &value in &frame.adc {
        let _ = buf.write_u16::<LittleEndian>(value);
    }
    let mut flags = 0u8;
    if frame.button {
        flags |= FLAG_BUTTON;
    }
    if frame.reset_edge {
        flags |= FLAG_RESET_EDGE;
    }
    let _ = buf.write_u8(flags);
    let crc = crc16(&buf);
    let _ = buf.write_u16::<LittleEndian>(crc);
    buf
}

pub fn find_sync(buf: &[u8]) -> Option<usize> {
    (0..buf.len().saturating_sub(1)).find(|&i| buf[i] == 0xEF && buf[i + 1] == 0xBE)
}

/// CRC-16/CCITT-FALSE
pub fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Reassembles frames from an arbitrary byte stream, resynchronising on the
/// sync word after garbage or corrupted frames.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    pub error_count: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(FRAME_SIZE * 4),
            error_count: 0,
        }
    }

    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Next valid frame from the buffered bytes, or None when more input is
    /// needed. Invalid frames are counted and skipped.
    pub fn next_frame(&mut self) -> Option<WireFrame> {
        while self.buf.len() >= FRAME_SIZE {
            let Some(sync_pos) = find_sync(&self.buf) else {
                // Keep a trailing 0xEF that may start the next sync word
                let keep = self.buf.len().saturating_sub(1);
                self.buf.drain(..keep);
                return None;
            };
            if sync_pos > 0 {
                debug!("Skipping {} bytes to sync", sync_pos);
                self.buf.drain(..sync_pos);
            }
            if self.buf.len() < FRAME_SIZE {
                return None;
            }

            match parse_frame(&self.buf[..FRAME_SIZE]) {
                Ok(frame) => {
                    self.buf.drain(..FRAME_SIZE);
                    return Some(frame);
                }
                Err(e) => {
                    self.error_count += 1;
                    debug!("Frame parse error: {}", e);
                    // Drop the sync word so the search moves past this frame
                    self.buf.drain(..2);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> WireFrame {
        WireFrame {
            device_timestamp_us: 123_456,
            adc: [10, 512, 1023, 700],
            button: true,
            reset_edge: false,
        }
    }

    #[test]
    fn test_crc16() {
        assert_eq!(crc16(b"123456789"), 0x29B1, "CRC-16/CCITT-FALSE of '123456789'");
    }

    #[test]
    fn test_encoded_layout() {
        let bytes = encode_frame(&sample_frame());
        assert_eq!(bytes.len(), FRAME_SIZE);
        assert_eq!(&bytes[..2], &[0xEF, 0xBE]);
        assert_eq!(bytes[14], FLAG_BUTTON);
        assert_eq!(parse_frame(&bytes).unwrap(), sample_frame());
    }

    #[test]
    fn test_parse_bad_crc() {
        let mut bytes = encode_frame(&sample_frame());
        bytes[FRAME_SIZE - 1] ^= 0xFF;
        assert!(matches!(parse_frame(&bytes), Err(FrameError::CrcMismatch { .. })));
    }

    #[test]
    fn test_parse_bad_sync() {
        let mut bytes = encode_frame(&sample_frame());
        bytes[0] = 0x00;
        let err = parse_frame(&bytes).unwrap_err();
        assert!(err.to_string().contains("bad sync"));
    }

    #[test]
    fn test_parse_wrong_size() {
        assert!(matches!(parse_frame(&[0u8; 10]), Err(FrameError::WrongSize(10))));
    }

    #[test]
    fn test_find_sync() {
        assert_eq!(find_sync(&[0x00, 0x00, 0xEF, 0xBE, 0x01]), Some(2));
        assert_eq!(find_sync(&[0xEF, 0xBE]), Some(0));
        assert_eq!(find_sync(&[0x00, 0x01, 0xEF]), None);
        assert_eq!(find_sync(&[]), None);
    }

    #[test]
    fn test_to_raw_clamps_adc() {
        let frame = WireFrame {
            adc: [4095, 0, 1023, 1024],
            ..sample_frame()
        };
        let raw = frame.to_raw(42);
        assert_eq!(raw.timestamp_us, 42);
        assert_eq!(raw.channel_cv, 1023);
        assert_eq!(raw.start_pot, 1023);
        assert!(raw.button_raw);
    }

    #[test]
    fn test_decoder_resyncs_after_garbage() {
        let mut decoder = FrameDecoder::new();
        decoder.push(&[0xAA, 0xBB, 0xCC]);
        let first = encode_frame(&sample_frame());
        decoder.push(&first[..8]);
        assert!(decoder.next_frame().is_none());
        decoder.push(&first[8..]);
        let second = WireFrame {
            reset_edge: true,
            ..sample_frame()
        };
        decoder.push(&encode_frame(&second));

        assert_eq!(decoder.next_frame(), Some(sample_frame()));
        assert_eq!(decoder.next_frame(), Some(second));
        assert_eq!(decoder.next_frame(), None);
        assert_eq!(decoder.error_count, 0);
    }

    #[test]
    fn test_decoder_skips_corrupt_frame() {
        let mut decoder = FrameDecoder::new();
        let mut bad = encode_frame(&sample_frame());
        bad[8] ^= 0x55;
        decoder.push(&bad);
        decoder.push(&encode_frame(&sample_frame()));
        assert_eq!(decoder.next_frame(), Some(sample_frame()));
        assert_eq!(decoder.error_count, 1);
    }
}
