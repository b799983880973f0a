//! Byte-stuffed, CRC-checked frame codec for the serial link.
//!
//! Wire layout: `START · type · len_hi · len_lo · crc · payload[0..len] · END`.
//! `START`/`ESC`/`END` are reserved octets; every other body byte whose value
//! is below `0x10` is escaped by prefixing `ESC` and XORing it with `0x10`,
//! so the three reserved values never appear unescaped inside a frame.

use std::io;

pub const START: u8 = 0x01;
pub const ESC: u8 = 0x02;
pub const END: u8 = 0x03;

const ESC_XOR: u8 = 0x10;

/// A destination for the raw bytes the encoder produces. Implemented for
/// `Vec<u8>` (tests, buffering) and for `SerialLine` (the real transport).
pub trait ByteSink {
    fn write_byte(&mut self, byte: u8) -> io::Result<()>;
}

impl ByteSink for Vec<u8> {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.push(byte);
        Ok(())
    }
}

fn crc(msg_type: u8, payload: &[u8]) -> u8 {
    let len = payload.len() as u16;
    let mut crc = msg_type;
    crc ^= (len >> 8) as u8;
    crc ^= (len & 0xff) as u8;
    for &b in payload {
        crc ^= b;
    }
    crc
}

fn write_escaped<W: ByteSink>(sink: &mut W, byte: u8) -> io::Result<()> {
    if byte < ESC_XOR {
        sink.write_byte(ESC)?;
        sink.write_byte(byte ^ ESC_XOR)
    } else {
        sink.write_byte(byte)
    }
}

/// Encodes and writes one frame. Best-effort: if a byte write fails partway
/// through, the remainder of the frame is abandoned rather than retried or
/// buffered.
pub fn write_message<W: ByteSink>(
    sink: &mut W,
    msg_type: u8,
    payload: &[u8],
) -> io::Result<()> {
    let len = payload.len() as u16;
    sink.write_byte(START)?;
    write_escaped(sink, msg_type)?;
    write_escaped(sink, (len >> 8) as u8)?;
    write_escaped(sink, (len & 0xff) as u8)?;
    write_escaped(sink, crc(msg_type, payload))?;
    for &b in payload {
        write_escaped(sink, b)?;
    }
    sink.write_byte(END)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RxState {
    WaitStart,
    WaitType,
    WaitLenHi,
    WaitLenLo,
    WaitCrc,
    WaitData,
}

/// A fully decoded, CRC-valid frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub msg_type: u8,
    pub payload: Vec<u8>,
}

/// Resumable frame decoder. Feed it bytes one at a time as they arrive off
/// the wire; it survives partial frames across calls and resynchronizes on
/// the next `START` after any corruption.
pub struct Decoder {
    state: RxState,
    esc: bool,
    msg_type: u8,
    length: usize,
    crc_recv: u8,
    running_crc: u8,
    count: usize,
    buf: Vec<u8>,
    max_len: usize,
}

impl Decoder {
    pub fn new(max_len: usize) -> Self {
        Decoder {
            state: RxState::WaitStart,
            esc: false,
            msg_type: 0,
            length: 0,
            crc_recv: 0,
            running_crc: 0,
            count: 0,
            buf: vec![0u8; max_len],
            max_len,
        }
    }

    /// Feeds one received byte. Returns a completed frame if this byte
    /// closed one out; otherwise `None`.
    pub fn feed(&mut self, byte: u8) -> Option<Frame> {
        match byte {
            START => {
                self.state = RxState::WaitType;
                self.esc = false;
                self.count = 0;
                self.running_crc = 0;
                None
            }
            ESC => {
                self.esc = true;
                None
            }
            END => {
                if self.state == RxState::WaitData && self.running_crc == self.crc_recv {
                    let frame = Frame {
                        msg_type: self.msg_type,
                        payload: self.buf[..self.count].to_vec(),
                    };
                    self.state = RxState::WaitStart;
                    return Some(frame);
                }
                None
            }
            raw => {
                let b = if self.esc {
                    self.esc = false;
                    raw ^ ESC_XOR
                } else {
                    raw
                };
                match self.state {
                    RxState::WaitStart => {}
                    RxState::WaitType => {
                        self.msg_type = b;
                        self.running_crc ^= b;
                        self.state = RxState::WaitLenHi;
                    }
                    RxState::WaitLenHi => {
                        self.length = (b as usize) << 8;
                        self.running_crc ^= b;
                        self.state = RxState::WaitLenLo;
                    }
                    RxState::WaitLenLo => {
                        self.length |= b as usize;
                        self.running_crc ^= b;
                        self.state = if self.length > self.max_len {
                            RxState::WaitStart
                        } else {
                            RxState::WaitCrc
                        };
                    }
                    RxState::WaitCrc => {
                        self.crc_recv = b;
                        self.state = RxState::WaitData;
                    }
                    RxState::WaitData => {
                        if self.count < self.length {
                            self.buf[self.count] = b;
                            self.running_crc ^= b;
                            self.count += 1;
                        }
                    }
                }
                None
            }
        }
    }

    /// Feeds a batch of bytes, returning every frame completed along the way.
    pub fn feed_all(&mut self, bytes: &[u8]) -> Vec<Frame> {
        bytes.iter().filter_map(|&b| self.feed(b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(msg_type: u8, payload: &[u8]) -> Option<Frame> {
        let mut wire = Vec::new();
        write_message(&mut wire, msg_type, payload).unwrap();
        let mut dec = Decoder::new(2048);
        dec.feed_all(&wire).into_iter().next()
    }

    #[test]
    fn round_trip_arbitrary_payload() {
        for msg_type in [0u8, 1, 2, 3, 15, 16, 109, 255] {
            for len in [0usize, 1, 2, 15, 16, 17, 300] {
                let payload: Vec<u8> = (0..len).map(|i| (i * 37 + msg_type as usize) as u8).collect();
                let frame = roundtrip(msg_type, &payload).expect("frame should decode");
                assert_eq!(frame.msg_type, msg_type);
                assert_eq!(frame.payload, payload);
            }
        }
    }

    #[test]
    fn escape_neutrality_for_every_interesting_byte() {
        for &b in &[0x00u8, 0x01, 0x02, 0x03, 0x0f, 0x10, 0x11, 0x7f, 0xff] {
            let frame = roundtrip(1, &[b]).expect("frame should decode");
            assert_eq!(frame.payload, vec![b]);
        }
    }

    #[test]
    fn encode_empty_ping() {
        let mut wire = Vec::new();
        write_message(&mut wire, 109, &[]).unwrap();
        // type=0x6D unescaped, len_hi=len_lo=0x00 escaped (both < 0x10), crc=0x6D unescaped.
        assert_eq!(wire, vec![START, 0x6D, ESC, 0x00 ^ 0x10, ESC, 0x00 ^ 0x10, 0x6D, END]);
    }

    #[test]
    fn encode_payload_with_escape() {
        let mut wire = Vec::new();
        write_message(&mut wire, 1, &[0x02]).unwrap();
        // type=1, len_hi=0, len_lo=1 all < 0x10 and escaped; crc = 1^0^1^2 = 2, also escaped.
        let expected = vec![
            START,
            ESC, 1 ^ 0x10,
            ESC, 0 ^ 0x10,
            ESC, 1 ^ 0x10,
            ESC, 2 ^ 0x10,
            ESC, 2 ^ 0x10,
            END,
        ];
        assert_eq!(wire, expected);
        let frame = Decoder::new(16).feed_all(&wire).into_iter().next().unwrap();
        assert_eq!(frame.msg_type, 1);
        assert_eq!(frame.payload, vec![0x02]);
    }

    #[test]
    fn crc_rejection_on_any_single_bit_flip() {
        let mut wire = Vec::new();
        write_message(&mut wire, 42, &[0xAA, 0xBB, 0xCC]).unwrap();
        for i in 1..wire.len() - 1 {
            for bit in 0..8u8 {
                let mut corrupt = wire.clone();
                corrupt[i] ^= 1 << bit;
                if corrupt == wire {
                    continue;
                }
                let mut dec = Decoder::new(2048);
                let frames = dec.feed_all(&corrupt);
                // A corrupted frame must never decode to the original payload.
                assert!(frames.iter().all(|f| f.msg_type != 42 || f.payload != vec![0xAA, 0xBB, 0xCC]));
                // The decoder must still accept a following well-formed frame.
                let mut good = Vec::new();
                write_message(&mut good, 7, &[1, 2, 3]).unwrap();
                let recovered = dec.feed_all(&good);
                assert_eq!(recovered.last().map(|f| f.msg_type), Some(7));
            }
        }
    }

    #[test]
    fn resynchronizes_after_garbage() {
        let mut wire = vec![0xAA, 0xBB, ESC, 0x07, START, START];
        let mut good = Vec::new();
        write_message(&mut good, 5, &[9, 9]).unwrap();
        wire.extend_from_slice(&good);

        let mut dec = Decoder::new(2048);
        let frames = dec.feed_all(&wire);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].msg_type, 5);
        assert_eq!(frames[0].payload, vec![9, 9]);
    }

    #[test]
    fn overlong_frame_is_dropped_and_resyncs() {
        let mut dec = Decoder::new(4);
        // Declare a length of 5 bytes, which exceeds the caller's bound of 4.
        dec.feed(START);
        dec.feed(1); // type
        dec.feed(0); // len_hi
        dec.feed(5); // len_lo -> exceeds max_len, decoder drops back to WaitStart
        let mut good = Vec::new();
        write_message(&mut good, 6, &[1, 2]).unwrap();
        let frames = dec.feed_all(&good);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].msg_type, 6);
    }
}
