//! Traintastic-DIY wire framing: `[opcode | dataSize | data... | checksum]`
//! where `checksum = opcode XOR dataSize XOR data[0] XOR ... XOR data[n-1]`
//! (§4.9, §6). Grounded on `original_source/server/src/hardware/protocol/
//! traintasticdiy/messages.cpp`'s `calcChecksum`/`updateChecksum`/
//! `isChecksumValid`, which XOR every byte from offset 0 up to and
//! including `dataSize` (the size byte itself participates).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Heartbeat,
    GetInfo,
    GetFeatures,
    GetInputState,
    SetInputState,
    GetOutputState,
    SetOutputState,
    ThrottleUnsubscribe,
    ThrottleSetFunction,
    ThrottleSetSpeedDirection,
    Features,
    Info,
}

impl OpCode {
    fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            0x01 => OpCode::Heartbeat,
            0x02 => OpCode::GetInfo,
            0x03 => OpCode::GetFeatures,
            0x10 => OpCode::GetInputState,
            0x11 => OpCode::SetInputState,
            0x12 => OpCode::GetOutputState,
            0x13 => OpCode::SetOutputState,
            0x20 => OpCode::ThrottleUnsubscribe,
            0x21 => OpCode::ThrottleSetFunction,
            0x22 => OpCode::ThrottleSetSpeedDirection,
            0x83 => OpCode::Features,
            0x82 => OpCode::Info,
            _ => return None,
        })
    }

    fn to_byte(self) -> u8 {
        match self {
            OpCode::Heartbeat => 0x01,
            OpCode::GetInfo => 0x02,
            OpCode::GetFeatures => 0x03,
            OpCode::GetInputState => 0x10,
            OpCode::SetInputState => 0x11,
            OpCode::GetOutputState => 0x12,
            OpCode::SetOutputState => 0x13,
            OpCode::ThrottleUnsubscribe => 0x20,
            OpCode::ThrottleSetFunction => 0x21,
            OpCode::ThrottleSetSpeedDirection => 0x22,
            OpCode::Features => 0x83,
            OpCode::Info => 0x82,
        }
    }
}

/// A DIY frame: opcode byte, size byte, `data.len()` payload bytes, and a
/// trailing XOR checksum byte. Stored flat so `update_checksum`/
/// `is_checksum_valid` can walk the raw bytes exactly as the reference
/// implementation does via `reinterpret_cast`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    bytes: Vec<u8>,
}

impl Message {
    /// Builds a frame for `opcode` with `data` as its payload, then writes
    /// a valid checksum — the constructor a kernel uses when it has a
    /// complete message ready to send.
    pub fn new(opcode: OpCode, data: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(data.len() + 3);
        bytes.push(opcode.to_byte());
        bytes.push(data.len() as u8);
        bytes.extend_from_slice(data);
        bytes.push(0);
        let mut msg = Message { bytes };
        msg.update_checksum();
        msg
    }

    /// Parses a frame already in memory (e.g. read off a socket),
    /// without validating its checksum — callers check that separately
    /// via [`Message::is_checksum_valid`].
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Self> {
        if bytes.len() < 3 {
            return None;
        }
        let data_size = bytes[1] as usize;
        if bytes.len() != data_size + 3 {
            return None;
        }
        Some(Message { bytes })
    }

    pub fn opcode(&self) -> Option<OpCode> {
        OpCode::from_byte(self.bytes[0])
    }

    pub fn data_size(&self) -> usize {
        self.bytes[1] as usize
    }

    pub fn data(&self) -> &[u8] {
        &self.bytes[2..2 + self.data_size()]
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn checksum_offset(&self) -> usize {
        self.data_size() + 2
    }

    fn calc_checksum(&self) -> u8 {
        self.bytes[0..=self.data_size() + 1]
            .iter()
            .fold(0u8, |acc, b| acc ^ b)
    }

    pub fn update_checksum(&mut self) {
        let sum = self.calc_checksum();
        let offset = self.checksum_offset();
        self.bytes[offset] = sum;
    }

    pub fn is_checksum_valid(&self) -> bool {
        self.bytes.get(self.checksum_offset()) == Some(&self.calc_checksum())
    }

    pub fn heartbeat() -> Self {
        Message::new(OpCode::Heartbeat, &[])
    }

    pub fn get_input_state(address: u16) -> Self {
        Message::new(OpCode::GetInputState, &address.to_le_bytes())
    }

    pub fn set_output_state(address: u16, state: bool) -> Self {
        Message::new(OpCode::SetOutputState, &[address as u8, (address >> 8) as u8, state as u8])
    }
}

/// Reassembles whole frames out of an arbitrary stream of byte chunks
/// (a serial port or TCP socket has no notion of message boundaries).
/// Bytes are buffered until the size byte is known and the declared
/// payload has fully arrived.
#[derive(Debug, Default)]
pub struct FrameReader {
    buf: Vec<u8>,
}

impl FrameReader {
    pub fn new() -> Self {
        FrameReader::default()
    }

    /// Feeds newly received bytes and drains every complete frame they
    /// produced, in arrival order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.buf.extend_from_slice(chunk);
        let mut frames = Vec::new();
        loop {
            if self.buf.len() < 2 {
                break;
            }
            let frame_len = self.buf[1] as usize + 3;
            if self.buf.len() < frame_len {
                break;
            }
            frames.push(self.buf.drain(..frame_len).collect());
        }
        frames
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} [", self.opcode())?;
        for (i, b) in self.bytes.iter().enumerate() {
            if i != 0 {
                write!(f, " ")?;
            }
            write!(f, "{b:02X}")?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// S6: bytes `{0x10, 0x02, 0xAB, 0xCD}` as `{opcode, size, b0, b1}`
    /// checksum to `0x10 ^ 0x02 ^ 0xAB ^ 0xCD = 0x74`.
    #[test]
    fn scenario_s6_diy_checksum() {
        let mut bytes = vec![0x10, 0x02, 0xAB, 0xCD, 0x00];
        let mut msg = Message::from_bytes(std::mem::take(&mut bytes)).unwrap();
        msg.update_checksum();
        assert_eq!(msg.as_bytes()[4], 0x74);
        assert!(msg.is_checksum_valid());

        let mut tampered = msg.clone();
        let last = tampered.bytes.len() - 1;
        tampered.bytes[last] ^= 0xFF;
        assert!(!tampered.is_checksum_valid());
    }

    #[test]
    fn round_trip_update_then_validate() {
        let msg = Message::new(OpCode::GetInputState, &[7, 0]);
        assert!(msg.is_checksum_valid());
    }

    #[test]
    fn heartbeat_has_no_payload() {
        let msg = Message::heartbeat();
        assert_eq!(msg.data_size(), 0);
        assert!(msg.data().is_empty());
    }

    #[test]
    fn frame_reader_reassembles_split_chunks() {
        let msg = Message::new(OpCode::GetInputState, &[7, 0]);
        let bytes = msg.as_bytes().to_vec();
        let mut reader = FrameReader::new();
        assert!(reader.feed(&bytes[..2]).is_empty());
        let frames = reader.feed(&bytes[2..]);
        assert_eq!(frames, vec![bytes]);
    }

    #[test]
    fn frame_reader_handles_back_to_back_frames() {
        let a = Message::heartbeat();
        let b = Message::new(OpCode::GetInputState, &[1, 0]);
        let mut combined = a.as_bytes().to_vec();
        combined.extend_from_slice(b.as_bytes());
        let mut reader = FrameReader::new();
        let frames = reader.feed(&combined);
        assert_eq!(frames, vec![a.as_bytes().to_vec(), b.as_bytes().to_vec()]);
    }
}
