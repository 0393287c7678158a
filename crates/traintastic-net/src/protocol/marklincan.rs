//! Märklin-CAN framing: an 8-byte CAN identifier header (command, hash,
//! response flag) followed by an 8-byte data field. Grounded on
//! `original_source/server/src/hardware/protocol/marklincan/` (message
//! layout) and its `simulationiohandler.cpp` (command dispatch,
//! reply-via-executor-post behaviour reused by [`crate::io::Simulation`]).

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    System,
    Discovery,
    Bind,
    Verify,
    LocomotiveSpeed,
    LocomotiveDirection,
    LocomotiveFunction,
    ReadConfig,
    WriteConfig,
    AccessoryControl,
    Ping,
}

impl Command {
    fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            0x00 => Command::System,
            0x03 => Command::Discovery,
            0x04 => Command::Bind,
            0x05 => Command::Verify,
            0x06 => Command::LocomotiveSpeed,
            0x07 => Command::LocomotiveDirection,
            0x08 => Command::LocomotiveFunction,
            0x0A => Command::ReadConfig,
            0x0B => Command::WriteConfig,
            0x0C => Command::AccessoryControl,
            0x18 => Command::Ping,
            _ => return None,
        })
    }

    fn to_byte(self) -> u8 {
        match self {
            Command::System => 0x00,
            Command::Discovery => 0x03,
            Command::Bind => 0x04,
            Command::Verify => 0x05,
            Command::LocomotiveSpeed => 0x06,
            Command::LocomotiveDirection => 0x07,
            Command::LocomotiveFunction => 0x08,
            Command::ReadConfig => 0x0A,
            Command::WriteConfig => 0x0B,
            Command::AccessoryControl => 0x0C,
            Command::Ping => 0x18,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemSubCommand {
    SystemStop,
    SystemGo,
    SystemHalt,
    LocomotiveEmergencyStop,
    LocomotiveCycleEnd,
    Overload,
    Status,
}

impl SystemSubCommand {
    fn from_byte(b: u8) -> Option<Self> {
        Some(match b {
            0x00 => SystemSubCommand::SystemStop,
            0x01 => SystemSubCommand::SystemGo,
            0x02 => SystemSubCommand::SystemHalt,
            0x03 => SystemSubCommand::LocomotiveEmergencyStop,
            0x04 => SystemSubCommand::LocomotiveCycleEnd,
            0x05 => SystemSubCommand::Overload,
            0x0B => SystemSubCommand::Status,
            _ => return None,
        })
    }

    fn to_byte(self) -> u8 {
        match self {
            SystemSubCommand::SystemStop => 0x00,
            SystemSubCommand::SystemGo => 0x01,
            SystemSubCommand::SystemHalt => 0x02,
            SystemSubCommand::LocomotiveEmergencyStop => 0x03,
            SystemSubCommand::LocomotiveCycleEnd => 0x04,
            SystemSubCommand::Overload => 0x05,
            SystemSubCommand::Status => 0x0B,
        }
    }
}

/// A Märklin-CAN frame: `command`, a response flag, and up to 8 data
/// bytes (`dlc` tells a reader how many of `data` are meaningful — the
/// rest are padding, as on the wire).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: Command,
    pub response: bool,
    pub hash: u16,
    pub dlc: u8,
    pub data: [u8; 8],
}

impl Frame {
    pub fn new(command: Command, data: &[u8]) -> Self {
        let mut bytes = [0u8; 8];
        let dlc = data.len().min(8) as u8;
        bytes[..dlc as usize].copy_from_slice(&data[..dlc as usize]);
        Frame { command, response: false, hash: 0, dlc, data: bytes }
    }

    pub fn response_to(&self, data: &[u8]) -> Self {
        let mut frame = Frame::new(self.command, data);
        frame.response = true;
        frame.hash = self.hash;
        frame
    }

    pub fn system(sub: SystemSubCommand, device_uid: u32, extra: &[u8]) -> Self {
        let mut data = Vec::with_capacity(5 + extra.len());
        data.extend_from_slice(&device_uid.to_be_bytes());
        data.push(sub.to_byte());
        data.extend_from_slice(extra);
        Frame::new(Command::System, &data)
    }

    pub fn system_sub_command(&self) -> Option<SystemSubCommand> {
        if self.command != Command::System || self.dlc < 5 {
            return None;
        }
        SystemSubCommand::from_byte(self.data[4])
    }

    /// Serializes to the 13-byte wire form this crate uses over UDP/TCP:
    /// a 4-byte CAN id (priority nibble folded into the command byte,
    /// response flag, 16-bit hash) followed by `dlc` and 8 data bytes.
    pub fn to_bytes(&self) -> [u8; 13] {
        let mut out = [0u8; 13];
        out[0] = self.command.to_byte() | if self.response { 0x01 } else { 0x00 };
        out[1..3].copy_from_slice(&self.hash.to_be_bytes());
        out[3] = self.dlc;
        out[4..12].copy_from_slice(&self.data);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 12 {
            return None;
        }
        let response = bytes[0] & 0x01 != 0;
        let command = Command::from_byte(bytes[0] & !0x01)?;
        let hash = u16::from_be_bytes([bytes[1], bytes[2]]);
        let dlc = bytes[3].min(8);
        let mut data = [0u8; 8];
        data.copy_from_slice(&bytes[4..12]);
        Some(Frame { command, response, hash, dlc, data })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}{} [", self.command, if self.response { "(r)" } else { "" })?;
        for (i, b) in self.data[..self.dlc as usize].iter().enumerate() {
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

    #[test]
    fn frame_round_trips_through_bytes() {
        let frame = Frame::system(SystemSubCommand::SystemGo, 0x4321_1234, &[]);
        let bytes = frame.to_bytes();
        let parsed = Frame::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.command, Command::System);
        assert_eq!(parsed.system_sub_command(), Some(SystemSubCommand::SystemGo));
    }

    #[test]
    fn response_flag_round_trips() {
        let request = Frame::new(Command::Ping, &[]);
        let response = request.response_to(&[1, 2, 3]);
        let bytes = response.to_bytes();
        let parsed = Frame::from_bytes(&bytes).unwrap();
        assert!(parsed.response);
        assert_eq!(&parsed.data[..3], &[1, 2, 3]);
    }

    #[test]
    fn short_buffer_is_rejected() {
        assert!(Frame::from_bytes(&[0; 4]).is_none());
    }
}
