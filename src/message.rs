//! The 17 opcodes carried in a frame's `type` field.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    VersionRequest,
    Version,
    Ipv4,
    Ipv6,
    Config,
    RunCoordinator,
    Reset,
    Addr,
    ConfigRequest,
    Security,
    Log,
    Ping,
    Profile,
    RunRouter,
    RunCommissioning,
    ActivityLed,
    SetRadioFrontend,
    EnableDiversity,
}

impl MessageType {
    pub const fn code(self) -> u8 {
        match self {
            MessageType::VersionRequest => 0,
            MessageType::Version => 1,
            MessageType::Ipv4 => 100,
            MessageType::Ipv6 => 101,
            MessageType::Config => 102,
            MessageType::RunCoordinator => 103,
            MessageType::Reset => 104,
            MessageType::Addr => 105,
            MessageType::ConfigRequest => 106,
            MessageType::Security => 107,
            MessageType::Log => 108,
            MessageType::Ping => 109,
            MessageType::Profile => 110,
            MessageType::RunRouter => 111,
            MessageType::RunCommissioning => 112,
            MessageType::ActivityLed => 113,
            MessageType::SetRadioFrontend => 114,
            MessageType::EnableDiversity => 115,
        }
    }

    pub const fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => MessageType::VersionRequest,
            1 => MessageType::Version,
            100 => MessageType::Ipv4,
            101 => MessageType::Ipv6,
            102 => MessageType::Config,
            103 => MessageType::RunCoordinator,
            104 => MessageType::Reset,
            105 => MessageType::Addr,
            106 => MessageType::ConfigRequest,
            107 => MessageType::Security,
            108 => MessageType::Log,
            109 => MessageType::Ping,
            110 => MessageType::Profile,
            111 => MessageType::RunRouter,
            112 => MessageType::RunCommissioning,
            113 => MessageType::ActivityLed,
            114 => MessageType::SetRadioFrontend,
            115 => MessageType::EnableDiversity,
            _ => return None,
        })
    }
}

impl From<MessageType> for u8 {
    fn from(t: MessageType) -> u8 {
        t.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_opcode_round_trips_through_its_code() {
        let all = [
            MessageType::VersionRequest,
            MessageType::Version,
            MessageType::Ipv4,
            MessageType::Ipv6,
            MessageType::Config,
            MessageType::RunCoordinator,
            MessageType::Reset,
            MessageType::Addr,
            MessageType::ConfigRequest,
            MessageType::Security,
            MessageType::Log,
            MessageType::Ping,
            MessageType::Profile,
            MessageType::RunRouter,
            MessageType::RunCommissioning,
            MessageType::ActivityLed,
            MessageType::SetRadioFrontend,
            MessageType::EnableDiversity,
        ];
        for t in all {
            assert_eq!(MessageType::from_code(t.code()), Some(t));
        }
    }
}
