//! Data types shared between the CLI surface and the session state (spec §3).

use std::net::Ipv6Addr;

use bitflags::bitflags;
use clap::ValueEnum;

/// Module operating mode, set at startup and never mutated during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Coordinator,
    Router,
    Commissioning,
}

impl Mode {
    pub const fn wire_value(self) -> u8 {
        match self {
            Mode::Coordinator => 0,
            Mode::Router => 1,
            Mode::Commissioning => 2,
        }
    }
}

/// Regulatory region for the RF front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Region {
    Europe,
    Usa,
    Japan,
}

impl Region {
    pub const fn wire_value(self) -> u8 {
        match self {
            Region::Europe => 0,
            Region::Usa => 1,
            Region::Japan => 2,
        }
    }

    pub const fn from_wire(value: u8) -> Option<Self> {
        Some(match value {
            0 => Region::Europe,
            1 => Region::Usa,
            2 => Region::Japan,
            _ => return None,
        })
    }
}

/// RF front-end selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FrontEnd {
    Standard,
    HighPower,
    Etsi,
}

impl FrontEnd {
    pub const fn wire_value(self) -> u8 {
        match self {
            FrontEnd::Standard => 0,
            FrontEnd::HighPower => 1,
            FrontEnd::Etsi => 2,
        }
    }
}

/// Authentication scheme carried in a SECURITY frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AuthScheme {
    None,
    RadiusPap,
}

impl AuthScheme {
    pub const fn wire_value(self) -> u32 {
        match self {
            AuthScheme::None => 0,
            AuthScheme::RadiusPap => 1,
        }
    }

    pub const fn from_wire(value: u32) -> Option<Self> {
        Some(match value {
            0 => AuthScheme::None,
            1 => AuthScheme::RadiusPap,
            _ => return None,
        })
    }
}

/// A peer firmware version, `major.minor.rev`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PeerVersion {
    pub major: u8,
    pub minor: u8,
    pub rev: u8,
}

impl PeerVersion {
    pub const fn new(major: u8, minor: u8, rev: u8) -> Self {
        PeerVersion { major, minor, rev }
    }

    pub fn at_least(self, major: u8, minor: u8, rev: u8) -> bool {
        self >= PeerVersion::new(major, minor, rev)
    }
}

bitflags! {
    /// Capability flags derived from the peer's reported firmware version.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u8 {
        const VERSION_KNOWN = 1 << 0;
        const ADDRESS_KNOWN = 1 << 1;
        const CONFIG_KNOWN  = 1 << 2;
        const SUPPORTS_PING = 1 << 3;
    }
}

/// Wireless network configuration, as negotiated with the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkConfig {
    pub region: Region,
    pub channel: u8,
    pub pan_id: u16,
    pub network_id: u32,
    pub prefix: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            region: Region::Europe,
            channel: 0,
            pan_id: 0,
            network_id: 0,
            prefix: 0,
        }
    }
}

impl NetworkConfig {
    /// The prefix rendered as the upper 8 bytes of an IPv6 address, matching
    /// how the original daemon displayed and forwarded it to its config hook.
    pub fn prefix_address(&self) -> Ipv6Addr {
        let hi = self.prefix.to_be_bytes();
        let mut octets = [0u8; 16];
        octets[..8].copy_from_slice(&hi);
        Ipv6Addr::from(octets)
    }
}

/// Security configuration, present only once a SECURITY frame has arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    pub key: [u8; 16],
    pub auth_scheme: AuthScheme,
    pub auth_data: Vec<u8>,
}

impl SecurityConfig {
    /// The key rendered as an IPv6 address, matching the original daemon's
    /// choice of `inet_ntop` to format the raw 128-bit value.
    pub fn key_address(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.key)
    }
}
