//! Command-line surface (spec.md §6, `original_source/Source/main.c`'s
//! `getopt_long` table translated flag-for-flag to `clap`).

use std::path::PathBuf;

use clap::Parser;

use crate::types::{AuthScheme, FrontEnd, Mode, Region};

#[derive(Debug, Parser)]
#[command(name = "6lowpand", about = "Bridge a host IPv6 stack to a 6LoWPAN border-router module")]
pub struct Config {
    /// Serial device the module is attached to.
    #[arg(short, long)]
    pub serial: PathBuf,

    /// Baud rate for the serial link.
    #[arg(short = 'B', long, default_value_t = 38400)]
    pub baud: u32,

    /// Name of the tun interface to create.
    #[arg(short = 'I', long, default_value = "tun0")]
    pub interface: String,

    /// Stay attached to the controlling terminal instead of daemonizing.
    #[arg(short, long)]
    pub foreground: bool,

    /// Syslog priority floor (0=EMERG .. 7=DEBUG).
    #[arg(short, long, default_value_t = 6)]
    pub verbosity: u8,

    /// Issue a RESET to the module before bring-up.
    #[arg(short = 'R', long)]
    pub reset: bool,

    /// Executable invoked with `--channel/--pan/--network/--prefix[/--key]`
    /// whenever the module reports a changed network configuration.
    #[arg(short = 'C', long)]
    pub confignotify: Option<PathBuf>,

    /// DIO index driving the activity LED.
    #[arg(short = 'A', long)]
    pub activityled: Option<u8>,

    /// RF front-end selection.
    #[arg(short = 'F', long, value_enum, default_value = "standard")]
    pub frontend: FrontEnd,

    /// Enable antenna diversity.
    #[arg(short = 'D', long)]
    pub diversity: bool,

    /// Module operating mode.
    #[arg(short, long, value_enum, default_value = "coordinator")]
    pub mode: Mode,

    /// Regulatory region.
    #[arg(short, long, value_enum, default_value = "europe")]
    pub region: Region,

    /// Channel, 0 for auto or 11..26.
    #[arg(short, long, default_value_t = 0)]
    pub channel: u8,

    /// PAN ID.
    #[arg(short, long, default_value_t = 0)]
    pub pan: u16,

    /// Network (JenNet) ID.
    #[arg(short = 'j', long, default_value_t = 0)]
    pub network: u32,

    /// Profile byte.
    #[arg(short = 'P', long, default_value_t = 0)]
    pub profile: u8,

    /// Network prefix, the upper 8 bytes of an IPv6 address.
    #[arg(short = '6', long, value_parser = parse_prefix, default_value_t = 0)]
    pub prefix: u64,

    /// 128-bit security key, hex-encoded.
    #[arg(short, long, value_parser = parse_key)]
    pub key: Option<[u8; 16]>,

    /// Security authentication scheme.
    #[arg(short, long, value_enum, default_value = "none")]
    pub authscheme: AuthScheme,

    /// RADIUS server address, required when `--authscheme=radius-pap`.
    #[arg(short = 'i', long)]
    pub radiusip: Option<std::net::Ipv6Addr>,
}

fn parse_key(s: &str) -> Result<[u8; 16], String> {
    let bytes = hex::decode(s).map_err(|e| format!("invalid hex key: {e}"))?;
    if bytes.len() != 16 {
        return Err(format!("key must be 16 bytes, got {}", bytes.len()));
    }
    let mut key = [0u8; 16];
    key.copy_from_slice(&bytes);
    Ok(key)
}

fn parse_prefix(s: &str) -> Result<u64, String> {
    if let Some(hex_str) = s.strip_prefix("0x") {
        return u64::from_str_radix(hex_str, 16).map_err(|e| e.to_string());
    }
    if let Ok(addr) = s.parse::<std::net::Ipv6Addr>() {
        let octets = addr.octets();
        let mut hi = [0u8; 8];
        hi.copy_from_slice(&octets[..8]);
        return Ok(u64::from_be_bytes(hi));
    }
    s.parse::<u64>().map_err(|e| e.to_string())
}

impl Config {
    pub fn security_config(&self) -> Option<crate::types::SecurityConfig> {
        let key = self.key?;
        let auth_data = match self.authscheme {
            AuthScheme::None => Vec::new(),
            AuthScheme::RadiusPap => self
                .radiusip
                .map(|ip| ip.octets().to_vec())
                .unwrap_or_default(),
        };
        Some(crate::types::SecurityConfig {
            key,
            auth_scheme: self.authscheme,
            auth_data,
        })
    }

    pub fn network_config(&self) -> crate::types::NetworkConfig {
        crate::types::NetworkConfig {
            region: self.region,
            channel: self.channel,
            pan_id: self.pan,
            network_id: self.network,
            prefix: self.prefix,
        }
    }
}
