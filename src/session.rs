//! Module session (C4, spec.md §3/§4.4): the data the bring-up state
//! machine acts on, its incoming-message handlers, and the outbound frame
//! builders the state machine (`src/stage.rs`) drives. Grounded on the
//! tagged-message/capability-tracking shape of `HostToSp`/`SpToHost` and
//! `Status` in `lib/host-sp-messages/src/lib.rs`.

use std::net::Ipv6Addr;
use std::path::PathBuf;

use log::{debug, info, warn};

use crate::codec::{write_message, ByteSink};
use crate::hook;
use crate::message::MessageType;
use crate::persist;
use crate::stage::Stage;
use crate::types::{AuthScheme, Capabilities, FrontEnd, Mode, NetworkConfig, PeerVersion, Region, SecurityConfig};

pub struct Session<W> {
    sink: W,
    interface: String,
    confignotify: Option<PathBuf>,

    pub peer_version: Option<PeerVersion>,
    pub capabilities: Capabilities,
    pub stage: Stage,
    pub network_config: NetworkConfig,
    pub security_config: Option<SecurityConfig>,
    pub mode: Mode,
    pub front_end: FrontEnd,
    pub antenna_diversity: bool,
    pub activity_led: Option<u8>,
    pub profile: u8,

    pub last_rx_at: u64,
    pub last_ping_at: u64,
    pub(crate) retry_count: u32,
}

impl<W: ByteSink> Session<W> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sink: W,
        interface: String,
        confignotify: Option<PathBuf>,
        mode: Mode,
        front_end: FrontEnd,
        antenna_diversity: bool,
        activity_led: Option<u8>,
        profile: u8,
        network_config: NetworkConfig,
        security_config: Option<SecurityConfig>,
    ) -> Self {
        Session {
            sink,
            interface,
            confignotify,
            peer_version: None,
            capabilities: Capabilities::empty(),
            stage: Stage::DetermineVersion,
            network_config,
            security_config,
            mode,
            front_end,
            antenna_diversity,
            activity_led,
            profile,
            last_rx_at: 0,
            last_ping_at: 0,
            retry_count: 0,
        }
    }

    fn send(&mut self, msg_type: MessageType, payload: &[u8]) -> std::io::Result<()> {
        write_message(&mut self.sink, msg_type.code(), payload)
    }

    pub fn send_version_request(&mut self) -> std::io::Result<()> {
        self.send(MessageType::VersionRequest, &[])
    }

    pub fn send_config(&mut self) -> std::io::Result<()> {
        let cfg = self.network_config;
        let mut payload = Vec::with_capacity(16);
        payload.push(cfg.region.wire_value());
        payload.push(cfg.channel);
        payload.extend_from_slice(&cfg.pan_id.to_be_bytes());
        payload.extend_from_slice(&cfg.network_id.to_be_bytes());
        let prefix = cfg.prefix.to_be_bytes();
        payload.extend_from_slice(&prefix[..4]); // prefix_hi
        payload.extend_from_slice(&prefix[4..]); // prefix_lo
        self.send(MessageType::Config, &payload)
    }

    pub fn send_security_config(&mut self) -> std::io::Result<()> {
        let Some(sec) = self.security_config.clone() else {
            return Ok(());
        };
        let mut payload = Vec::with_capacity(16 + 4 + sec.auth_data.len());
        payload.extend_from_slice(&sec.key);
        payload.extend_from_slice(&sec.auth_scheme.wire_value().to_be_bytes());
        payload.extend_from_slice(&sec.auth_data);
        self.send(MessageType::Security, &payload)
    }

    pub fn send_profile(&mut self) -> std::io::Result<()> {
        let profile = self.profile;
        self.send(MessageType::Profile, &[profile])
    }

    pub fn send_frontend_config(&mut self) -> std::io::Result<()> {
        let front_end = self.front_end;
        self.send(MessageType::SetRadioFrontend, &[front_end.wire_value()])?;
        if self.antenna_diversity {
            self.send(MessageType::EnableDiversity, &[])?;
        }
        Ok(())
    }

    pub fn send_run(&mut self) -> std::io::Result<()> {
        let msg = match self.mode {
            Mode::Coordinator => MessageType::RunCoordinator,
            Mode::Router => MessageType::RunRouter,
            Mode::Commissioning => MessageType::RunCommissioning,
        };
        self.send(msg, &[])
    }

    pub fn send_reset(&mut self) -> std::io::Result<()> {
        self.send(MessageType::Reset, &[])
    }

    pub fn send_addr_request(&mut self) -> std::io::Result<()> {
        self.send(MessageType::Addr, &[])
    }

    pub fn send_config_request(&mut self) -> std::io::Result<()> {
        self.send(MessageType::ConfigRequest, &[])
    }

    pub fn send_activity_led(&mut self) -> std::io::Result<()> {
        if let Some(dio) = self.activity_led {
            self.send(MessageType::ActivityLed, &[dio])?;
        }
        Ok(())
    }

    pub fn send_ipv6(&mut self, payload: &[u8]) -> std::io::Result<()> {
        self.send(MessageType::Ipv6, payload)
    }

    pub fn send_ping(&mut self) -> std::io::Result<()> {
        self.send(MessageType::Ping, &[])
    }

    /// Dispatches one validated incoming frame. `now` is the event loop's
    /// current wall-clock second count, used to refresh liveness.
    pub fn on_message(&mut self, msg_type: u8, payload: &[u8], now: u64) {
        self.last_rx_at = now;

        let Some(msg) = MessageType::from_code(msg_type) else {
            debug!("ignoring unknown message type {msg_type}");
            return;
        };

        match msg {
            MessageType::Version => self.handle_version(payload),
            MessageType::Config => {
                if payload.len() == 3 {
                    // Legacy quirk: a 3-byte CONFIG is actually a VERSION.
                    self.handle_version(payload);
                } else {
                    self.handle_config(payload);
                }
            }
            MessageType::Security => self.handle_security(payload),
            MessageType::ConfigRequest => {
                self.stage = Stage::ConfigureNetwork;
                self.retry_count = 0;
            }
            MessageType::Addr => self.handle_addr(payload),
            MessageType::Log => self.handle_log(payload),
            MessageType::Ping => {}
            MessageType::Ipv6 => { /* forwarded by the event loop, see tun.rs wiring */ }
            _ => {}
        }
    }

    fn handle_version(&mut self, payload: &[u8]) {
        if payload.len() < 3 {
            warn!("VERSION frame too short: {} bytes", payload.len());
            return;
        }
        let version = PeerVersion::new(payload[0], payload[1], payload[2]);
        info!("peer firmware version {}.{}.{}", version.major, version.minor, version.rev);
        self.peer_version = Some(version);
        self.capabilities.insert(Capabilities::VERSION_KNOWN);
        if version.at_least(1, 1, 0) {
            self.capabilities.insert(Capabilities::SUPPORTS_PING);
        }
    }

    fn handle_config(&mut self, payload: &[u8]) {
        if payload.len() != 16 {
            warn!("CONFIG frame has unexpected length {}", payload.len());
            return;
        }
        if !self.peer_supports(1, 1, 0) {
            debug!("ignoring CONFIG frame from a peer below 1.1.0");
            return;
        }
        let region = match Region::from_wire(payload[0]) {
            Some(r) => r,
            None => {
                warn!("CONFIG frame names unknown region {}", payload[0]);
                return;
            }
        };
        let channel = payload[1];
        let pan_id = u16::from_be_bytes([payload[2], payload[3]]);
        let network_id = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);

        let new_config = NetworkConfig {
            region,
            channel,
            pan_id,
            network_id,
            prefix: decode_prefix(payload),
        };

        let changed = new_config != self.network_config;
        self.network_config = new_config;
        self.capabilities.insert(Capabilities::CONFIG_KNOWN);

        if changed {
            info!("module reported new network configuration: {new_config:?}");
            if let Some(exe) = self.confignotify.clone() {
                hook::notify(exe, new_config, self.security_config.clone());
            }
        }
    }

    fn handle_security(&mut self, payload: &[u8]) {
        if payload.len() < 20 {
            warn!("SECURITY frame too short: {} bytes", payload.len());
            return;
        }
        let mut key = [0u8; 16];
        key.copy_from_slice(&payload[..16]);
        let auth_scheme_value = u32::from_be_bytes([payload[16], payload[17], payload[18], payload[19]]);
        let auth_scheme = AuthScheme::from_wire(auth_scheme_value).unwrap_or(AuthScheme::None);
        let auth_data = payload[20..].to_vec();

        self.security_config = Some(SecurityConfig { key, auth_scheme, auth_data });
    }

    fn handle_addr(&mut self, payload: &[u8]) {
        if payload.len() != 16 {
            warn!("ADDR frame has unexpected length {}", payload.len());
            return;
        }
        let mut octets = [0u8; 16];
        octets.copy_from_slice(payload);
        let addr = Ipv6Addr::from(octets);
        info!("learned module address {addr}");
        if let Err(e) = persist::write_address(&self.interface, addr) {
            warn!("couldn't persist module address: {e}");
        }
        self.capabilities.insert(Capabilities::ADDRESS_KNOWN);
    }

    fn handle_log(&mut self, payload: &[u8]) {
        let Some((&priority, rest)) = payload.split_first() else {
            return;
        };
        let line_len = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let line = String::from_utf8_lossy(&rest[..line_len]);
        match priority {
            0..=3 => log::error!("module: {line}"),
            4..=5 => warn!("module: {line}"),
            6 => info!("module: {line}"),
            _ => debug!("module: {line}"),
        }
    }

    pub fn peer_supports(&self, major: u8, minor: u8, rev: u8) -> bool {
        self.peer_version.is_some_and(|v| v.at_least(major, minor, rev))
    }

    /// Exposes the underlying transport so the event loop can poll and read
    /// from the same fd the session writes to.
    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }
}

/// Reconstructs the full 64-bit prefix from CONFIG's two big-endian halves.
fn decode_prefix(payload: &[u8]) -> u64 {
    let hi = u32::from_be_bytes([payload[8], payload[9], payload[10], payload[11]]);
    let lo = u32::from_be_bytes([payload[12], payload[13], payload[14], payload[15]]);
    ((hi as u64) << 32) | lo as u64
}
