//! Bring-up state machine (C5, spec.md §4.5): the stage graph, per-stage
//! retry policy, liveness watchdog, and periodic ping. Grounded on the
//! state-dispatch and retry-counter bookkeeping in
//! `task/host-sp-comms/src/main.rs`'s main loop.

use log::{info, warn};

use crate::codec::ByteSink;
use crate::session::Session;
use crate::types::Capabilities;

const VERSION_RETRY_LIMIT: u32 = 3;
const ADDRESS_RETRY_LIMIT: u32 = 6;
const SILENCE_TIMEOUT_SECS: u64 = 60;
const PING_PERIOD_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DetermineVersion,
    ConfigureNetwork,
    ConfigureSecurity,
    ConfigureProfile,
    StartModule,
    ConfigureFrontend,
    DetermineConfiguration,
    DetermineAddress,
    ActivityLed,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    CommsFailed,
}

impl<W: ByteSink> Session<W> {
    /// One iteration of the state machine, called once per event-loop
    /// wakeup. `now` is a monotonic wall-clock second counter.
    pub fn tick(&mut self, timeout_fired: bool, now: u64) -> std::io::Result<TickOutcome> {
        if self.capabilities.contains(Capabilities::VERSION_KNOWN)
            && self.capabilities.contains(Capabilities::SUPPORTS_PING)
            && now.saturating_sub(self.last_rx_at) > SILENCE_TIMEOUT_SECS
        {
            warn!("no traffic from module in over {SILENCE_TIMEOUT_SECS}s, declaring comms failed");
            return Ok(TickOutcome::CommsFailed);
        }

        match self.stage {
            Stage::DetermineVersion => self.tick_determine_version(timeout_fired)?,
            Stage::ConfigureNetwork => {
                self.send_config()?;
                self.advance(Stage::ConfigureSecurity);
            }
            Stage::ConfigureSecurity => {
                self.send_security_config()?;
                let next = if self.peer_supports(1, 1, 0) {
                    Stage::ConfigureProfile
                } else {
                    Stage::StartModule
                };
                self.advance(next);
            }
            Stage::ConfigureProfile => {
                self.send_profile()?;
                self.advance(Stage::StartModule);
            }
            Stage::StartModule => {
                self.send_run()?;
                let next = if self.peer_supports(1, 4, 0) {
                    Stage::ConfigureFrontend
                } else if self.peer_supports(1, 1, 0) {
                    Stage::DetermineConfiguration
                } else {
                    Stage::DetermineAddress
                };
                self.advance(next);
            }
            Stage::ConfigureFrontend => {
                self.send_frontend_config()?;
                self.advance(Stage::DetermineConfiguration);
            }
            Stage::DetermineConfiguration => {
                if self.capabilities.contains(Capabilities::CONFIG_KNOWN) {
                    self.advance(Stage::DetermineAddress);
                } else if timeout_fired {
                    self.send_config_request()?;
                }
            }
            Stage::DetermineAddress => self.tick_determine_address(timeout_fired)?,
            Stage::ActivityLed => {
                if self.peer_supports(1, 3, 0) {
                    self.send_activity_led()?;
                }
                self.advance(Stage::Running);
            }
            Stage::Running => {
                if self.capabilities.contains(Capabilities::SUPPORTS_PING)
                    && now.saturating_sub(self.last_ping_at) > PING_PERIOD_SECS
                {
                    self.send_ping()?;
                    self.last_ping_at = now;
                }
            }
        }

        Ok(TickOutcome::Continue)
    }

    fn tick_determine_version(&mut self, timeout_fired: bool) -> std::io::Result<()> {
        if self.capabilities.contains(Capabilities::VERSION_KNOWN) {
            self.advance(Stage::ConfigureNetwork);
            return Ok(());
        }
        if timeout_fired {
            self.retry_count += 1;
            if self.retry_count > VERSION_RETRY_LIMIT {
                info!("no VERSION reply after {VERSION_RETRY_LIMIT} retries, proceeding anyway");
                self.advance(Stage::ConfigureNetwork);
            } else {
                self.send_version_request()?;
            }
        }
        Ok(())
    }

    fn tick_determine_address(&mut self, timeout_fired: bool) -> std::io::Result<()> {
        if self.capabilities.contains(Capabilities::ADDRESS_KNOWN) {
            self.advance(Stage::ActivityLed);
            return Ok(());
        }
        if timeout_fired {
            self.retry_count += 1;
            if self.retry_count >= ADDRESS_RETRY_LIMIT {
                warn!("no ADDR reply after {ADDRESS_RETRY_LIMIT} retries, resetting module");
                self.send_reset()?;
                self.restart();
            } else {
                self.send_addr_request()?;
            }
        }
        Ok(())
    }

    fn advance(&mut self, stage: Stage) {
        info!("bring-up stage {:?} -> {:?}", self.stage, stage);
        self.stage = stage;
        self.retry_count = 0;
    }

    /// Declares the link dead and restarts bring-up from the top, matching
    /// the session reset the supervisor performs on `COMMS_FAILED`.
    pub fn restart(&mut self) {
        self.peer_version = None;
        self.capabilities = Capabilities::empty();
        self.stage = Stage::DetermineVersion;
        self.retry_count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FrontEnd, Mode, NetworkConfig};

    fn new_session() -> Session<Vec<u8>> {
        Session::new(
            Vec::new(),
            "tun0".to_string(),
            None,
            Mode::Coordinator,
            FrontEnd::Standard,
            false,
            None,
            0,
            NetworkConfig::default(),
            None,
        )
    }

    #[test]
    fn monotonic_stage_trace_through_full_bring_up() {
        let mut session = new_session();
        let mut now = 0u64;

        assert_eq!(session.stage, Stage::DetermineVersion);
        session.on_message(1, &[1, 1, 0], now); // VERSION 1.1.0
        session.tick(false, now).unwrap();
        assert_eq!(session.stage, Stage::ConfigureNetwork);

        session.tick(false, now).unwrap();
        assert_eq!(session.stage, Stage::ConfigureSecurity);

        session.tick(false, now).unwrap();
        assert_eq!(session.stage, Stage::ConfigureProfile);

        session.tick(false, now).unwrap();
        assert_eq!(session.stage, Stage::StartModule);

        session.tick(false, now).unwrap();
        assert_eq!(session.stage, Stage::DetermineConfiguration);

        let mut config_payload = vec![0u8; 16];
        config_payload[1] = 11; // channel
        now += 1;
        session.on_message(102, &config_payload, now);
        session.tick(false, now).unwrap();
        assert_eq!(session.stage, Stage::DetermineAddress);

        let addr = std::net::Ipv6Addr::new(0xfd04, 0x0bd3, 0x80e8, 2, 0, 0, 0, 1);
        now += 1;
        session.on_message(105, &addr.octets(), now);
        session.tick(false, now).unwrap();
        assert_eq!(session.stage, Stage::ActivityLed);

        session.tick(false, now).unwrap();
        assert_eq!(session.stage, Stage::Running);
    }

    #[test]
    fn config_3_byte_payload_is_treated_as_version() {
        let mut session = new_session();
        session.on_message(102, &[1, 4, 0], 0);
        assert_eq!(session.peer_version, Some(crate::types::PeerVersion::new(1, 4, 0)));
        assert!(!session.capabilities.contains(Capabilities::CONFIG_KNOWN));
    }

    #[test]
    fn liveness_watchdog_fires_after_60_seconds_of_silence() {
        let mut session = new_session();
        session.on_message(1, &[1, 1, 0], 0);
        assert_eq!(session.tick(false, 0).unwrap(), TickOutcome::Continue);
        assert_eq!(session.tick(true, 61).unwrap(), TickOutcome::CommsFailed);
    }

    #[test]
    fn address_retry_resets_after_six_timeouts() {
        let mut session = new_session();
        session.stage = Stage::DetermineAddress;
        session.peer_version = Some(crate::types::PeerVersion::new(1, 1, 0));
        session.capabilities.insert(Capabilities::VERSION_KNOWN);
        session.capabilities.insert(Capabilities::SUPPORTS_PING);

        for now in 1..=5u64 {
            session.last_rx_at = now; // keep the watchdog from tripping first
            assert_eq!(session.tick(true, now).unwrap(), TickOutcome::Continue);
            assert_eq!(session.stage, Stage::DetermineAddress);
        }
        session.last_rx_at = 6;
        assert_eq!(session.tick(true, 6).unwrap(), TickOutcome::Continue);
        assert_eq!(session.stage, Stage::DetermineVersion);
        assert_eq!(session.retry_count, 0);
    }
}
