//! End-to-end bring-up trace driven entirely through `Session`/`Stage`
//! with an in-memory `Vec<u8>` transport — no real serial or tun I/O.

use sixlowpand::session::Session;
use sixlowpand::stage::{Stage, TickOutcome};
use sixlowpand::types::{Capabilities, FrontEnd, Mode, NetworkConfig, PeerVersion};

fn new_session() -> Session<Vec<u8>> {
    Session::new(
        Vec::new(),
        "tun-test".to_string(),
        None,
        Mode::Router,
        FrontEnd::Standard,
        false,
        Some(3),
        7,
        NetworkConfig::default(),
        None,
    )
}

#[test]
fn full_bring_up_reaches_running_and_starts_pinging() {
    let mut session = new_session();
    let mut now = 0u64;

    session.on_message(1, &[1, 4, 0], now); // VERSION 1.4.0 -> full feature set
    assert_eq!(session.peer_version, Some(PeerVersion::new(1, 4, 0)));
    assert!(session.capabilities.contains(Capabilities::SUPPORTS_PING));

    // DETERMINE_VERSION -> CONFIGURE_NETWORK
    assert_eq!(session.tick(false, now).unwrap(), TickOutcome::Continue);
    assert_eq!(session.stage, Stage::ConfigureNetwork);

    // CONFIGURE_NETWORK -> CONFIGURE_SECURITY
    session.tick(false, now).unwrap();
    assert_eq!(session.stage, Stage::ConfigureSecurity);

    // CONFIGURE_SECURITY -> CONFIGURE_PROFILE (peer >= 1.1.0)
    session.tick(false, now).unwrap();
    assert_eq!(session.stage, Stage::ConfigureProfile);

    // CONFIGURE_PROFILE -> START_MODULE
    session.tick(false, now).unwrap();
    assert_eq!(session.stage, Stage::StartModule);

    // START_MODULE -> CONFIGURE_FRONTEND (peer >= 1.4.0)
    session.tick(false, now).unwrap();
    assert_eq!(session.stage, Stage::ConfigureFrontend);

    // CONFIGURE_FRONTEND -> DETERMINE_CONFIGURATION
    session.tick(false, now).unwrap();
    assert_eq!(session.stage, Stage::DetermineConfiguration);

    now += 1;
    let mut config_payload = vec![0u8; 16];
    config_payload[1] = 15; // channel
    session.on_message(102, &config_payload, now);
    session.tick(false, now).unwrap();
    assert_eq!(session.stage, Stage::DetermineAddress);

    now += 1;
    let addr = std::net::Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1);
    session.on_message(105, &addr.octets(), now);
    session.tick(false, now).unwrap();
    assert_eq!(session.stage, Stage::ActivityLed);

    // ACTIVITY_LED -> RUNNING
    session.tick(false, now).unwrap();
    assert_eq!(session.stage, Stage::Running);

    // In RUNNING, once 10s pass without a ping, one is emitted.
    let before = session.sink_mut().len();
    now += 11;
    session.tick(true, now).unwrap();
    assert!(session.sink_mut().len() > before, "expected a PING frame to be written");
}

#[test]
fn peer_without_version_reply_still_proceeds_after_three_retries() {
    let mut session = new_session();
    assert_eq!(session.stage, Stage::DetermineVersion);

    for now in 1..=3u64 {
        assert_eq!(session.tick(true, now).unwrap(), TickOutcome::Continue);
        assert_eq!(session.stage, Stage::DetermineVersion);
    }
    // A fourth timeout exceeds the retry bound and gives up waiting.
    assert_eq!(session.tick(true, 4).unwrap(), TickOutcome::Continue);
    assert_eq!(session.stage, Stage::ConfigureNetwork);
}

#[test]
fn config_request_from_peer_forces_renegotiation() {
    let mut session = new_session();
    session.stage = Stage::Running;
    session.on_message(106, &[], 0); // CONFIG_REQUEST
    assert_eq!(session.stage, Stage::ConfigureNetwork);
}
