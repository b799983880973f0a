//! Fatal error taxonomy. Transient codec/I-O conditions are handled in
//! place and logged; only startup failures and unrecoverable I/O end up
//! here and propagate out of `main` as a non-zero exit status.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("baud rate {0} is not supported by this host")]
    UnsupportedBaud(u32),

    #[error("couldn't open serial device {0:?}: {1}")]
    SerialOpen(PathBuf, #[source] std::io::Error),

    #[error("error getting/setting serial port attributes: {0}")]
    SerialConfig(#[source] nix::Error),

    #[error("error writing to module after repeated back-pressure: {0}")]
    SerialWriteStalled(#[source] std::io::Error),

    #[error("couldn't open /dev/net/tun: {0}")]
    TunOpen(#[source] std::io::Error),

    #[error("couldn't configure tun device: {0}")]
    TunConfigure(#[source] std::io::Error),

    #[error("communications with module lost")]
    CommsFailed,
}
