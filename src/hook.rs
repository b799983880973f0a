//! Configuration-changed notification (spec.md §4.4/§9): fires the
//! operator-supplied executable whenever the module reports new network or
//! security parameters, passing everything as an explicit argv so no shell
//! ever parses attacker-influenced values.

use std::path::PathBuf;
use std::process::Command;

use log::warn;

use crate::types::{NetworkConfig, SecurityConfig};

/// Spawns the hook on a detached worker thread so a slow or hung executable
/// never stalls the event loop.
pub fn notify(executable: PathBuf, network: NetworkConfig, security: Option<SecurityConfig>) {
    std::thread::spawn(move || {
        let mut cmd = Command::new(&executable);
        cmd.arg("--channel").arg(network.channel.to_string());
        cmd.arg("--pan").arg(network.pan_id.to_string());
        cmd.arg("--network").arg(network.network_id.to_string());
        cmd.arg("--prefix").arg(network.prefix_address().to_string());
        if let Some(sec) = security {
            cmd.arg("--key").arg(sec.key_address().to_string());
        }

        match cmd.status() {
            Ok(status) if !status.success() => {
                warn!(
                    "config-changed hook {:?} exited with {status}",
                    executable
                );
            }
            Err(e) => warn!("couldn't run config-changed hook {:?}: {e}", executable),
            Ok(_) => {}
        }
    });
}
