//! Address persistence (spec.md §10): the module's last-known IPv6 address
//! is written to a well-known path so it survives a daemon restart and can
//! be read by other tools without asking the module again.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::net::Ipv6Addr;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

fn path_for(interface: &str) -> PathBuf {
    PathBuf::from(format!("/tmp/6LoWPANd.{interface}"))
}

/// Overwrites the persisted address for `interface`, creating the file with
/// owner-only permissions if it doesn't already exist.
pub fn write_address(interface: &str, addr: Ipv6Addr) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path_for(interface))?;
    writeln!(file, "{addr}")
}
