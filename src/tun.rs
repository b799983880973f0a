//! The tun endpoint (spec.md §4.3): a point-to-point IPv6 interface backed
//! by `/dev/net/tun`, configured with a raw `TUNSETIFF` ioctl rather than a
//! higher-level crate, matching the original daemon's direct use of the
//! kernel tun/tap ABI.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;

use crate::error::DaemonError;

const TUN_DEV_PATH: &str = "/dev/net/tun";

const IFF_TUN: libc::c_short = 0x0001;
const IFF_NO_PI: libc::c_short = 0x1000;

// _IOW('T', 202, int), computed the same way `<linux/tun.h>` does.
const TUNSETIFF: libc::c_ulong = 0x4004_54ca;

#[repr(C)]
struct IfReq {
    name: [libc::c_char; libc::IFNAMSIZ],
    flags: libc::c_short,
    _pad: [u8; 22],
}

pub struct TunDevice {
    file: File,
    name: String,
}

impl TunDevice {
    /// Opens `/dev/net/tun`, requests a `TUN`/no-packet-info interface named
    /// `requested_name`, and leaves the fd in non-blocking mode. The kernel
    /// may return a different name (e.g. if a numeric suffix was omitted);
    /// the name actually granted is what `name()` reports back.
    pub fn open(requested_name: &str) -> Result<Self, DaemonError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(TUN_DEV_PATH)
            .map_err(DaemonError::TunOpen)?;

        let mut req = IfReq {
            name: [0; libc::IFNAMSIZ],
            flags: IFF_TUN | IFF_NO_PI,
            _pad: [0; 22],
        };
        if requested_name.len() >= libc::IFNAMSIZ {
            return Err(DaemonError::TunConfigure(io::Error::new(
                io::ErrorKind::InvalidInput,
                "interface name too long",
            )));
        }
        for (dst, src) in req.name.iter_mut().zip(requested_name.as_bytes()) {
            *dst = *src as libc::c_char;
        }

        let rc = unsafe { libc::ioctl(file.as_raw_fd(), TUNSETIFF as _, &mut req) };
        if rc < 0 {
            return Err(DaemonError::TunConfigure(io::Error::last_os_error()));
        }

        let name_len = req.name.iter().position(|&c| c == 0).unwrap_or(libc::IFNAMSIZ);
        let name_bytes: Vec<u8> = req.name[..name_len].iter().map(|&c| c as u8).collect();
        let name = String::from_utf8_lossy(&name_bytes).into_owned();

        Ok(TunDevice { file, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    /// Reads one packet. A would-block condition reads as zero bytes.
    pub fn read_packet(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match nix::unistd::read(self.file.as_raw_fd(), buf) {
            Ok(n) => Ok(n),
            Err(nix::errno::Errno::EAGAIN) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes one packet. A short write is treated as an error since tun
    /// packets are never meant to be split across kernel writes.
    pub fn write_packet(&mut self, buf: &[u8]) -> io::Result<()> {
        let n = nix::unistd::write(&self.file, buf)?;
        if n != buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "short write to tun device",
            ));
        }
        Ok(())
    }
}

impl AsFd for TunDevice {
    fn as_fd(&self) -> std::os::fd::BorrowedFd<'_> {
        self.file.as_fd()
    }
}
