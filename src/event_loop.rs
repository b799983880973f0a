//! The event loop (C6, spec.md §4.6): poll-based multiplexing over the
//! serial and tun descriptors with a 1-second ceiling, draining the serial
//! side fully before servicing tun so bring-up replies are never starved.
//! Grounded on the notification-wait-then-drain-UART loop in
//! `task/host-sp-comms/src/main.rs`.

use std::os::fd::AsFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use log::{error, info, warn};
use nix::poll::{PollFd, PollFlags, PollTimeout};

use crate::codec::Decoder;
use crate::error::DaemonError;
use crate::message::MessageType;
use crate::serial::SerialLine;
use crate::session::Session;
use crate::stage::TickOutcome;
use crate::tun::TunDevice;

const MAX_FRAME_LEN: usize = 2048;
const MTU: usize = 1500;
const POLL_CEILING_MS: u16 = 1000;

static QUIT: AtomicBool = AtomicBool::new(false);

extern "C" fn request_quit(_sig: libc::c_int) {
    QUIT.store(true, Ordering::SeqCst);
}

/// Installs SIGINT/SIGTERM handlers that flip a shared quit flag, matching
/// spec.md §4.6's "handler re-arms itself": not using `SA_RESETHAND` means
/// every delivery re-enters the same handler rather than reverting to the
/// default action.
fn install_signal_handlers() {
    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = request_quit as usize;
        libc::sigemptyset(&mut action.sa_mask);
        action.sa_flags = 0;
        libc::sigaction(libc::SIGINT, &action, std::ptr::null_mut());
        libc::sigaction(libc::SIGTERM, &action, std::ptr::null_mut());
    }
}

fn elapsed_seconds(start: Instant) -> u64 {
    start.elapsed().as_secs()
}

/// Runs the daemon's main loop until a quit signal arrives or the session
/// reports `COMMS_FAILED`.
pub fn run(mut tun: TunDevice, mut session: Session<SerialLine>) -> anyhow::Result<()> {
    let mut decoder = Decoder::new(MAX_FRAME_LEN);
    let mut serial_buf = [0u8; 4096];
    let mut packet_buf = [0u8; MTU];

    let start = Instant::now();
    install_signal_handlers();

    loop {
        if QUIT.load(Ordering::SeqCst) {
            info!("quit requested, shutting down");
            return Ok(());
        }

        let serial_fd = session.sink_mut().as_fd();
        let tun_fd = tun.as_fd();
        let mut fds = [
            PollFd::new(serial_fd, PollFlags::POLLIN),
            PollFd::new(tun_fd, PollFlags::POLLIN),
        ];

        let ready = match nix::poll::poll(&mut fds, PollTimeout::from(POLL_CEILING_MS)) {
            Ok(n) => n,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => return Err(anyhow::anyhow!("poll failed: {e}")),
        };

        let serial_ready = fds[0].revents().is_some_and(|r| r.contains(PollFlags::POLLIN));
        let tun_ready = fds[1].revents().is_some_and(|r| r.contains(PollFlags::POLLIN));
        drop(fds);

        let mut any_frame = false;
        if serial_ready {
            loop {
                let n = session.sink_mut().read(&mut serial_buf)?;
                if n == 0 {
                    break;
                }
                for frame in decoder.feed_all(&serial_buf[..n]) {
                    any_frame = true;
                    let now = elapsed_seconds(start);
                    if frame.msg_type == MessageType::Ipv6.code() {
                        if let Err(e) = tun.write_packet(&frame.payload) {
                            warn!("tun write failed: {e}");
                        }
                        // IPV6 frames still refresh liveness like any other frame.
                        session.on_message(frame.msg_type, &[], now);
                    } else {
                        session.on_message(frame.msg_type, &frame.payload, now);
                    }
                }
            }
        }

        if tun_ready {
            let n = tun.read_packet(&mut packet_buf)?;
            if n > 0 {
                if let Err(e) = session.send_ipv6(&packet_buf[..n]) {
                    error!("serial write failed forwarding tun packet: {e}");
                    return Err(anyhow::anyhow!("serial write failed: {e}"));
                }
            }
        }

        let now = elapsed_seconds(start);
        let timeout_fired = ready == 0;
        if timeout_fired || any_frame {
            match session.tick(timeout_fired, now) {
                Ok(TickOutcome::Continue) => {}
                Ok(TickOutcome::CommsFailed) => {
                    warn!("communications with module lost, issuing final reset");
                    let _ = session.send_reset();
                    return Err(DaemonError::CommsFailed.into());
                }
                Err(e) => {
                    error!("fatal serial write failure: {e}");
                    return Err(anyhow::anyhow!("fatal serial write failure: {e}"));
                }
            }
        }
    }
}
