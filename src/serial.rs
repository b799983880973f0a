//! The serial line (spec.md §4.1): raw 8N1, non-blocking, one reserved baud
//! table, and a bounded retry-with-back-off on transient write pressure.

use std::fs::OpenOptions;
use std::io;
use std::os::fd::{AsFd, AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use nix::sys::termios::{self, BaudRate, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg};

use crate::codec::ByteSink;
use crate::error::DaemonError;

const WRITE_RETRY_ATTEMPTS: u32 = 5;
const WRITE_RETRY_DELAY: Duration = Duration::from_millis(1);

fn baud_rate(value: u32) -> Option<BaudRate> {
    Some(match value {
        50 => BaudRate::B50,
        75 => BaudRate::B75,
        110 => BaudRate::B110,
        134 => BaudRate::B134,
        150 => BaudRate::B150,
        200 => BaudRate::B200,
        300 => BaudRate::B300,
        600 => BaudRate::B600,
        1200 => BaudRate::B1200,
        1800 => BaudRate::B1800,
        2400 => BaudRate::B2400,
        4800 => BaudRate::B4800,
        9600 => BaudRate::B9600,
        19200 => BaudRate::B19200,
        38400 => BaudRate::B38400,
        57600 => BaudRate::B57600,
        115200 => BaudRate::B115200,
        230400 => BaudRate::B230400,
        460800 => BaudRate::B460800,
        500000 => BaudRate::B500000,
        576000 => BaudRate::B576000,
        921600 => BaudRate::B921600,
        1000000 => BaudRate::B1000000,
        1152000 => BaudRate::B1152000,
        1500000 => BaudRate::B1500000,
        2000000 => BaudRate::B2000000,
        2500000 => BaudRate::B2500000,
        3000000 => BaudRate::B3000000,
        3500000 => BaudRate::B3500000,
        4000000 => BaudRate::B4000000,
        _ => return None,
    })
}

pub struct SerialLine {
    file: std::fs::File,
}

impl SerialLine {
    pub fn open(path: &Path, baud: u32) -> Result<Self, DaemonError> {
        let rate = baud_rate(baud).ok_or(DaemonError::UnsupportedBaud(baud))?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)
            .map_err(|e| DaemonError::SerialOpen(path.to_owned(), e))?;

        let mut options = termios::tcgetattr(&file).map_err(DaemonError::SerialConfig)?;

        options.input_flags.remove(
            InputFlags::INPCK
                | InputFlags::ISTRIP
                | InputFlags::INLCR
                | InputFlags::IGNCR
                | InputFlags::ICRNL
                | InputFlags::IXON
                | InputFlags::IXANY
                | InputFlags::IXOFF,
        );
        options.input_flags.insert(InputFlags::IGNBRK | InputFlags::IGNPAR);

        options.output_flags.remove(
            OutputFlags::OPOST
                | OutputFlags::ONLCR
                | OutputFlags::OCRNL
                | OutputFlags::ONOCR
                | OutputFlags::ONLRET,
        );

        options.control_flags.remove(
            ControlFlags::CSIZE | ControlFlags::CSTOPB | ControlFlags::PARENB | ControlFlags::CRTSCTS,
        );
        options.control_flags.insert(
            ControlFlags::CS8 | ControlFlags::CREAD | ControlFlags::HUPCL | ControlFlags::CLOCAL,
        );

        options
            .local_flags
            .remove(LocalFlags::ISIG | LocalFlags::ICANON | LocalFlags::ECHO | LocalFlags::IEXTEN);

        termios::cfsetispeed(&mut options, rate).map_err(DaemonError::SerialConfig)?;
        termios::cfsetospeed(&mut options, rate).map_err(DaemonError::SerialConfig)?;

        termios::tcsetattr(&file, SetArg::TCSAFLUSH, &options).map_err(DaemonError::SerialConfig)?;

        Ok(SerialLine { file })
    }

    pub fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }

    /// Reads whatever is immediately available; a would-block condition
    /// reads as zero bytes, not an error.
    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match nix::unistd::read(self.file.as_raw_fd(), buf) {
            Ok(n) => Ok(n),
            Err(nix::errno::Errno::EAGAIN) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes a buffer in full, retrying transient would-block conditions
    /// with a brief back-off. Exceeding the retry bound is a fatal error.
    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        let mut attempts = 0;
        let mut written = 0;
        while written < buf.len() {
            match nix::unistd::write(&self.file, &buf[written..]) {
                Ok(n) => {
                    written += n;
                    attempts = 0;
                }
                Err(nix::errno::Errno::EAGAIN) => {
                    if attempts >= WRITE_RETRY_ATTEMPTS {
                        let stalled = io::Error::new(
                            io::ErrorKind::WouldBlock,
                            "persistent write back-pressure on serial device",
                        );
                        return Err(io::Error::other(DaemonError::SerialWriteStalled(stalled)));
                    }
                    attempts += 1;
                    std::thread::sleep(WRITE_RETRY_DELAY);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

impl ByteSink for SerialLine {
    fn write_byte(&mut self, byte: u8) -> io::Result<()> {
        self.write_all(&[byte])
    }
}

impl AsFd for SerialLine {
    fn as_fd(&self) -> std::os::fd::BorrowedFd<'_> {
        self.file.as_fd()
    }
}
