//! Byte transport under the HTTP layer
//!
//! [`SessionOps`] is implemented once for plain TCP ([`FdSessionOps`]) and
//! once for TLS. [`HttpSession`] waits for readiness with `poll(2)` before
//! each read or write, so a silent peer ends in [`Error::Timeout`] instead of
//! a hung driver.

use super::{Error, Result};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::os::fd::{AsRawFd, RawFd};
use std::time::{Duration, Instant};

/// Readiness a caller waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Readable,
    Writable,
}

pub trait SessionOps {
    /// Block until `interest` is satisfied or `timeout` runs out
    ///
    /// `Ok(false)` means the wait timed out; `None` waits forever.
    fn poll(&self, interest: Interest, timeout: Option<Duration>) -> Result<bool>;

    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    fn close(&mut self) -> Result<()>;

    /// Bound for a read or write that starts right after a successful poll
    ///
    /// Transports that may block past readiness (TLS records that carry no
    /// application data) apply it to the socket.
    fn set_io_timeout(&mut self, _timeout: Option<Duration>) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn poll_fd(fd: RawFd, interest: Interest, timeout: Option<Duration>) -> Result<bool> {
    let events = match interest {
        Interest::Readable => libc::POLLIN,
        Interest::Writable => libc::POLLOUT,
    };
    let mut entry = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    let millis = match timeout {
        Some(t) => i32::try_from(t.as_millis()).unwrap_or(i32::MAX),
        None => -1,
    };

    // SAFETY: `entry` is a single valid pollfd that outlives the call.
    let ready = unsafe { libc::poll(&mut entry, 1, millis) };
    match ready {
        n if n < 0 => Err(io::Error::last_os_error().into()),
        0 => Ok(false),
        _ => Ok(true),
    }
}

const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport with a per-operation timeout and an optional deadline that
/// bounds all operations together
pub struct HttpSession<S: SessionOps> {
    ops: S,
    op_timeout: Option<Duration>,
    deadline: Option<Instant>,
}

impl<S: SessionOps> HttpSession<S> {
    pub fn new(ops: S) -> Self {
        HttpSession {
            ops,
            op_timeout: Some(DEFAULT_OP_TIMEOUT),
            deadline: None,
        }
    }

    /// `None` lets single operations wait without limit
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.op_timeout = timeout;
    }

    pub fn set_deadline(&mut self, deadline: Option<Instant>) {
        self.deadline = deadline;
    }

    /// Poll for `interest`; returns the wait that applied
    fn wait_for(&self, interest: Interest) -> Result<Option<Duration>> {
        let until_deadline = match self.deadline {
            Some(deadline) => match deadline.checked_duration_since(Instant::now()) {
                Some(left) if !left.is_zero() => Some(left),
                _ => return Err(Error::Timeout),
            },
            None => None,
        };
        let wait = match (self.op_timeout, until_deadline) {
            (Some(op), Some(left)) => Some(op.min(left)),
            (op, left) => op.or(left),
        };

        if self.ops.poll(interest, wait)? {
            Ok(wait)
        } else {
            Err(Error::Timeout)
        }
    }

    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let wait = self.wait_for(Interest::Readable)?;
        self.ops.set_io_timeout(wait)?;
        self.ops.read(buf)
    }

    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let wait = self.wait_for(Interest::Writable)?;
        self.ops.set_io_timeout(wait)?;
        self.ops.write(buf)
    }

    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut sent = 0;
        while sent < buf.len() {
            match self.write(&buf[sent..])? {
                0 => return Err(Error::ConnectionClosed),
                n => sent += n,
            }
        }
        Ok(())
    }

    pub fn close(&mut self) -> Result<()> {
        self.ops.close()
    }
}

/// Plain TCP transport
pub struct FdSessionOps {
    stream: TcpStream,
}

impl FdSessionOps {
    pub fn new(stream: TcpStream) -> Self {
        FdSessionOps { stream }
    }
}

impl SessionOps for FdSessionOps {
    fn poll(&self, interest: Interest, timeout: Option<Duration>) -> Result<bool> {
        poll_fd(self.stream.as_raw_fd(), interest, timeout)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.stream.read(buf)?)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        Ok(self.stream.write(buf)?)
    }

    fn close(&mut self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            result => Ok(result?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// Connected session whose peer stays silent for `quiet`
    fn silent_peer(quiet: Duration) -> HttpSession<FdSessionOps> {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            let (_stream, _) = listener.accept().unwrap();
            thread::sleep(quiet);
        });
        HttpSession::new(FdSessionOps::new(TcpStream::connect(addr).unwrap()))
    }

    #[test]
    fn test_reads_what_peer_sent() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            stream.write_all(b"Hello").unwrap();
        });

        let mut session = HttpSession::new(FdSessionOps::new(TcpStream::connect(addr).unwrap()));
        let mut buf = [0u8; 5];
        let mut filled = 0;
        while filled < buf.len() {
            filled += session.read(&mut buf[filled..]).unwrap();
        }
        assert_eq!(&buf, b"Hello");

        peer.join().unwrap();
    }

    #[test]
    fn test_op_timeout() {
        let mut session = silent_peer(Duration::from_secs(2));
        session.set_timeout(Some(Duration::from_millis(100)));

        let mut buf = [0u8; 10];
        assert!(matches!(session.read(&mut buf), Err(Error::Timeout)));
    }

    #[test]
    fn test_passed_deadline_fails_without_waiting() {
        let mut session = silent_peer(Duration::from_millis(200));
        session.set_deadline(Some(Instant::now()));

        assert!(matches!(session.write(b"GET"), Err(Error::Timeout)));
    }

    #[test]
    fn test_deadline_shortens_op_timeout() {
        let mut session = silent_peer(Duration::from_secs(2));
        session.set_timeout(Some(Duration::from_secs(10)));
        session.set_deadline(Some(Instant::now() + Duration::from_millis(150)));

        let started = Instant::now();
        let mut buf = [0u8; 10];
        assert!(matches!(session.read(&mut buf), Err(Error::Timeout)));
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
