//! Scripted in-memory transport for unit tests.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::rc::Rc;

use config::TlsOptions;
use errors::*;
use tcpstream::{Dialer, Transport};

#[derive(Default)]
struct State {
    to_read: VecDeque<Vec<u8>>,
    written: Vec<String>,
    read_error: Option<(io::ErrorKind, usize)>,
    write_error: Option<(io::ErrorKind, usize)>,
    close_error: Option<io::ErrorKind>,
    write_count: Option<usize>,
    times_read_called: usize,
    times_write_called: usize,
    times_close_called: usize,
}

/// Handles share one state, so a test can keep a clone and inspect it after
/// the connection under test has taken ownership of another.
#[derive(Clone, Default)]
pub struct TestConnection {
    state: Rc<RefCell<State>>,
}

impl TestConnection {
    pub fn new() -> TestConnection {
        TestConnection::default()
    }

    /// Queue one read result. An empty string yields a zero-byte read.
    pub fn queue(&self, data: &str) {
        self.state.borrow_mut().to_read.push_back(data.as_bytes().to_vec());
    }

    /// Every read fails with `kind` once `after` reads have succeeded.
    pub fn fail_reads(&self, kind: io::ErrorKind, after: usize) {
        self.state.borrow_mut().read_error = Some((kind, after));
    }

    /// Every write fails with `kind` once `after` writes have succeeded.
    pub fn fail_writes(&self, kind: io::ErrorKind, after: usize) {
        self.state.borrow_mut().write_error = Some((kind, after));
    }

    pub fn fail_close(&self, kind: io::ErrorKind) {
        self.state.borrow_mut().close_error = Some(kind);
    }

    /// Make `write` report `count` bytes regardless of the input.
    pub fn force_write_count(&self, count: usize) {
        self.state.borrow_mut().write_count = Some(count);
    }

    pub fn written(&self) -> Vec<String> {
        self.state.borrow().written.clone()
    }

    pub fn times_read_called(&self) -> usize {
        self.state.borrow().times_read_called
    }

    pub fn times_close_called(&self) -> usize {
        self.state.borrow().times_close_called
    }

    pub fn closed(&self) -> bool {
        self.times_close_called() > 0
    }
}

impl Read for TestConnection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        if let Some((kind, after)) = state.read_error {
            if state.times_read_called >= after {
                return Err(io::Error::new(kind, "scripted read failure"));
            }
        }
        let data = match state.to_read.pop_front() {
            Some(data) => data,
            None => return Ok(0),
        };
        let n = if buf.len() >= data.len() {
            buf[..data.len()].copy_from_slice(&data);
            data.len()
        } else {
            buf.copy_from_slice(&data[..buf.len()]);
            state.to_read.push_front(data[buf.len()..].to_vec());
            buf.len()
        };
        state.times_read_called += 1;
        Ok(n)
    }
}

impl Write for TestConnection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut state = self.state.borrow_mut();
        if let Some((kind, after)) = state.write_error {
            if state.times_write_called >= after {
                return Err(io::Error::new(kind, "scripted write failure"));
            }
        }
        if let Some(count) = state.write_count {
            return Ok(count);
        }
        state.times_write_called += 1;
        state.written.push(String::from_utf8_lossy(buf).into_owned());
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Transport for TestConnection {
    fn close(&mut self) -> io::Result<()> {
        let mut state = self.state.borrow_mut();
        state.times_close_called += 1;
        match state.close_error {
            Some(kind) => Err(io::Error::new(kind, "scripted close failure")),
            None => Ok(()),
        }
    }
}

/// Hands out clones of one `TestConnection` and records which dial path ran.
pub struct TestDialer {
    pub conn: TestConnection,
    pub fail: bool,
    pub plain_dials: Cell<usize>,
    pub tls_dials: Cell<usize>,
}

impl TestDialer {
    pub fn new(conn: &TestConnection) -> TestDialer {
        TestDialer {
            conn: conn.clone(),
            fail: false,
            plain_dials: Cell::new(0),
            tls_dials: Cell::new(0),
        }
    }

    pub fn failing() -> TestDialer {
        TestDialer {
            fail: true,
            ..TestDialer::new(&TestConnection::new())
        }
    }

    fn connect(&self) -> Result<TestConnection> {
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "scripted dial failure").into());
        }
        Ok(self.conn.clone())
    }
}

impl Dialer for TestDialer {
    type Stream = TestConnection;

    fn dial(&self, _host: &str, _port: u16) -> Result<TestConnection> {
        self.plain_dials.set(self.plain_dials.get() + 1);
        self.connect()
    }

    fn dial_tls(&self, _host: &str, _port: u16, _tls: &TlsOptions) -> Result<TestConnection> {
        self.tls_dials.set(self.tls_dials.get() + 1);
        self.connect()
    }
}

impl<'a> Dialer for &'a TestDialer {
    type Stream = TestConnection;

    fn dial(&self, host: &str, port: u16) -> Result<TestConnection> {
        (**self).dial(host, port)
    }

    fn dial_tls(&self, host: &str, port: u16, tls: &TlsOptions) -> Result<TestConnection> {
        (**self).dial_tls(host, port, tls)
    }
}
