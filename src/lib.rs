//! A blocking POP3 (RFC 1939) client.
//!
//! One `POP3Connection` owns one server session. Commands are strictly
//! sequential: each writes a single line and reads the whole reply before
//! returning.

#[macro_use]
extern crate log;
#[macro_use]
extern crate error_chain;
#[macro_use]
extern crate lazy_static;
extern crate md5;
extern crate openssl;
extern crate regex;
#[cfg(feature = "serde")]
extern crate serde;

pub mod errors {
    error_chain! {
        foreign_links {
            Io(::std::io::Error);
            SslStack(::openssl::error::ErrorStack);
            SslHandshake(::openssl::ssl::HandshakeError<::std::net::TcpStream>);
        }

        errors {
            ShortWrite(expected: usize, written: usize) {
                description("short write")
                display("Invalid length of data written to connection, expected {} but only managed {}",
                        expected, written)
            }
            Protocol(response: String) {
                description("server returned an error response")
                display("Server returned an error: {}", response.trim_end())
            }
            MalformedResponse(detail: String) {
                description("malformed server response")
                display("Malformed response: {}", detail)
            }
            InvalidState(command: &'static str, state: ::POP3State) {
                description("command not valid in the current session state")
                display("{} is not valid in the {:?} state", command, state)
            }
            ApopUnavailable {
                description("server greeting carried no APOP timestamp")
                display("APOP requested but the server greeting carried no timestamp")
            }
        }
    }
}
use errors::*;

pub mod config;
mod framer;
pub mod pop3result;
mod pop3resultimpl;
pub mod session;
mod tcpstream;
mod utils;
#[cfg(test)]
mod testconn;

pub use config::{AuthMethod, Config, TlsOptions};
pub use framer::{Terminator, MULTI_LINE_TERMINATOR, SINGLE_LINE_TERMINATOR};
pub use pop3result::{Email, POP3Response, POP3Stat, POP3Status};
pub use tcpstream::{Dialer, NetDialer, TCPStreamType, Transport};
pub use utils::get_apop_digest;

use framer::Framer;

#[derive(PartialEq, Eq, Clone, Copy)]
#[derive(Debug)]
pub enum POP3State {
    BEGIN,
    AUTHORIZATION,
    TRANSACTION,
    // UPDATE is entered by the server after QUIT; a client only sees END.
    END,
}

/// A single POP3 session.
///
/// The stream is released by `close`, or by `Drop` if the caller never
/// closed the session. Dropping does not send QUIT, so deletions marked
/// with `delete` are not committed.
pub struct POP3Connection<D: Dialer = NetDialer> {
    config: Config,
    dialer: D,
    stream: Option<D::Stream>,
    framer: Framer,
    state: POP3State,
    timestamp: Option<String>,
}

impl POP3Connection<NetDialer> {
    pub fn new(config: Config) -> POP3Connection<NetDialer> {
        let dialer = NetDialer::from_config(&config);
        POP3Connection::with_dialer(config, dialer)
    }
}

impl<D: Dialer> POP3Connection<D> {
    pub fn with_dialer(config: Config, dialer: D) -> POP3Connection<D> {
        POP3Connection {
            config: config,
            dialer: dialer,
            stream: None,
            framer: Framer::new(),
            state: POP3State::BEGIN,
            timestamp: None,
        }
    }

    pub fn state(&self) -> POP3State {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// APOP timestamp from the server greeting, if it sent one.
    pub fn greeting_timestamp(&self) -> Option<&str> {
        self.timestamp.as_ref().map(|t| &t[..])
    }

    fn set_state(&mut self, state: POP3State) {
        self.state = state;
        debug!("POP3State::{:?}", self.state);
    }

    fn require_state(&self, command: &'static str, allowed: &[POP3State]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(ErrorKind::InvalidState(command, self.state).into())
        }
    }

    /// Open the transport and read the server greeting.
    pub fn connect(&mut self) -> Result<()> {
        self.require_state("CONNECT", &[POP3State::BEGIN])?;
        trace!("Initiate POP3 Connection");
        let stream = if self.config.use_tls {
            self.dialer.dial_tls(&self.config.server, self.config.port, &self.config.tls)?
        } else {
            self.dialer.dial(&self.config.server, self.config.port)?
        };
        self.stream = Some(stream);
        self.framer.clear();
        trace!("Connection Established");

        match self.read_greeting() {
            Ok(()) => {
                self.set_state(POP3State::AUTHORIZATION);
                Ok(())
            }
            Err(e) => {
                self.release();
                self.set_state(POP3State::END);
                Err(e)
            }
        }
    }

    fn read_greeting(&mut self) -> Result<()> {
        trace!("Reading Greeting from Server");
        let greeting = self.read_response(Terminator::SingleLine)?.into_result()?;
        self.timestamp = utils::get_greeting_timestamp(&greeting);
        Ok(())
    }

    /// Authenticate with the method chosen in the config.
    pub fn auth(&mut self) -> Result<()> {
        self.require_state("AUTH", &[POP3State::AUTHORIZATION])?;
        trace!("Attempting to Login");
        match self.config.auth {
            AuthMethod::UserPass => self.user_pass(),
            AuthMethod::Apop => self.apop(),
            AuthMethod::Auto => {
                let username = self.config.username.clone();
                match self.send_command("USER", Some(&username)) {
                    Ok(_) => self.pass(),
                    Err(Error(ErrorKind::Protocol(_), _)) if self.timestamp.is_some() => {
                        debug!("USER rejected, authenticating using APOP");
                        self.apop()
                    }
                    Err(e) => Err(e),
                }
            }
        }
    }

    fn user_pass(&mut self) -> Result<()> {
        debug!("Plain USER/PASS authentication");
        let username = self.config.username.clone();
        self.send_command("USER", Some(&username))?;
        self.pass()
    }

    fn pass(&mut self) -> Result<()> {
        let password = self.config.password.clone();
        self.send_command("PASS", Some(&password))?;
        self.set_state(POP3State::TRANSACTION);
        Ok(())
    }

    /// Authenticate with `APOP`, using the timestamp from the greeting.
    pub fn apop(&mut self) -> Result<()> {
        self.require_state("APOP", &[POP3State::AUTHORIZATION])?;
        let digest = match self.timestamp {
            Some(ref timestamp) => utils::get_apop_digest(timestamp, &self.config.password),
            None => bail!(ErrorKind::ApopUnavailable),
        };
        let apop_param = format!("{} {}", self.config.username, digest);
        self.send_command("APOP", Some(&apop_param))?;
        self.set_state(POP3State::TRANSACTION);
        Ok(())
    }

    pub fn stat(&mut self) -> Result<POP3Stat> {
        self.require_state("STAT", &[POP3State::TRANSACTION])?;
        trace!("Cmd: STAT");
        let response = self.send_command("STAT", None)?;
        POP3Stat::parse(&response)
    }

    /// `LIST {id}`: size of a single message.
    pub fn list_message(&mut self, msgnum: i32) -> Result<Email> {
        self.require_state("LIST", &[POP3State::TRANSACTION])?;
        trace!("Cmd: LIST {}", msgnum);
        let response = self.send_command("LIST", Some(&msgnum.to_string()))?;
        Email::parse_single_line(&response)
    }

    /// `LIST`: every message in the maildrop, in server order.
    pub fn list(&mut self) -> Result<Vec<Email>> {
        self.require_state("LIST", &[POP3State::TRANSACTION])?;
        trace!("Cmd: LIST");
        let response = self.send_command("LIST", None)?;
        Email::parse_list(&response)
    }

    pub fn retrieve(&mut self, msgnum: i32) -> Result<Email> {
        self.require_state("RETR", &[POP3State::TRANSACTION])?;
        trace!("Cmd: RETR {}", msgnum);
        let response = self.send_command("RETR", Some(&msgnum.to_string()))?;
        Email::parse_retrieved(msgnum, &response)
    }

    /// Mark a message for deletion. Only committed by a successful `close`.
    pub fn delete(&mut self, msgnum: i32) -> Result<()> {
        self.require_state("DELE", &[POP3State::TRANSACTION])?;
        trace!("Cmd: DELE {}", msgnum);
        self.send_command("DELE", Some(&msgnum.to_string()))?;
        Ok(())
    }

    pub fn reset(&mut self) -> Result<()> {
        self.require_state("RSET", &[POP3State::TRANSACTION])?;
        trace!("Cmd: RSET");
        self.send_command("RSET", None)?;
        Ok(())
    }

    pub fn noop(&mut self) -> Result<()> {
        self.require_state("NOOP", &[POP3State::TRANSACTION])?;
        trace!("Cmd: NOOP");
        self.send_command("NOOP", None)?;
        Ok(())
    }

    /// Send QUIT and release the stream.
    ///
    /// The stream is released even when the QUIT exchange fails; that
    /// failure is still returned. Calling `close` again is a no-op.
    pub fn close(&mut self) -> Result<()> {
        let mut stream = match self.stream.take() {
            Some(stream) => stream,
            None => {
                self.set_state(POP3State::END);
                return Ok(());
            }
        };
        trace!("Cmd: QUIT");
        let quit = Self::exchange(&mut stream, &mut self.framer, "QUIT", "QUIT\r\n", Terminator::SingleLine)
            .and_then(|response| response.into_result());
        let released = stream.close();
        self.framer.clear();
        self.set_state(POP3State::END);

        quit?;
        released?;
        trace!("Connection Closed");
        Ok(())
    }

    /// Connect, authenticate, run `f`, then close on every exit path. An
    /// error from `f` wins over an error from closing.
    pub fn with_session<T, F>(&mut self, f: F) -> Result<T>
        where F: FnOnce(&mut POP3Connection<D>) -> Result<T>
    {
        let result = self.open_and_run(f);
        let closed = self.close();
        let value = result?;
        closed?;
        Ok(value)
    }

    fn open_and_run<T, F>(&mut self, f: F) -> Result<T>
        where F: FnOnce(&mut POP3Connection<D>) -> Result<T>
    {
        self.connect()?;
        self.auth()?;
        f(self)
    }

    fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close() {
                warn!("Failed to release connection: {}", e);
            }
        }
        self.framer.clear();
    }

    fn send_command(&mut self, command: &'static str, param: Option<&str>) -> Result<String> {
        // Identify if the command is a multiline command
        let terminator = match command {
            "LIST" if param.is_none() => Terminator::MultiLine,
            "RETR" => Terminator::MultiLine,
            _ => Terminator::SingleLine,
        };

        // Create the actual POP3 Command by appending the parameters
        let line = match param {
            Some(x) => format!("{} {}\r\n", command, x),
            None => format!("{}\r\n", command),
        };

        // Only reachable when a state check was skipped.
        let stream = match self.stream {
            Some(ref mut stream) => stream,
            None => bail!(ErrorKind::InvalidState(command, self.state)),
        };
        Self::exchange(stream, &mut self.framer, command, &line, terminator)?.into_result()
    }

    fn read_response(&mut self, terminator: Terminator) -> Result<POP3Response> {
        let stream = match self.stream {
            Some(ref mut stream) => stream,
            None => bail!(ErrorKind::InvalidState("CONNECT", self.state)),
        };
        let response = POP3Response::classify(self.framer.read_response(stream, terminator)?);
        info!("S: {}", response.status_line());
        Ok(response)
    }

    /// One round trip: write `line`, then read the whole reply. Bytes that
    /// arrive after the reply stay in `reader`.
    fn exchange(stream: &mut D::Stream, reader: &mut Framer, command: &str, line: &str,
                terminator: Terminator) -> Result<POP3Response>
    {
        match command {
            "PASS" => info!("C: PASS ****"),
            "APOP" => info!("C: APOP ****"),
            _ => info!("C: {}", line.trim_end()),
        }
        framer::write_command(stream, line)?;
        let response = POP3Response::classify(reader.read_response(stream, terminator)?);
        info!("S: {}", response.status_line());
        Ok(response)
    }
}

impl<D: Dialer> Drop for POP3Connection<D> {
    fn drop(&mut self) {
        if self.stream.is_some() {
            warn!("POP3Connection dropped without close, releasing stream without QUIT");
            self.release();
        }
    }
}
