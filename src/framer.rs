//! Read/write discipline for one POP3 exchange.
//!
//! A command is written in a single `write` call whose byte count is
//! checked. The response is read in chunks into a buffer owned by the
//! `Framer`; it ends at the first terminator for that command, and any bytes
//! the stream delivered past it stay buffered for the next response.

use std::io::{self, Read, Write};
use std::mem;

use errors::*;

pub const SINGLE_LINE_TERMINATOR: &str = "\r\n";
pub const MULTI_LINE_TERMINATOR: &str = ".\r\n";

const READ_CHUNK_SIZE: usize = 1024;
/// Consecutive empty reads tolerated before the stream is treated as closed.
const MAX_EMPTY_READS: usize = 8;
/// A multi-line terminator only counts at the start of a line.
const MULTI_LINE_END: &[u8] = b"\n.\r\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    SingleLine,
    MultiLine,
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

impl Terminator {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Terminator::SingleLine => SINGLE_LINE_TERMINATOR,
            Terminator::MultiLine => MULTI_LINE_TERMINATOR,
        }
    }

    /// Length of the first whole response at the start of `buf`, if there is
    /// one. Bytes before `scanned` were already searched without a match.
    pub fn response_end(&self, buf: &[u8], scanned: usize) -> Option<usize> {
        let crlf = SINGLE_LINE_TERMINATOR.as_bytes();
        match *self {
            Terminator::SingleLine => {
                find(buf, crlf, scanned.saturating_sub(crlf.len() - 1)).map(|pos| pos + crlf.len())
            }
            Terminator::MultiLine => {
                let status_end = find(buf, crlf, 0)? + crlf.len();
                // Error replies to multi-line commands are a single line.
                if !buf.starts_with(b"+OK") {
                    return Some(status_end);
                }
                let from = (status_end - 1).max(scanned.saturating_sub(MULTI_LINE_END.len() - 1));
                find(buf, MULTI_LINE_END, from).map(|pos| pos + MULTI_LINE_END.len())
            }
        }
    }
}

/// Write `command` in one call, failing if the stream took a different
/// number of bytes.
pub fn write_command<W: Write + ?Sized>(stream: &mut W, command: &str) -> Result<()> {
    let written = stream.write(command.as_bytes())?;
    if written != command.len() {
        bail!(ErrorKind::ShortWrite(command.len(), written));
    }
    stream.flush()?;
    Ok(())
}

/// Reassembles responses from a stream, one session at a time.
#[derive(Debug, Default)]
pub struct Framer {
    buff: Vec<u8>,
}

impl Framer {
    pub fn new() -> Framer {
        Framer::default()
    }

    /// Bytes received past the last returned response.
    pub fn pending(&self) -> usize {
        self.buff.len()
    }

    pub fn clear(&mut self) {
        self.buff.clear();
    }

    /// Read until the buffer holds a whole response, and return exactly that
    /// response, terminator included.
    ///
    /// The search runs over everything buffered so far, so a terminator
    /// split across reads is still found.
    pub fn read_response<R: Read + ?Sized>(&mut self, stream: &mut R, terminator: Terminator)
        -> Result<String>
    {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let mut empty_reads = 0;
        let mut scanned = 0;

        loop {
            if let Some(end) = terminator.response_end(&self.buff, scanned) {
                let rest = self.buff.split_off(end);
                let response = mem::replace(&mut self.buff, rest);
                trace!("Read {} bytes, {} left over", response.len(), self.buff.len());
                return Ok(String::from_utf8_lossy(&response).into_owned());
            }
            scanned = self.buff.len();

            match stream.read(&mut chunk) {
                Ok(0) => {
                    empty_reads += 1;
                    if empty_reads >= MAX_EMPTY_READS {
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("stream ended before {:?} terminator", terminator.as_str()),
                        ).into());
                    }
                }
                Ok(read) => {
                    empty_reads = 0;
                    self.buff.extend_from_slice(&chunk[..read]);
                }
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}
