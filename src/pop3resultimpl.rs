use std::convert::TryFrom;

use errors::*;
use framer::{MULTI_LINE_TERMINATOR, SINGLE_LINE_TERMINATOR};
use pop3result::{Email, POP3Response, POP3Stat, POP3Status};

const OK_PREFIX: &str = "+OK";

fn tokens(line: &str) -> Vec<&str> {
    line.trim_matches(&[' ', '\r', '\n', '\t'][..])
        .split(' ')
        .collect()
}

fn malformed<T>(detail: String) -> Result<T> {
    Err(ErrorKind::MalformedResponse(detail).into())
}

fn body_size(len: usize) -> Result<u32> {
    match u32::try_from(len) {
        Ok(size) => Ok(size),
        Err(_) => malformed(format!("message body of {} octets does not fit a u32 size", len)),
    }
}

impl POP3Response {
    /// Success iff the status line starts with `+OK`. Anything else,
    /// including garbage and empty input, is an error response.
    pub fn classify(raw: String) -> POP3Response {
        let status = if status_line(&raw).starts_with(OK_PREFIX) {
            POP3Status::OK
        } else {
            POP3Status::ERR
        };
        POP3Response {
            status: status,
            raw: raw,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == POP3Status::OK
    }

    pub fn status_line(&self) -> &str {
        status_line(&self.raw)
    }

    /// The raw text of a `+OK` response, or a protocol error carrying it.
    pub fn into_result(self) -> Result<String> {
        match self.status {
            POP3Status::OK => Ok(self.raw),
            POP3Status::ERR => Err(ErrorKind::Protocol(self.raw).into()),
        }
    }
}

fn status_line(raw: &str) -> &str {
    match raw.find(SINGLE_LINE_TERMINATOR) {
        Some(end) => &raw[..end],
        None => raw,
    }
}

impl POP3Stat {
    /// Parse `+OK {count} {size}`; anything after the size is ignored.
    pub fn parse(stat_line: &str) -> Result<POP3Stat> {
        let items = tokens(stat_line);
        if items.len() < 3 {
            return malformed(format!("STAT needs a count and a size, got {:?}", stat_line));
        }
        let num_mails = match items[1].parse::<u32>() {
            Ok(n) => n,
            Err(e) => return malformed(format!("STAT message count {:?}: {}", items[1], e)),
        };
        let mbox_size = match items[2].parse::<u64>() {
            Ok(n) => n,
            Err(e) => return malformed(format!("STAT mailbox size {:?}: {}", items[2], e)),
        };
        Ok(POP3Stat {
            num_mails: num_mails,
            mbox_size: mbox_size,
        })
    }
}

impl Email {
    fn from_fields(id: &str, size: &str, line: &str) -> Result<Email> {
        let id = match id.parse::<i32>() {
            Ok(id) => id,
            Err(e) => return malformed(format!("message id {:?} in {:?}: {}", id, line, e)),
        };
        let size = match size.parse::<u32>() {
            Ok(size) => size,
            Err(e) => return malformed(format!("message size {:?} in {:?}: {}", size, line, e)),
        };
        Ok(Email {
            id: id,
            size: size,
            body: None,
        })
    }

    /// Parse a `LIST {id}` reply: `+OK {id} {size}`.
    pub fn parse_single_line(line: &str) -> Result<Email> {
        let items = tokens(line);
        if items.len() < 3 {
            return malformed(format!("LIST reply needs an id and a size, got {:?}", line));
        }
        Email::from_fields(items[1], items[2], line)
    }

    /// Parse one scan listing line, `{id} {size}`, from a multi-line LIST.
    pub fn parse_line(line: &str) -> Result<Email> {
        let items = tokens(line);
        if items.len() < 2 {
            return malformed(format!("scan listing needs an id and a size, got {:?}", line));
        }
        Email::from_fields(items[0], items[1], line)
    }

    /// Parse a whole multi-line LIST reply. One bad line fails the lot.
    pub fn parse_list(listing: &str) -> Result<Vec<Email>> {
        let lines: Vec<&str> = listing.split(SINGLE_LINE_TERMINATOR).collect();
        // status line first, then the "." line and the empty piece after it
        if lines.len() < 3 {
            return malformed(format!("LIST reply is not a multi-line response: {:?}", listing));
        }
        lines[1..lines.len() - 2]
            .iter()
            .map(|line| Email::parse_line(line))
            .collect()
    }

    /// Split a RETR reply into its status line and body. The body keeps its
    /// interior line endings; the closing `.` line and the CRLF before it
    /// are dropped.
    pub fn parse_retrieved(id: i32, response: &str) -> Result<Email> {
        let header_end = match response.find(SINGLE_LINE_TERMINATOR) {
            Some(end) => end,
            None => return malformed(format!("RETR reply has no status line: {:?}", response)),
        };
        let header = &response[..header_end];
        let mut body = &response[header_end + SINGLE_LINE_TERMINATOR.len()..];
        if body.ends_with(MULTI_LINE_TERMINATOR) {
            body = &body[..body.len() - MULTI_LINE_TERMINATOR.len()];
            if body.ends_with(SINGLE_LINE_TERMINATOR) {
                body = &body[..body.len() - SINGLE_LINE_TERMINATOR.len()];
            }
        }

        let size = match tokens(header).get(1).and_then(|octets| octets.parse::<u32>().ok()) {
            Some(size) => size,
            None => body_size(body.len())?,
        };

        Ok(Email {
            id: id,
            size: size,
            body: Some(body.to_string()),
        })
    }
}
