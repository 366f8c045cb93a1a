//! The canonical walk over a maildrop, as run by the `pop3gadget` binary:
//! stat, list, then list/retrieve/delete every message, then reset so
//! nothing is actually removed.

use errors::*;
use pop3result::{Email, POP3Stat};
use tcpstream::Dialer;
use POP3Connection;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub stat: POP3Stat,
    /// Every message, with its body.
    pub messages: Vec<Email>,
}

/// Run the whole sequence on `conn`, closing it on every exit path. The
/// first failure aborts the rest.
pub fn run<D: Dialer>(conn: &mut POP3Connection<D>) -> Result<SessionReport> {
    conn.with_session(|conn| {
        let stat = conn.stat()?;
        info!("{} messages, {} octets", stat.num_mails, stat.mbox_size);

        let listing = conn.list()?;
        let mut messages = Vec::with_capacity(listing.len());
        for email in &listing {
            conn.list_message(email.id)?;
            messages.push(conn.retrieve(email.id)?);
            conn.delete(email.id)?;
        }
        conn.reset()?;

        Ok(SessionReport {
            stat: stat,
            messages: messages,
        })
    })
}
