/// One message as the server describes it.
///
/// `id` is only meaningful inside the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub id: i32,
    pub size: u32,
    /// Raw message text, only filled in by `retrieve`.
    pub body: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct POP3Stat {
    pub num_mails: u32,
    pub mbox_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum POP3Status {
    OK,
    ERR,
}

/// A fully framed server response, classified by its status prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct POP3Response {
    pub status: POP3Status,
    pub raw: String,
}
