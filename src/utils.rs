use md5::{Digest, Md5};
use regex::Regex;

lazy_static! {
    static ref TIMESTAMP_REGEX: Regex = Regex::new(r"<[^<>\s]*@[^<>\s]*>").unwrap();
}

/// RFC 1939 APOP digest: hex MD5 of the greeting timestamp followed by the
/// shared secret.
pub fn get_apop_digest(timestamp: &str, password: &str) -> String {
    let hasher = Md5::new().chain(timestamp).chain(password);
    format!("{:x}", hasher.result())
}

/// The `<process-ID.clock@hostname>` banner from a greeting, if any.
pub fn get_greeting_timestamp(greeting: &str) -> Option<String> {
    TIMESTAMP_REGEX
        .find(greeting)
        .map(|m| m.as_str().to_string())
}
