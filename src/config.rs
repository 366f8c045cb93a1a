use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVER: &str = "pop.gmail.com";
pub const DEFAULT_TLS_PORT: u16 = 995;
pub const DEFAULT_PLAIN_PORT: u16 = 110;

/// How `POP3Connection::auth` proves the user's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AuthMethod {
    /// `USER` followed by `PASS`.
    UserPass,
    /// `APOP` digest over the greeting timestamp.
    Apop,
    /// `USER`/`PASS`, falling back to `APOP` when the server rejects `USER`.
    Auto,
}

impl Default for AuthMethod {
    fn default() -> AuthMethod {
        AuthMethod::UserPass
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TlsOptions {
    /// Name used for SNI and certificate checks. Falls back to the server host.
    pub domain: Option<String>,
    pub verify_certificates: bool,
}

impl Default for TlsOptions {
    fn default() -> TlsOptions {
        TlsOptions {
            domain: None,
            verify_certificates: true,
        }
    }
}

/// Everything needed to open and authenticate one POP3 session.
///
/// Deadlines are `None` by default, which blocks indefinitely on a silent
/// server.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    pub use_tls: bool,
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub auth: AuthMethod,
    pub tls: TlsOptions,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            use_tls: true,
            server: DEFAULT_SERVER.to_string(),
            port: DEFAULT_TLS_PORT,
            username: String::new(),
            password: String::new(),
            auth: AuthMethod::default(),
            tls: TlsOptions::default(),
            connect_timeout: None,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl Config {
    /// Default config pointed at an unencrypted server.
    pub fn plain(server: &str, port: u16) -> Config {
        Config {
            use_tls: false,
            server: server.to_string(),
            port: port,
            ..Config::default()
        }
    }

    pub fn with_credentials(mut self, username: &str, password: &str) -> Config {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_targets_gmail_over_tls() {
        let config = Config::default();
        assert!(config.use_tls);
        assert_eq!(config.server, "pop.gmail.com");
        assert_eq!(config.port, 995);
        assert_eq!(config.auth, AuthMethod::UserPass);
        assert!(config.tls.verify_certificates);
        assert!(config.read_timeout.is_none());
        assert!(config.write_timeout.is_none());
    }

    #[test]
    fn plain_keeps_defaults_for_the_rest() {
        let config = Config::plain("127.0.0.1", DEFAULT_PLAIN_PORT).with_credentials("bob", "hunter2");
        assert!(!config.use_tls);
        assert_eq!(config.port, 110);
        assert_eq!(config.username, "bob");
        assert_eq!(config.password, "hunter2");
        assert!(config.connect_timeout.is_none());
    }
}
