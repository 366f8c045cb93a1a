use openssl::ssl::{SslConnector, SslMethod, SslStream, SslVerifyMode};
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use config::{Config, TlsOptions};
use errors::*;

/// A duplex byte stream a POP3 session runs over.
pub trait Transport: Read + Write {
    /// Release the underlying connection. Called exactly once per session.
    fn close(&mut self) -> io::Result<()>;
}

/// Opens transports for a `POP3Connection`.
///
/// Handed to the connection when it is built, so tests can swap in an
/// in-memory stream.
pub trait Dialer {
    type Stream: Transport;

    fn dial(&self, host: &str, port: u16) -> Result<Self::Stream>;

    fn dial_tls(&self, host: &str, port: u16, tls: &TlsOptions) -> Result<Self::Stream>;
}

#[derive(Debug)]
pub enum TCPStreamType {
    Plain(TcpStream),
    SSL(SslStream<TcpStream>),
}

impl Write for TCPStreamType {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match *self {
            TCPStreamType::Plain(ref mut stream) => stream.write(buf),
            TCPStreamType::SSL(ref mut stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match *self {
            TCPStreamType::Plain(ref mut stream) => stream.flush(),
            TCPStreamType::SSL(ref mut stream) => stream.flush(),
        }
    }
}

impl Read for TCPStreamType {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match *self {
            TCPStreamType::Plain(ref mut stream) => stream.read(buf),
            TCPStreamType::SSL(ref mut stream) => stream.read(buf),
        }
    }
}

impl Transport for TCPStreamType {
    fn close(&mut self) -> io::Result<()> {
        match *self {
            TCPStreamType::Plain(ref mut stream) => stream.shutdown(Shutdown::Both),
            TCPStreamType::SSL(ref mut stream) => {
                // close_notify is best effort, the peer may already be gone
                if let Err(e) = stream.shutdown() {
                    debug!("TLS shutdown failed: {}", e);
                }
                stream.get_ref().shutdown(Shutdown::Both)
            }
        }
    }
}

/// Dials real sockets: std `TcpStream`, wrapped by openssl for TLS.
#[derive(Debug, Clone, Default)]
pub struct NetDialer {
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

impl NetDialer {
    pub fn from_config(config: &Config) -> NetDialer {
        NetDialer {
            connect_timeout: config.connect_timeout,
            read_timeout: config.read_timeout,
            write_timeout: config.write_timeout,
        }
    }

    fn connect_tcp(&self, host: &str, port: u16) -> Result<TcpStream> {
        let stream = match self.connect_timeout {
            None => TcpStream::connect((host, port))?,
            Some(timeout) => {
                let mut last_err = None;
                let mut connected = None;
                for addr in (host, port).to_socket_addrs()? {
                    match TcpStream::connect_timeout(&addr, timeout) {
                        Ok(stream) => {
                            connected = Some(stream);
                            break;
                        }
                        Err(e) => last_err = Some(e),
                    }
                }
                match connected {
                    Some(stream) => stream,
                    None => {
                        return Err(last_err
                            .unwrap_or_else(|| {
                                io::Error::new(io::ErrorKind::NotFound, "host resolved to no addresses")
                            })
                            .into())
                    }
                }
            }
        };
        // Deadlines go on the socket before any TLS handshake runs over it.
        stream.set_read_timeout(self.read_timeout)?;
        stream.set_write_timeout(self.write_timeout)?;
        Ok(stream)
    }
}

impl Dialer for NetDialer {
    type Stream = TCPStreamType;

    fn dial(&self, host: &str, port: u16) -> Result<TCPStreamType> {
        debug!("Creating a Plain TCP Connection to {}:{}", host, port);
        Ok(TCPStreamType::Plain(self.connect_tcp(host, port)?))
    }

    fn dial_tls(&self, host: &str, port: u16, tls: &TlsOptions) -> Result<TCPStreamType> {
        debug!("Creating a SSL Connection to {}:{}", host, port);
        let tcp_stream = self.connect_tcp(host, port)?;
        let domain = match tls.domain {
            Some(ref domain) => &domain[..],
            None => host,
        };
        let mut builder = SslConnector::builder(SslMethod::tls())?;
        if !tls.verify_certificates {
            warn!("Certificate verification disabled for {}", domain);
            builder.set_verify(SslVerifyMode::NONE);
        }
        let connector = builder.build();
        let stream = connector
            .configure()?
            .verify_hostname(tls.verify_certificates)
            .connect(domain, tcp_stream)?;
        Ok(TCPStreamType::SSL(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    #[test]
    fn plain_dial_reaches_a_local_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = thread::spawn(move || {
            let (mut sock, _) = listener.accept().unwrap();
            sock.write_all(b"+OK hi\r\n").unwrap();
        });

        let dialer = NetDialer {
            connect_timeout: Some(Duration::from_secs(5)),
            read_timeout: Some(Duration::from_secs(5)),
            write_timeout: None,
        };
        let mut stream = dialer.dial("127.0.0.1", port).unwrap();
        let mut buf = [0u8; 8];
        stream.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"+OK hi\r\n");
        stream.close().unwrap();
        server.join().unwrap();
    }

    #[test]
    fn dial_to_a_closed_port_is_an_io_error() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let err = NetDialer::default().dial("127.0.0.1", port).unwrap_err();
        match *err.kind() {
            ErrorKind::Io(_) => {}
            ref other => panic!("unexpected error {:?}", other),
        }
    }
}
