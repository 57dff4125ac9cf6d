//! Blocking transport adapter.
//!
//! The client speaks over a plain TCP stream or, with the `tls` feature,
//! a TLS-wrapped one (LDAPS). The adapter owns connect/read/write/close
//! and nothing protocol-shaped; read and write failures bubble up and the
//! client translates them into a disconnect.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::result::{LdapError, Result};

use log::debug;
#[cfg(feature = "tls")]
use native_tls::{TlsConnector, TlsStream};

/// Additional settings for an LDAP connection.
///
/// The structure is opaque for extensibility; an instance with default
/// values comes from [`new()`](#method.new), and every setting is
/// replaced through a builder-like interface.
#[derive(Clone, Default)]
pub struct ConnSettings {
    conn_timeout: Option<Duration>,
    op_timeout: Option<Duration>,
    #[cfg(feature = "tls")]
    connector: Option<TlsConnector>,
    #[cfg(feature = "tls")]
    no_tls_verify: bool,
}

/// Default bound on connecting and on waiting for one response.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

impl ConnSettings {
    /// Create an instance of the structure with default settings.
    pub fn new() -> ConnSettings {
        ConnSettings {
            ..Default::default()
        }
    }

    /// Set the connection timeout. Defaults to
    /// [`DEFAULT_TIMEOUT`](constant.DEFAULT_TIMEOUT.html).
    pub fn set_conn_timeout(mut self, timeout: Duration) -> Self {
        self.conn_timeout = Some(timeout);
        self
    }

    /// Set the timeout for a single read or write on the socket, which
    /// bounds how long one operation can block waiting for the server.
    /// Defaults to [`DEFAULT_TIMEOUT`](constant.DEFAULT_TIMEOUT.html).
    pub fn set_op_timeout(mut self, timeout: Duration) -> Self {
        self.op_timeout = Some(timeout);
        self
    }

    #[cfg(feature = "tls")]
    /// Set a custom TLS connector, which enables setting various options
    /// when establishing a secure connection. The default of `None` uses
    /// a connector with default settings.
    pub fn set_connector(mut self, connector: TlsConnector) -> Self {
        self.connector = Some(connector);
        self
    }

    #[cfg(feature = "tls")]
    /// If true, try to establish a TLS connection without certificate
    /// verification. Defaults to `false`.
    pub fn set_no_tls_verify(mut self, no_tls_verify: bool) -> Self {
        self.no_tls_verify = no_tls_verify;
        self
    }

    pub(crate) fn op_timeout(&self) -> Duration {
        self.op_timeout.unwrap_or(DEFAULT_TIMEOUT)
    }
}

/// The byte stream carrying LDAP frames.
pub(crate) enum LdapStream {
    Tcp(TcpStream),
    #[cfg(feature = "tls")]
    Tls(Box<TlsStream<TcpStream>>),
}

impl LdapStream {
    /// Connect to `host:port`, optionally performing a TLS handshake with
    /// `host` as the presented name.
    pub(crate) fn connect(
        host: &str,
        port: u16,
        use_tls: bool,
        settings: &ConnSettings,
    ) -> Result<LdapStream> {
        let addr = (host, port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| LdapError::Io {
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("no address for {}:{}", host, port),
                ),
            })?;
        let timeout = settings.conn_timeout.unwrap_or(DEFAULT_TIMEOUT);
        let stream = TcpStream::connect_timeout(&addr, timeout)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(settings.op_timeout()))?;
        stream.set_write_timeout(Some(settings.op_timeout()))?;
        debug!("connected to {}", addr);
        if !use_tls {
            return Ok(LdapStream::Tcp(stream));
        }
        #[cfg(feature = "tls")]
        {
            let connector = match settings.connector.clone() {
                Some(connector) => connector,
                None => TlsConnector::builder()
                    .danger_accept_invalid_certs(settings.no_tls_verify)
                    .build()?,
            };
            let tls = connector
                .connect(host, stream)
                .map_err(|e| LdapError::TlsHandshake(e.to_string()))?;
            debug!("TLS handshake with {} complete", host);
            Ok(LdapStream::Tls(Box::new(tls)))
        }
        #[cfg(not(feature = "tls"))]
        {
            Err(LdapError::Io {
                source: std::io::Error::new(
                    std::io::ErrorKind::Unsupported,
                    "TLS support not compiled in",
                ),
            })
        }
    }

    /// Close both directions of the stream. Errors are ignored; the
    /// socket is gone either way.
    pub(crate) fn shutdown(&mut self) {
        let stream = match self {
            LdapStream::Tcp(s) => s,
            #[cfg(feature = "tls")]
            LdapStream::Tls(s) => s.get_mut(),
        };
        let _ = stream.shutdown(Shutdown::Both);
    }
}

impl Read for LdapStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            LdapStream::Tcp(s) => s.read(buf),
            #[cfg(feature = "tls")]
            LdapStream::Tls(s) => s.read(buf),
        }
    }
}

impl Write for LdapStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            LdapStream::Tcp(s) => s.write(buf),
            #[cfg(feature = "tls")]
            LdapStream::Tls(s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            LdapStream::Tcp(s) => s.flush(),
            #[cfg(feature = "tls")]
            LdapStream::Tls(s) => s.flush(),
        }
    }
}
