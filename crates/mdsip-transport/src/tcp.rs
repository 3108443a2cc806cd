use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// A connected TCP stream to an MDSip server.
///
/// `Read` and `Write` delegate to the underlying socket, so the link
/// plugs directly into the message reader and writer.
#[derive(Debug)]
pub struct TcpLink {
    stream: TcpStream,
    peer: SocketAddr,
}

impl TcpLink {
    /// The well-known MDSip port.
    pub const DEFAULT_PORT: u16 = 8000;

    /// Connect to `host`, which may carry an explicit `host:port`.
    pub fn connect(host: &str) -> Result<Self> {
        Self::connect_inner(host, None)
    }

    /// Connect with a per-address timeout.
    pub fn connect_timeout(host: &str, timeout: Duration) -> Result<Self> {
        Self::connect_inner(host, Some(timeout))
    }

    fn connect_inner(host: &str, timeout: Option<Duration>) -> Result<Self> {
        let addrs = resolve(host)?;

        let mut last_err = None;
        for addr in addrs {
            let attempt = match timeout {
                Some(t) => TcpStream::connect_timeout(&addr, t),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    // The protocol is chatty with small messages, so
                    // batching them up only adds latency.
                    stream.set_nodelay(true)?;
                    debug!(%addr, "connected");
                    return Ok(Self { stream, peer: addr });
                }
                Err(err) => last_err = Some(err),
            }
        }

        Err(TransportError::Connect {
            host: host.to_string(),
            source: last_err
                .unwrap_or_else(|| std::io::Error::other("no addresses attempted")),
        })
    }

    /// The address this link is connected to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }

    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.stream.set_write_timeout(timeout)?;
        Ok(())
    }

    /// Clone the link; both handles refer to the same socket.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            stream: self.stream.try_clone()?,
            peer: self.peer,
        })
    }

    /// Shut down both directions of the socket.
    pub fn shutdown(&self) -> Result<()> {
        self.stream.shutdown(std::net::Shutdown::Both)?;
        Ok(())
    }
}

impl Read for TcpLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpLink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.stream.flush()
    }
}

/// Resolve a host string, applying the default port when none is given.
pub fn resolve(host: &str) -> Result<Vec<SocketAddr>> {
    let to_err = |source| TransportError::Resolve {
        host: host.to_string(),
        source,
    };

    let addrs: Vec<SocketAddr> = if host.contains(':') {
        host.to_socket_addrs().map_err(to_err)?.collect()
    } else {
        (host, TcpLink::DEFAULT_PORT)
            .to_socket_addrs()
            .map_err(to_err)?
            .collect()
    };

    if addrs.is_empty() {
        return Err(TransportError::NoAddresses {
            host: host.to_string(),
        });
    }
    Ok(addrs)
}
