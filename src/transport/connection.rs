//! Client connections and the bounded reply write.
//!
//! A [`Connection`] is the write side of an accepted socket. Replies are
//! written with [`write_with_deadline`]: the whole buffer must go out before
//! the deadline expires, and the number of bytes actually accepted is
//! reported so the caller can tell a complete write from a short one.
//!
//! # Architecture
//!
//! ```text
//! ReplyContext::transmit ─► Connection::write_with_deadline ─► Socket
//!                                 │
//!                                 └─ tokio::time::timeout(deadline, write loop)
//! ```

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::handler::BoxFuture;

/// Structured peer-address record.
///
/// `Unknown` is the zero value left behind when resolution fails.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum AddrInfo {
    /// Address could not be resolved.
    #[default]
    Unknown,
    /// TCP/IP endpoint.
    Inet(SocketAddr),
    /// Unix domain socket endpoint (unnamed sockets have no path).
    Local(Option<PathBuf>),
}

impl AddrInfo {
    /// Check if the address was resolved.
    #[inline]
    pub fn is_known(&self) -> bool {
        !matches!(self, AddrInfo::Unknown)
    }

    /// Resolve an address, tolerating failure.
    pub fn resolve(result: io::Result<AddrInfo>) -> AddrInfo {
        result.unwrap_or_default()
    }
}

impl From<SocketAddr> for AddrInfo {
    fn from(addr: SocketAddr) -> Self {
        AddrInfo::Inet(addr)
    }
}

impl fmt::Display for AddrInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddrInfo::Unknown => f.write_str("?"),
            AddrInfo::Inet(addr) => write!(f, "{}", addr),
            AddrInfo::Local(Some(path)) => write!(f, "unix:{}", path.display()),
            AddrInfo::Local(None) => f.write_str("unix:"),
        }
    }
}

/// Write side of an accepted client connection.
pub trait Connection: Send {
    /// Address of the remote peer.
    fn peer_addr(&self) -> io::Result<AddrInfo>;

    /// Address of the local endpoint.
    fn local_addr(&self) -> io::Result<AddrInfo>;

    /// Write `data` within `deadline`, returning how many bytes were accepted.
    ///
    /// A count lower than `data.len()` means the peer stopped accepting
    /// bytes. Deadline expiry is reported as `io::ErrorKind::TimedOut`.
    fn write_with_deadline<'a>(
        &'a mut self,
        deadline: Duration,
        data: &'a [u8],
    ) -> BoxFuture<'a, io::Result<usize>>;
}

/// Write `data` to `writer` within `deadline`.
///
/// Keeps writing until every byte is accepted or the writer accepts zero
/// bytes, then flushes. Returns the number of bytes written.
pub async fn write_with_deadline<W>(
    writer: &mut W,
    deadline: Duration,
    data: &[u8],
) -> io::Result<usize>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    match tokio::time::timeout(deadline, write_fully(writer, data)).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("write timed out after {}ms", deadline.as_millis()),
        )),
    }
}

async fn write_fully<W>(writer: &mut W, data: &[u8]) -> io::Result<usize>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut written = 0;

    while written < data.len() {
        let n = writer.write(&data[written..]).await?;
        if n == 0 {
            break;
        }
        written += n;
    }

    writer.flush().await?;
    Ok(written)
}

impl Connection for TcpStream {
    fn peer_addr(&self) -> io::Result<AddrInfo> {
        TcpStream::peer_addr(self).map(AddrInfo::from)
    }

    fn local_addr(&self) -> io::Result<AddrInfo> {
        TcpStream::local_addr(self).map(AddrInfo::from)
    }

    fn write_with_deadline<'a>(
        &'a mut self,
        deadline: Duration,
        data: &'a [u8],
    ) -> BoxFuture<'a, io::Result<usize>> {
        Box::pin(write_with_deadline(self, deadline, data))
    }
}

impl Connection for tokio::net::tcp::OwnedWriteHalf {
    fn peer_addr(&self) -> io::Result<AddrInfo> {
        tokio::net::tcp::OwnedWriteHalf::peer_addr(self).map(AddrInfo::from)
    }

    fn local_addr(&self) -> io::Result<AddrInfo> {
        tokio::net::tcp::OwnedWriteHalf::local_addr(self).map(AddrInfo::from)
    }

    fn write_with_deadline<'a>(
        &'a mut self,
        deadline: Duration,
        data: &'a [u8],
    ) -> BoxFuture<'a, io::Result<usize>> {
        Box::pin(write_with_deadline(self, deadline, data))
    }
}

#[cfg(unix)]
impl Connection for tokio::net::unix::OwnedWriteHalf {
    fn peer_addr(&self) -> io::Result<AddrInfo> {
        let addr = tokio::net::unix::OwnedWriteHalf::peer_addr(self)?;
        Ok(AddrInfo::Local(addr.as_pathname().map(PathBuf::from)))
    }

    fn local_addr(&self) -> io::Result<AddrInfo> {
        let addr = tokio::net::unix::OwnedWriteHalf::local_addr(self)?;
        Ok(AddrInfo::Local(addr.as_pathname().map(PathBuf::from)))
    }

    fn write_with_deadline<'a>(
        &'a mut self,
        deadline: Duration,
        data: &'a [u8],
    ) -> BoxFuture<'a, io::Result<usize>> {
        Box::pin(write_with_deadline(self, deadline, data))
    }
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn peer_addr(&self) -> io::Result<AddrInfo> {
        (**self).peer_addr()
    }

    fn local_addr(&self) -> io::Result<AddrInfo> {
        (**self).local_addr()
    }

    fn write_with_deadline<'a>(
        &'a mut self,
        deadline: Duration,
        data: &'a [u8],
    ) -> BoxFuture<'a, io::Result<usize>> {
        (**self).write_with_deadline(deadline, data)
    }
}
