//! Listening sockets for the request server.
//!
//! - TCP: `host:port`
//! - Unix: an absolute socket path (Unix only)
//!
//! # Example
//!
//! ```ignore
//! use gridd::transport::Listener;
//!
//! let listener = Listener::bind("127.0.0.1:6000").await?;
//! let accepted = listener.accept().await?;
//! println!("client {}", accepted.peer);
//! ```

use std::io;
use std::net::SocketAddr;

use tokio::io::AsyncRead;
use tokio::net::TcpListener;

use super::{AddrInfo, Connection};
use crate::error::Result;

/// Read half of an accepted connection.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// An accepted client connection, split into halves.
pub struct Accepted {
    /// Read half, fed to the message buffer.
    pub reader: BoxedReader,
    /// Write half, bound to request contexts.
    pub connection: Box<dyn Connection>,
    /// Local address already known to the listener, if any.
    pub local_hint: Option<AddrInfo>,
    /// Remote peer, for logging.
    pub peer: AddrInfo,
}

/// A bound listener.
pub enum Listener {
    /// TCP listener.
    Tcp(TcpListener),
    /// Unix domain socket listener.
    #[cfg(unix)]
    Unix(unix_impl::UnixSocketListener),
}

impl Listener {
    /// Bind to `address`.
    ///
    /// Addresses starting with `/` are Unix socket paths; anything else is
    /// parsed as a TCP `host:port`.
    pub async fn bind(address: &str) -> Result<Self> {
        #[cfg(unix)]
        if address.starts_with('/') {
            return Ok(Listener::Unix(unix_impl::UnixSocketListener::bind(address)?));
        }

        Ok(Listener::Tcp(TcpListener::bind(address).await?))
    }

    /// Get the bound local address.
    pub fn local_addr(&self) -> io::Result<AddrInfo> {
        match self {
            Listener::Tcp(listener) => listener.local_addr().map(AddrInfo::from),
            #[cfg(unix)]
            Listener::Unix(listener) => Ok(listener.addr()),
        }
    }

    /// Accept a single connection.
    pub async fn accept(&self) -> Result<Accepted> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                let local_hint = listener.local_addr().ok().and_then(concrete_hint);
                let (reader, writer) = stream.into_split();
                Ok(Accepted {
                    reader: Box::new(reader),
                    connection: Box::new(writer),
                    local_hint,
                    peer: AddrInfo::Inet(peer),
                })
            }
            #[cfg(unix)]
            Listener::Unix(listener) => listener.accept().await,
        }
    }
}

/// A wildcard bind says nothing about which interface a client reached.
fn concrete_hint(addr: SocketAddr) -> Option<AddrInfo> {
    if addr.ip().is_unspecified() {
        None
    } else {
        Some(AddrInfo::Inet(addr))
    }
}

#[cfg(unix)]
mod unix_impl {
    use std::path::{Path, PathBuf};

    use tokio::net::UnixListener;

    use super::Accepted;
    use crate::error::Result;
    use crate::transport::AddrInfo;

    /// Unix domain socket listener that removes its socket file on drop.
    pub struct UnixSocketListener {
        listener: UnixListener,
        path: PathBuf,
    }

    impl UnixSocketListener {
        /// Bind to a Unix socket path.
        ///
        /// Removes any stale socket file at the path before binding.
        pub fn bind(path: &str) -> Result<Self> {
            if Path::new(path).exists() {
                std::fs::remove_file(path)?;
            }

            let listener = UnixListener::bind(path)?;
            Ok(Self {
                listener,
                path: PathBuf::from(path),
            })
        }

        pub fn addr(&self) -> AddrInfo {
            AddrInfo::Local(Some(self.path.clone()))
        }

        pub async fn accept(&self) -> Result<Accepted> {
            let (stream, _addr) = self.listener.accept().await?;
            let (reader, writer) = stream.into_split();
            Ok(Accepted {
                reader: Box::new(reader),
                connection: Box::new(writer),
                local_hint: Some(self.addr()),
                peer: AddrInfo::Local(None),
            })
        }
    }

    impl Drop for UnixSocketListener {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpStream;

    #[test]
    fn test_wildcard_bind_gives_no_hint() {
        assert!(concrete_hint("0.0.0.0:6000".parse().unwrap()).is_none());
        assert!(concrete_hint("[::]:6000".parse().unwrap()).is_none());

        let addr: SocketAddr = "10.0.0.5:6000".parse().unwrap();
        assert_eq!(concrete_hint(addr), Some(AddrInfo::Inet(addr)));
    }

    #[tokio::test]
    async fn test_tcp_bind_and_accept() {
        let listener = Listener::bind("127.0.0.1:0").await.unwrap();
        let addr = match listener.local_addr().unwrap() {
            AddrInfo::Inet(addr) => addr,
            other => panic!("unexpected address {:?}", other),
        };

        let client = TcpStream::connect(addr).await.unwrap();
        let accepted = listener.accept().await.unwrap();

        assert_eq!(accepted.local_hint, Some(AddrInfo::Inet(addr)));
        assert_eq!(accepted.peer, AddrInfo::Inet(client.local_addr().unwrap()));
        assert_eq!(
            accepted.connection.peer_addr().unwrap(),
            AddrInfo::Inet(client.local_addr().unwrap())
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_bind_accept_and_cleanup() {
        let path = std::env::temp_dir().join(format!("gridd-test-{}.sock", std::process::id()));
        let path_str = path.to_str().unwrap().to_string();

        let listener = Listener::bind(&path_str).await.unwrap();
        assert!(path.exists());

        let _client = tokio::net::UnixStream::connect(&path).await.unwrap();
        let accepted = listener.accept().await.unwrap();
        assert_eq!(accepted.local_hint, Some(AddrInfo::Local(Some(path.clone()))));

        drop(accepted);
        drop(listener);
        assert!(!path.exists());
    }
}
