//! Request context for handlers.
//!
//! Describes one inbound request: the connection it arrived on, when it
//! started, both endpoint addresses and the decoded request message.
//! The context borrows the connection; dropping it never closes the socket.
//!
//! # Example
//!
//! ```ignore
//! let mut ctx = RequestContext::new(&mut connection, &request, None);
//! tracing::debug!(peer = %ctx.remote_addr(), "request started");
//! ```

use std::time::{Duration, Instant};

use crate::protocol::Message;
use crate::transport::{AddrInfo, Connection};

/// Default server operation timeout.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Context describing one inbound request.
///
/// Exclusively owned by the task serving the request.
pub struct RequestContext<'s> {
    socket: &'s mut dyn Connection,
    request: &'s Message,
    start: Instant,
    local_addr: AddrInfo,
    remote_addr: AddrInfo,
    operation_timeout: Duration,
}

impl<'s> RequestContext<'s> {
    /// Create a request context.
    ///
    /// The remote address is resolved from the socket. The local address is
    /// `known_local` when the accepting side already knows it, otherwise it
    /// is queried from the socket. Resolution failures leave
    /// [`AddrInfo::Unknown`].
    pub fn new(
        socket: &'s mut dyn Connection,
        request: &'s Message,
        known_local: Option<&AddrInfo>,
    ) -> Self {
        let remote_addr = AddrInfo::resolve(socket.peer_addr());
        let local_addr = match known_local {
            Some(addr) => addr.clone(),
            None => AddrInfo::resolve(socket.local_addr()),
        };

        Self {
            socket,
            request,
            start: Instant::now(),
            local_addr,
            remote_addr,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Set the server's default operation timeout.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// The inbound request.
    #[inline]
    pub fn request(&self) -> &'s Message {
        self.request
    }

    /// When the request started.
    #[inline]
    pub fn start_time(&self) -> Instant {
        self.start
    }

    /// Time spent on the request so far.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Local endpoint address.
    #[inline]
    pub fn local_addr(&self) -> &AddrInfo {
        &self.local_addr
    }

    /// Remote peer address.
    #[inline]
    pub fn remote_addr(&self) -> &AddrInfo {
        &self.remote_addr
    }

    /// The server's default operation timeout.
    #[inline]
    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
    }

    pub(crate) fn socket(&mut self) -> &mut (dyn Connection + 's) {
        &mut *self.socket
    }

    /// Release the address records.
    ///
    /// Idempotent. The socket stays open.
    pub fn clear(&mut self) {
        self.local_addr = AddrInfo::Unknown;
        self.remote_addr = AddrInfo::Unknown;
    }
}
