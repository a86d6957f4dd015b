//! Server builder and connection loop.
//!
//! The [`ServerBuilder`] provides a fluent API for registering handlers
//! and configuring the server. The [`Server`] manages the lifecycle:
//! 1. Register the built-in handlers and snapshot the advertisement
//! 2. Bind the listener
//! 3. Accept connections, one task per connection
//! 4. Read requests, dispatch them and transmit the replies
//!
//! # Example
//!
//! ```ignore
//! use gridd::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> gridd::Result<()> {
//!     let server = Server::builder()
//!         .config(ServerConfig::load("/etc/gridd.toml")?)
//!         .handle(
//!             "echo",
//!             |req: &Message| req.name() == "REQ_ECHO",
//!             |_req: &Message, reply: &mut ReplyContext<'_, '_>| {
//!                 reply.set_status(200, "OK");
//!                 Ok(())
//!             },
//!         )?
//!         .bind()
//!         .await?;
//!
//!     server.run().await
//! }
//! ```

use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use crate::advertise::ServiceInfo;
use crate::config::ServerConfig;
use crate::error::{GriddError, Result};
use crate::handler::builtin::register_builtins;
use crate::handler::{
    HandlerRegistry, HandlerResult, ReplyContext, RequestContext, ServiceTag, TaggedHandler,
};
use crate::namespace::NamespaceStore;
use crate::protocol::{status, Message, MessageBuffer};
use crate::transport::{AddrInfo, Connection, Listener};

/// Pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Builder for configuring and creating a request server.
pub struct ServerBuilder {
    registry: HandlerRegistry,
    config: ServerConfig,
    namespace: Arc<NamespaceStore>,
}

impl ServerBuilder {
    /// Create a new server builder with the default configuration.
    pub fn new() -> Self {
        Self {
            registry: HandlerRegistry::new(),
            config: ServerConfig::default(),
            namespace: Arc::new(NamespaceStore::new()),
        }
    }

    /// Register a simple handler.
    ///
    /// Handlers registered later take precedence over earlier ones
    /// matching the same requests. The built-in `REQ_PING`, `REQ_NSINFO`
    /// and `REQ_SRVINFO` handlers are registered by [`bind`](Self::bind)
    /// after every user handler, so those requests cannot be overridden.
    pub fn handle<M, H>(mut self, name: &str, matcher: M, handler: H) -> Result<Self>
    where
        M: Fn(&Message) -> bool + Send + Sync + 'static,
        H: Fn(&Message, &mut ReplyContext<'_, '_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.registry.register(name, matcher, handler)?;
        Ok(self)
    }

    /// Register a tagged handler and its service tags.
    ///
    /// Same precedence rules as [`handle`](Self::handle).
    pub fn handle_tagged<M, H>(
        mut self,
        name: &str,
        matcher: M,
        handler: H,
        tags: &[ServiceTag],
    ) -> Result<Self>
    where
        M: Fn(&Message) -> bool + Send + Sync + 'static,
        H: TaggedHandler + 'static,
    {
        self.registry.register_tagged(name, matcher, handler, tags)?;
        Ok(self)
    }

    /// Set the server configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Share an existing namespace store.
    pub fn namespace(mut self, store: Arc<NamespaceStore>) -> Self {
        self.namespace = store;
        self
    }

    /// Register the built-in handlers and bind the listener.
    ///
    /// Built-in requests (`REQ_PING`, `REQ_NSINFO`, `REQ_SRVINFO`) are
    /// registered last, so they cannot be shadowed.
    pub async fn bind(mut self) -> Result<Server> {
        let advertisement = Arc::new(OnceLock::new());
        register_builtins(&mut self.registry, self.namespace.clone(), advertisement.clone())?;

        let listener = Listener::bind(&self.config.bind_address).await?;
        let local_addr = AddrInfo::resolve(listener.local_addr());
        let _ = advertisement.set(ServiceInfo::from_registry(&self.registry, &local_addr));

        debug!(
            addr = %local_addr,
            handlers = self.registry.len(),
            "server bound"
        );

        Ok(Server {
            listener,
            local_addr,
            namespace: self.namespace,
            shared: Arc::new(Shared {
                registry: self.registry,
                config: self.config,
            }),
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared by all connection tasks.
struct Shared {
    registry: HandlerRegistry,
    config: ServerConfig,
}

/// A bound request server.
pub struct Server {
    listener: Listener,
    local_addr: AddrInfo,
    namespace: Arc<NamespaceStore>,
    shared: Arc<Shared>,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Address the server listens on.
    pub fn local_addr(&self) -> &AddrInfo {
        &self.local_addr
    }

    /// The namespace store served by `REQ_NSINFO`.
    pub fn namespace(&self) -> &Arc<NamespaceStore> {
        &self.namespace
    }

    /// The handler registry.
    pub fn registry(&self) -> &HandlerRegistry {
        &self.shared.registry
    }

    /// Serve connections forever.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Serve connections until `shutdown` completes.
    ///
    /// Connections already being served keep running in their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let limit = Arc::new(Semaphore::new(self.shared.config.max_connections));
        tokio::pin!(shutdown);

        loop {
            let accepted = tokio::select! {
                _ = &mut shutdown => {
                    debug!(addr = %self.local_addr, "server shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => accepted,
            };

            let accepted = match accepted {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Accept error: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                    continue;
                }
            };

            let permit = match limit.clone().try_acquire_owned() {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(peer = %accepted.peer, "Connection limit reached, dropping connection");
                    continue;
                }
            };

            let shared = self.shared.clone();
            tokio::spawn(async move {
                let _permit = permit;
                let peer = accepted.peer.clone();
                debug!(peer = %peer, "connection accepted");

                let result = serve_connection(
                    accepted.reader,
                    accepted.connection,
                    &shared.registry,
                    &shared.config,
                    accepted.local_hint,
                )
                .await;

                match result {
                    Ok(()) => debug!(peer = %peer, "connection closed"),
                    Err(e) => warn!(peer = %peer, error = %e, "connection dropped"),
                }
            });
        }
    }
}

/// Serve requests arriving on one connection until the peer closes it.
///
/// Requests are served one at a time, in arrival order.
///
/// # Errors
///
/// Read failures, malformed frames and failed reply transmissions end the
/// connection with an error.
pub async fn serve_connection<R, C>(
    mut reader: R,
    mut connection: C,
    registry: &HandlerRegistry,
    config: &ServerConfig,
    local_hint: Option<AddrInfo>,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    C: Connection,
{
    let mut buffer = MessageBuffer::with_max_size(config.max_message_size);
    let mut buf = vec![0u8; config.read_buffer_size.max(1)];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(e) => return Err(GriddError::Io(e)),
        };

        for request in buffer.push(&buf[..n])? {
            serve_request(&mut connection, &request, registry, config, local_hint.as_ref()).await?;
        }
    }
}

async fn serve_request(
    connection: &mut dyn Connection,
    request: &Message,
    registry: &HandlerRegistry,
    config: &ServerConfig,
    local_hint: Option<&AddrInfo>,
) -> Result<()> {
    let mut ctx = RequestContext::new(connection, request, local_hint)
        .with_operation_timeout(config.operation_timeout());
    let mut reply = ReplyContext::new(&mut ctx);

    let Some(entry) = registry.select(request) else {
        reply.clear_full();
        reply.set_status(
            status::BAD_REQUEST,
            format!("Unexpected request type: {}", request.name()),
        );
        reply.transmit().await?;
        debug!(request = request.name(), code = reply.code(), "no handler matched");
        return Ok(());
    };

    debug!(handler = entry.name(), request = request.name(), "dispatching");
    match entry.invoke(request, &mut reply).await {
        Ok(()) => {
            if !reply.is_finalized() {
                if reply.code() == 0 {
                    reply.clear_partial();
                    reply.set_status(status::INTERNAL_ERROR, "Handler did not set a reply status");
                } else if !status::is_final(reply.code()) {
                    warn!(
                        request = request.name(),
                        code = reply.code(),
                        "handler returned without a final reply"
                    );
                    reply.clear_partial();
                    reply.set_status(
                        status::INTERNAL_ERROR,
                        "Handler did not set a final reply status",
                    );
                }
                reply.transmit().await?;
            }
        }
        Err(e @ GriddError::TransmissionFailure(_)) => return Err(e),
        Err(e) => {
            if reply.is_finalized() {
                warn!(request = request.name(), error = %e, "handler failed after its final reply");
            } else {
                let code = match &e {
                    GriddError::Handler { code, .. } => *code,
                    _ => status::INTERNAL_ERROR,
                };
                reply.clear_partial();
                reply.set_status(code, e.to_string());
                reply.transmit().await?;
            }
        }
    }

    debug!(
        request = request.name(),
        peer = %reply.request_context().remote_addr(),
        code = reply.code(),
        elapsed_us = reply.request_context().elapsed().as_micros() as u64,
        "request served"
    );
    Ok(())
}
