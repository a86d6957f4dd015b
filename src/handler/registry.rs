//! Handler registry for dispatching requests by matcher.
//!
//! Each entry pairs a matcher predicate with a handler. Entries are kept
//! newest first: dispatch scans front to back and picks the first entry
//! whose matcher accepts the request, so the most recently registered
//! matching handler wins. The registry only grows; there is no removal.
//!
//! Tagged handlers also declare [`ServiceTag`]s, which are copied into
//! the registry's tag collection for service advertisement.
//!
//! # Example
//!
//! ```ignore
//! use gridd::handler::HandlerRegistry;
//!
//! let mut registry = HandlerRegistry::new();
//!
//! registry.register(
//!     "ping",
//!     |req: &Message| req.name() == "REQ_PING",
//!     |_req: &Message, reply: &mut ReplyContext<'_, '_>| {
//!         reply.set_status(200, "OK");
//!         Ok(())
//!     },
//! )?;
//! ```

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;

use tracing::debug;

use super::{ReplyContext, ServiceTag};
use crate::error::{GriddError, Result};
use crate::protocol::Message;

/// Result type for handler functions.
pub type HandlerResult = Result<()>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Longest handler name kept by the registry, in bytes.
pub const MAX_HANDLER_NAME_LEN: usize = 31;

/// Predicate deciding whether a handler processes a request.
pub trait Matcher: Send + Sync {
    /// Check whether `request` is for this handler.
    fn matches(&self, request: &Message) -> bool;
}

impl<F> Matcher for F
where
    F: Fn(&Message) -> bool + Send + Sync,
{
    fn matches(&self, request: &Message) -> bool {
        self(request)
    }
}

/// Simple handler: fills in the reply, the server transmits it.
pub trait Handler: Send + Sync {
    /// Handle `request`, recording the outcome in `reply`.
    fn call(&self, request: &Message, reply: &mut ReplyContext<'_, '_>) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&Message, &mut ReplyContext<'_, '_>) -> HandlerResult + Send + Sync,
{
    fn call(&self, request: &Message, reply: &mut ReplyContext<'_, '_>) -> HandlerResult {
        self(request, reply)
    }
}

/// Tagged handler: asynchronous, and may transmit replies itself.
///
/// Typically sends `206` partial replies with
/// [`ReplyContext::transmit`] before leaving the final one to the server.
pub trait TaggedHandler: Send + Sync {
    /// Handle the request bound to `reply`.
    fn call<'a>(&'a self, reply: &'a mut ReplyContext<'_, '_>) -> BoxFuture<'a, HandlerResult>;
}

/// The handler shape of an entry.
pub enum HandlerKind {
    /// Synchronous handler.
    Simple(Box<dyn Handler>),
    /// Asynchronous handler with service tags.
    Tagged(Box<dyn TaggedHandler>),
}

impl HandlerKind {
    /// Wrap a simple handler.
    pub fn simple<H: Handler + 'static>(handler: H) -> Self {
        HandlerKind::Simple(Box::new(handler))
    }

    /// Wrap a tagged handler.
    pub fn tagged<H: TaggedHandler + 'static>(handler: H) -> Self {
        HandlerKind::Tagged(Box::new(handler))
    }

    fn label(&self) -> &'static str {
        match self {
            HandlerKind::Simple(_) => "simple",
            HandlerKind::Tagged(_) => "tagged",
        }
    }
}

/// A registered (matcher, handler) pair.
pub struct HandlerEntry {
    name: String,
    matcher: Box<dyn Matcher>,
    kind: HandlerKind,
    tags: Vec<ServiceTag>,
}

impl HandlerEntry {
    /// Handler name, truncated to [`MAX_HANDLER_NAME_LEN`].
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is a tagged handler.
    #[inline]
    pub fn is_tagged(&self) -> bool {
        matches!(self.kind, HandlerKind::Tagged(_))
    }

    /// Tags declared at registration.
    #[inline]
    pub fn tags(&self) -> &[ServiceTag] {
        &self.tags
    }

    /// Check the matcher against `request`.
    #[inline]
    pub fn matches(&self, request: &Message) -> bool {
        self.matcher.matches(request)
    }

    pub(crate) async fn invoke(&self, request: &Message, reply: &mut ReplyContext<'_, '_>) -> HandlerResult {
        match &self.kind {
            HandlerKind::Simple(handler) => handler.call(request, reply),
            HandlerKind::Tagged(handler) => handler.call(reply).await,
        }
    }
}

/// Registry of request handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    /// Newest entry first.
    entries: VecDeque<HandlerEntry>,
    /// Tags aggregated from tagged handlers, created on the first one.
    service_tags: Option<Vec<ServiceTag>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a simple handler.
    pub fn register<M, H>(&mut self, name: &str, matcher: M, handler: H) -> Result<()>
    where
        M: Fn(&Message) -> bool + Send + Sync + 'static,
        H: Fn(&Message, &mut ReplyContext<'_, '_>) -> HandlerResult + Send + Sync + 'static,
    {
        self.register_entry(
            name,
            Some(Box::new(matcher)),
            Some(HandlerKind::simple(handler)),
            None,
        )
    }

    /// Register a tagged handler and absorb a copy of its tags.
    pub fn register_tagged<M, H>(
        &mut self,
        name: &str,
        matcher: M,
        handler: H,
        tags: &[ServiceTag],
    ) -> Result<()>
    where
        M: Fn(&Message) -> bool + Send + Sync + 'static,
        H: TaggedHandler + 'static,
    {
        self.register_entry(
            name,
            Some(Box::new(matcher)),
            Some(HandlerKind::tagged(handler)),
            Some(tags),
        )
    }

    /// Register an entry from its parts.
    ///
    /// Names longer than [`MAX_HANDLER_NAME_LEN`] bytes are silently
    /// truncated. A failed registration leaves the registry unchanged.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the name is empty or the matcher or handler is
    /// missing.
    pub fn register_entry(
        &mut self,
        name: &str,
        matcher: Option<Box<dyn Matcher>>,
        kind: Option<HandlerKind>,
        tags: Option<&[ServiceTag]>,
    ) -> Result<()> {
        if name.is_empty() {
            return Err(GriddError::InvalidArgument("handler name"));
        }
        let matcher = matcher.ok_or(GriddError::InvalidArgument("matcher"))?;
        let kind = kind.ok_or(GriddError::InvalidArgument("handler"))?;

        let tags = tags.map(<[ServiceTag]>::to_vec).unwrap_or_default();
        if matches!(kind, HandlerKind::Tagged(_)) {
            self.service_tags
                .get_or_insert_with(Vec::new)
                .extend(tags.iter().cloned());
        }

        let name = truncate_name(name);
        debug!(name, kind = kind.label(), tags = tags.len(), "new message handler added");

        self.entries.push_front(HandlerEntry {
            name: name.to_owned(),
            matcher,
            kind,
            tags,
        });
        Ok(())
    }

    /// Select the handler for `request`: the newest entry whose matcher accepts it.
    pub fn select(&self, request: &Message) -> Option<&HandlerEntry> {
        self.entries.iter().find(|entry| entry.matches(request))
    }

    /// Dispatch the request bound to `reply` to the selected handler.
    ///
    /// # Errors
    ///
    /// `HandlerNotFound` if no matcher accepts the request, otherwise
    /// whatever the handler returns.
    pub async fn dispatch(&self, reply: &mut ReplyContext<'_, '_>) -> HandlerResult {
        let request = reply.request();
        let entry = self
            .select(request)
            .ok_or_else(|| GriddError::HandlerNotFound(request.name().to_owned()))?;

        debug!(handler = entry.name(), request = request.name(), "dispatching");
        entry.invoke(request, reply).await
    }

    /// Names of all entries, newest first.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(HandlerEntry::name)
    }

    /// Iterate over all entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &HandlerEntry> {
        self.entries.iter()
    }

    /// Number of registered entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no handler is registered.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Aggregated service tags, `None` until a tagged handler is registered.
    #[inline]
    pub fn service_tags(&self) -> Option<&[ServiceTag]> {
        self.service_tags.as_deref()
    }
}

fn truncate_name(name: &str) -> &str {
    if name.len() <= MAX_HANDLER_NAME_LEN {
        return name;
    }
    let mut end = MAX_HANDLER_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}
