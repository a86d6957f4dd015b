//! Built-in request handlers every server answers.
//!
//! - `REQ_PING`: liveness probe, replies `200 OK`.
//! - `REQ_NSINFO`: the namespace record, MsgPack encoded in the body.
//! - `REQ_SRVINFO`: the service advertisement, JSON encoded in the body.

use std::sync::{Arc, OnceLock};

use super::{HandlerRegistry, ReplyContext};
use crate::advertise::ServiceInfo;
use crate::error::Result;
use crate::namespace::NamespaceStore;
use crate::protocol::{status, Message};

/// Liveness probe.
pub const REQ_PING: &str = "REQ_PING";

/// Namespace information request.
pub const REQ_NSINFO: &str = "REQ_NSINFO";

/// Service advertisement request.
pub const REQ_SRVINFO: &str = "REQ_SRVINFO";

/// Matcher accepting requests with exactly this name.
pub fn name_is(name: &'static str) -> impl Fn(&Message) -> bool + Send + Sync + 'static {
    move |request: &Message| request.name() == name
}

/// Register the built-in handlers.
///
/// `advertisement` is read at request time; it stays empty until the
/// server has snapshotted its registry.
pub(crate) fn register_builtins(
    registry: &mut HandlerRegistry,
    namespace: Arc<NamespaceStore>,
    advertisement: Arc<OnceLock<ServiceInfo>>,
) -> Result<()> {
    registry.register("ping", name_is(REQ_PING), |_req: &Message, reply: &mut ReplyContext<'_, '_>| {
        reply.set_status(status::OK, "OK");
        Ok(())
    })?;

    let store = namespace.clone();
    registry.register(
        "nsinfo",
        name_is(REQ_NSINFO),
        move |_req: &Message, reply: &mut ReplyContext<'_, '_>| {
            match store.namespace_info() {
                Some(info) => {
                    reply.set_body_encoded(&info)?;
                    reply.set_status(status::OK, "OK");
                }
                None => reply.set_status(status::NOT_FOUND, "Namespace not configured"),
            }
            Ok(())
        },
    )?;

    registry.register(
        "srvinfo",
        name_is(REQ_SRVINFO),
        move |_req: &Message, reply: &mut ReplyContext<'_, '_>| {
            match advertisement.get() {
                Some(info) => {
                    let json = info.clone().with_namespace(&namespace).to_json()?;
                    reply.set_body_owned(json.into_bytes());
                    reply.set_status(status::OK, "OK");
                }
                None => reply.set_status(status::INTERNAL_ERROR, "Service not advertised yet"),
            }
            Ok(())
        },
    )?;

    Ok(())
}
