//! Integration tests for gridd.
//!
//! These tests run a real server on a loopback TCP socket and talk to it
//! with framed requests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;

use gridd::codec::MsgPackCodec;
use gridd::handler::builtin::{name_is, REQ_NSINFO, REQ_PING, REQ_SRVINFO};
use gridd::handler::{BoxFuture, HandlerResult, ReplyContext, ServiceTag, TaggedHandler};
use gridd::namespace::{NamespaceInfo, NamespaceStore};
use gridd::protocol::{status, Message, MessageBuffer, MessageCodec};
use gridd::transport::AddrInfo;
use gridd::{GriddError, Server, ServerBuilder, ServerConfig};

struct Running {
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
}

impl Drop for Running {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

fn loopback() -> ServerConfig {
    ServerConfig {
        bind_address: "127.0.0.1:0".to_string(),
        ..ServerConfig::default()
    }
}

async fn start(builder: ServerBuilder) -> Running {
    let server = builder.config(loopback()).bind().await.unwrap();
    let addr = match server.local_addr() {
        AddrInfo::Inet(addr) => *addr,
        other => panic!("unexpected address {}", other),
    };

    let (stop, stopped) = oneshot::channel::<()>();
    tokio::spawn(server.run_until(async move {
        let _ = stopped.await;
    }));

    Running {
        addr,
        stop: Some(stop),
    }
}

/// Send `request` and read replies until a final one arrives.
async fn call(stream: &mut TcpStream, request: &Message) -> Vec<Message> {
    let frame = MessageCodec::marshal(request).unwrap();
    stream.write_all(&frame).await.unwrap();

    let mut buffer = MessageBuffer::new();
    let mut replies = Vec::new();
    let mut buf = vec![0u8; 4096];

    loop {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "server closed the connection");
        replies.extend(buffer.push(&buf[..n]).unwrap());
        if replies
            .last()
            .and_then(Message::status)
            .is_some_and(status::is_final)
        {
            return replies;
        }
    }
}

async fn call_once(running: &Running, request: &Message) -> Message {
    let mut stream = TcpStream::connect(running.addr).await.unwrap();
    let mut replies = call(&mut stream, request).await;
    assert_eq!(replies.len(), 1);
    replies.remove(0)
}

struct Listing;

impl TaggedHandler for Listing {
    fn call<'a>(&'a self, reply: &'a mut ReplyContext<'_, '_>) -> BoxFuture<'a, HandlerResult> {
        Box::pin(async move {
            let count: usize = reply
                .request()
                .field_str("COUNT")
                .and_then(|c| c.parse().ok())
                .unwrap_or(0);

            for i in 0..count {
                reply.set_status(status::PARTIAL_CONTENT, "partial");
                reply.set_body_encoded(&i)?;
                reply.transmit().await?;
                reply.clear_partial();
            }

            reply.add_str_header("COUNT", &count.to_string());
            reply.set_status(status::OK, "done");
            Ok(())
        })
    }
}

#[tokio::test]
async fn test_ping() {
    let running = start(Server::builder()).await;

    let reply = call_once(&running, &Message::new(REQ_PING).with_field("ID", "p1")).await;

    assert!(reply.is_reply());
    assert_eq!(reply.status(), Some(200));
    assert_eq!(reply.field_str("MSG"), Some("OK"));
    assert_eq!(reply.field_str("ID"), Some("p1"));
}

#[tokio::test]
async fn test_last_registered_handler_wins() {
    let builder = Server::builder()
        .handle("first", name_is("REQ_GET"), |_: &Message, reply: &mut ReplyContext<'_, '_>| {
            reply.set_status(200, "first");
            Ok(())
        })
        .unwrap()
        .handle("second", name_is("REQ_GET"), |_: &Message, reply: &mut ReplyContext<'_, '_>| {
            reply.set_status(200, "second");
            Ok(())
        })
        .unwrap();
    let running = start(builder).await;

    let reply = call_once(&running, &Message::new("REQ_GET")).await;
    assert_eq!(reply.field_str("MSG"), Some("second"));
}

#[tokio::test]
async fn test_builtin_requests_cannot_be_overridden() {
    let builder = Server::builder()
        .handle("my-ping", name_is(REQ_PING), |_: &Message, reply: &mut ReplyContext<'_, '_>| {
            reply.set_status(299, "mine");
            Ok(())
        })
        .unwrap();
    let running = start(builder).await;

    let reply = call_once(&running, &Message::new(REQ_PING)).await;
    assert_eq!(reply.status(), Some(200));
    assert_eq!(reply.field_str("MSG"), Some("OK"));
}

#[tokio::test]
async fn test_unknown_request_type() {
    let running = start(Server::builder()).await;

    let reply = call_once(&running, &Message::new("REQ_UNKNOWN")).await;

    assert_eq!(reply.status(), Some(400));
    assert_eq!(reply.field_str("MSG"), Some("Unexpected request type: REQ_UNKNOWN"));
}

#[tokio::test]
async fn test_handler_error_reply() {
    let builder = Server::builder()
        .handle("get", name_is("REQ_GET"), |req: &Message, reply: &mut ReplyContext<'_, '_>| {
            reply.add_str_header("TRACE", "t-1");
            match req.field_str("KEY") {
                Some(_) => {
                    reply.set_status(200, "OK");
                    Ok(())
                }
                None => Err(GriddError::reply(status::BAD_REQUEST, "Missing KEY")),
            }
        })
        .unwrap();
    let running = start(builder).await;

    let reply = call_once(&running, &Message::new("REQ_GET")).await;
    assert_eq!(reply.status(), Some(400));
    assert_eq!(reply.field_str("MSG"), Some("Missing KEY"));
    // extra headers survive the partial clear before the error reply
    assert_eq!(reply.field_str("TRACE"), Some("t-1"));

    let reply = call_once(&running, &Message::new("REQ_GET").with_field("KEY", "k")).await;
    assert_eq!(reply.status(), Some(200));
}

#[tokio::test]
async fn test_reply_without_message_is_nomsg() {
    let builder = Server::builder()
        .handle("touch", name_is("REQ_TOUCH"), |_: &Message, reply: &mut ReplyContext<'_, '_>| {
            reply.set_code(204);
            Ok(())
        })
        .unwrap();
    let running = start(builder).await;

    let reply = call_once(&running, &Message::new("REQ_TOUCH")).await;
    assert_eq!(reply.status(), Some(204));
    assert_eq!(reply.field_str("MSG"), Some("NOMSG"));
}

#[tokio::test]
async fn test_tagged_handler_streams_partial_replies() {
    let builder = Server::builder()
        .handle_tagged(
            "listing",
            name_is("REQ_LIST"),
            Listing,
            &[ServiceTag::str("tag.type", "listing")],
        )
        .unwrap();
    let running = start(builder).await;

    let mut stream = TcpStream::connect(running.addr).await.unwrap();
    let replies = call(&mut stream, &Message::new("REQ_LIST").with_field("COUNT", "3")).await;

    assert_eq!(replies.len(), 4);
    for (i, reply) in replies[..3].iter().enumerate() {
        assert_eq!(reply.status(), Some(206));
        let value: usize = MsgPackCodec::decode(reply.body().unwrap()).unwrap();
        assert_eq!(value, i);
    }
    assert_eq!(replies[3].status(), Some(200));
    assert_eq!(replies[3].field_str("COUNT"), Some("3"));
    assert!(replies[3].body().is_none());
}

#[tokio::test]
async fn test_connection_serves_many_requests() {
    let served = Arc::new(AtomicUsize::new(0));
    let counter = served.clone();
    let builder = Server::builder()
        .handle("count", name_is("REQ_COUNT"), move |_: &Message, reply: &mut ReplyContext<'_, '_>| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            reply.set_status(200, n.to_string());
            Ok(())
        })
        .unwrap();
    let running = start(builder).await;

    let mut stream = TcpStream::connect(running.addr).await.unwrap();
    for expected in 1..=5 {
        let replies = call(&mut stream, &Message::new("REQ_COUNT")).await;
        assert_eq!(replies[0].field_str("MSG"), Some(expected.to_string().as_str()));
    }
    assert_eq!(served.load(Ordering::SeqCst), 5);
}

#[tokio::test]
async fn test_namespace_info() {
    let store = Arc::new(NamespaceStore::new());
    let running = start(Server::builder().namespace(store.clone())).await;

    let reply = call_once(&running, &Message::new(REQ_NSINFO)).await;
    assert_eq!(reply.status(), Some(404));

    let mut info = NamespaceInfo::new("NS1");
    info.chunk_size = 1 << 20;
    store.set(info.clone());

    let reply = call_once(&running, &Message::new(REQ_NSINFO)).await;
    assert_eq!(reply.status(), Some(200));
    let decoded: NamespaceInfo = MsgPackCodec::decode(reply.body().unwrap()).unwrap();
    assert_eq!(decoded, info);
}

#[tokio::test]
async fn test_service_info() {
    let store = Arc::new(NamespaceStore::new());
    store.set(NamespaceInfo::new("NS1"));

    let builder = Server::builder()
        .namespace(store)
        .handle_tagged(
            "listing",
            name_is("REQ_LIST"),
            Listing,
            &[ServiceTag::int("stat.req", 0), ServiceTag::bool("tag.up", true)],
        )
        .unwrap();
    let running = start(builder).await;

    let reply = call_once(&running, &Message::new(REQ_SRVINFO)).await;
    assert_eq!(reply.status(), Some(200));

    let json: serde_json::Value = serde_json::from_slice(reply.body().unwrap()).unwrap();
    assert_eq!(json["ns_name"], "NS1");
    assert_eq!(json["addr"], running.addr.to_string());
    assert_eq!(json["tags"].as_array().unwrap().len(), 2);

    let names: Vec<_> = json["handlers"]
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["srvinfo", "nsinfo", "ping", "listing"]);
}
