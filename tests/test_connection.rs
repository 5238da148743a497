use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use keel::config::Config;
use keel::controller::Handler;
use keel::http::response::Response;
use keel::server::listener;
use keel::App;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(Duration::from_secs(5), fut)
        .await
        .expect("timed out waiting for the server")
}

async fn start() -> SocketAddr {
    let mut app = App::new(Config::default());
    app.get("/hello", Handler::from_fn("hello", |_| Ok(Response::ok("hello"))))
        .unwrap()
        .get("/go", Handler::from_fn("go", |ctx| ctx.redirect("/hello")))
        .unwrap()
        .get(
            "/events",
            Handler::from_fn("events", |_| {
                Ok(Response::sse(|sink| {
                    sink.event("tick", "1")?;
                    sink.event("tick", "2")
                }))
            }),
        )
        .unwrap();

    let socket = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(listener::serve(socket, Arc::new(app)));
    addr
}

async fn read_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = within(stream.read(&mut byte)).await.unwrap();
        assert!(n > 0, "connection closed before the response head");
        head.push(byte[0]);
    }
    String::from_utf8(head).unwrap()
}

fn content_length(head: &str) -> usize {
    head.lines()
        .find_map(|line| line.strip_prefix("Content-Length: "))
        .map(|v| v.trim().parse().unwrap())
        .unwrap_or(0)
}

async fn read_body(stream: &mut TcpStream, head: &str) -> String {
    let mut body = vec![0u8; content_length(head)];
    within(stream.read_exact(&mut body)).await.unwrap();
    String::from_utf8(body).unwrap()
}

async fn read_rest(stream: &mut TcpStream) -> String {
    let mut rest = Vec::new();
    within(stream.read_to_end(&mut rest)).await.unwrap();
    String::from_utf8(rest).unwrap()
}

#[tokio::test]
async fn test_keep_alive_serves_several_requests() {
    let addr = start().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    for _ in 0..2 {
        stream
            .write_all(b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let head = read_head(&mut stream).await;

        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(!head.contains("Connection: close"));
        assert_eq!(read_body(&mut stream, &head).await, "hello");
    }
}

#[tokio::test]
async fn test_pipelined_requests_are_answered_in_order() {
    let addr = start().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(
            b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\nGET /missing HTTP/1.1\r\nHost: localhost\r\n\r\n",
        )
        .await
        .unwrap();

    let first = read_head(&mut stream).await;
    assert!(first.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(read_body(&mut stream, &first).await, "hello");

    let second = read_head(&mut stream).await;
    assert!(second.starts_with("HTTP/1.1 404 Not Found\r\n"));
}

#[tokio::test]
async fn test_head_sends_length_without_body() {
    let addr = start().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"HEAD /hello HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let head = read_head(&mut stream).await;
    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(content_length(&head), 5);

    // The next response starts right after the head: no body bytes in between.
    stream
        .write_all(b"GET /hello HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let next = read_head(&mut stream).await;
    assert!(next.starts_with("HTTP/1.1 200 OK\r\n"));
    assert_eq!(read_body(&mut stream, &next).await, "hello");
}

#[tokio::test]
async fn test_redirect_closes_connection() {
    let addr = start().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET /go HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let head = read_head(&mut stream).await;

    assert!(head.starts_with("HTTP/1.1 302 Found\r\n"));
    assert!(head.contains("Location: /hello\r\n"));
    assert!(head.contains("Connection: close\r\n"));
    assert_eq!(read_rest(&mut stream).await, "");
}

#[tokio::test]
async fn test_client_connection_close_is_honoured() {
    let addr = start().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET /hello HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let head = read_head(&mut stream).await;

    assert!(head.contains("Connection: close\r\n"));
    assert_eq!(read_rest(&mut stream).await, "hello");
}

#[tokio::test]
async fn test_event_stream_is_written_then_closed() {
    let addr = start().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream
        .write_all(b"GET /events HTTP/1.1\r\nHost: localhost\r\n\r\n")
        .await
        .unwrap();
    let head = read_head(&mut stream).await;

    assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(head.contains("Content-Type: text/event-stream\r\n"));
    assert!(head.contains("Connection: close\r\n"));
    assert_eq!(
        read_rest(&mut stream).await,
        "event: tick\ndata: 1\n\nevent: tick\ndata: 2\n\n"
    );
}

#[tokio::test]
async fn test_malformed_request_gets_400_and_close() {
    let addr = start().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();

    stream.write_all(b"BOGUS\r\n\r\n").await.unwrap();
    let head = read_head(&mut stream).await;

    assert!(head.starts_with("HTTP/1.1 400 Bad Request\r\n"));
    assert!(head.contains("Connection: close\r\n"));
    assert_eq!(read_rest(&mut stream).await, "400 Bad Request");
}
