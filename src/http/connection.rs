use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;

use crate::app::App;
use crate::http::parser::{ParseError, parse_http_request};
use crate::http::request::{Method, Request};
use crate::http::response::{Response, StatusCode};
use crate::http::writer::{ResponseWriter, serialize_response};

/// Largest request head plus body buffered before giving up.
const MAX_REQUEST_BYTES: usize = 1024 * 1024;

pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    app: Arc<App>,
    buffer: Vec<u8>,
    state: ConnectionState,
}

pub enum ConnectionState {
    Reading,
    Processing(Request),
    Writing(ResponseWriter, bool), // bool = keep_alive?
    Closed,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr, app: Arc<App>) -> Self {
        Self {
            stream,
            peer,
            app,
            buffer: Vec::with_capacity(4096),
            state: ConnectionState::Reading,
        }
    }

    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match std::mem::replace(&mut self.state, ConnectionState::Closed) {
                ConnectionState::Reading => {
                    self.state = match self.read_request().await? {
                        Some(req) => ConnectionState::Processing(req),
                        None => ConnectionState::Closed,
                    };
                }

                ConnectionState::Processing(req) => {
                    let (writer, keep_alive) = handle_request(&self.app, self.peer, req).await;
                    self.state = ConnectionState::Writing(writer, keep_alive);
                }

                ConnectionState::Writing(writer, keep_alive) => {
                    writer.write_to_stream(&mut self.stream).await?;

                    if keep_alive {
                        self.state = ConnectionState::Reading; // go back for next request
                    }
                }

                ConnectionState::Closed => {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Next request on the wire, or `None` once the client is gone or sent
    /// something unparseable (answered with 400 first).
    pub async fn read_request(&mut self) -> anyhow::Result<Option<Request>> {
        loop {
            // Try parsing whatever we already have
            match parse_http_request(&self.buffer) {
                Ok((request, consumed)) => {
                    // Remove consumed bytes
                    self.buffer.drain(..consumed);
                    return Ok(Some(request));
                }

                Err(ParseError::Incomplete) if self.buffer.len() <= MAX_REQUEST_BYTES => {
                    // Need more data → fall through to read
                }

                Err(e) => {
                    tracing::debug!(peer = %self.peer, error = ?e, "Malformed request");
                    self.reject().await?;
                    return Ok(None);
                }
            }

            // Read more data
            let mut temp = [0u8; 4096];
            let n = self.stream.read(&mut temp).await?;

            if n == 0 {
                // Client closed connection
                return Ok(None);
            }

            self.buffer.extend_from_slice(&temp[..n]);
        }
    }

    async fn reject(&mut self) -> anyhow::Result<()> {
        use tokio::io::AsyncWriteExt;

        let mut response = Response::text("400 Bad Request", StatusCode::BadRequest);
        response.set_header("Connection", "close");
        self.stream
            .write_all(&serialize_response(&response, false))
            .await?;
        self.stream.flush().await?;
        Ok(())
    }
}

/// Runs `req` through the app and decides whether the connection stays open.
///
/// Must not borrow the `Connection` across the await: its state may hold a
/// stream body, which is `Send` but not `Sync`.
async fn handle_request(app: &App, peer: SocketAddr, req: Request) -> (ResponseWriter, bool) {
    let req = req.with_client_addr(peer.ip());
    let head_only = *req.method() == Method::HEAD;
    let wants_keep_alive = req.keep_alive();

    let mut response = match app.serve(req).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(peer = %peer, error = %e, "Request failed");
            Response::internal_error()
        }
    };

    let keep_alive = wants_keep_alive && !response.closes_connection();
    if !keep_alive {
        response.set_header("Connection", "close");
    }

    (ResponseWriter::new(response, head_only), keep_alive)
}
