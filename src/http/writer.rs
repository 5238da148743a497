use std::collections::HashMap;
use std::io;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::http::response::{Body, EventSink, Response, StatusCode};

const HTTP_VERSION: &str = "HTTP/1.1";

/// Chunks buffered between a running event callback and the socket.
const STREAM_CHANNEL_CAPACITY: usize = 16;

fn serialize_head(status: StatusCode, headers: &HashMap<String, String>) -> Vec<u8> {
    let mut buf = Vec::new();

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        status.as_u16(),
        status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in headers {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    buf
}

/// Serializes a response with an in-memory body.
///
/// File and stream bodies contribute headers only; [`ResponseWriter`] emits
/// their payload. With `head_only` the body is left out while Content-Length
/// still describes it.
pub fn serialize_response(resp: &Response, head_only: bool) -> Vec<u8> {
    let mut buf = serialize_head(resp.status, &resp.headers);

    if let (Body::Bytes(body), false) = (&resp.body, head_only) {
        buf.extend_from_slice(body);
    }

    buf
}

/// Blocking `Write` half feeding an async socket writer.
struct ChannelWriter {
    tx: mpsc::Sender<Bytes>,
}

impl io::Write for ChannelWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.tx
            .blocking_send(Bytes::copy_from_slice(buf))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Emits one response to the client.
pub struct ResponseWriter {
    response: Response,
    head_only: bool,
}

impl ResponseWriter {
    pub fn new(response: Response, head_only: bool) -> Self {
        Self { response, head_only }
    }

    pub async fn write_to_stream<W>(self, stream: &mut W) -> anyhow::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let Response { status, mut headers, body } = self.response;

        match body {
            Body::Bytes(bytes) => {
                if !headers.keys().any(|k| k.eq_ignore_ascii_case("Content-Length")) {
                    headers.insert("Content-Length".to_string(), bytes.len().to_string());
                }
                stream.write_all(&serialize_head(status, &headers)).await?;
                if !self.head_only {
                    stream.write_all(&bytes).await?;
                }
            }

            Body::File(path) => {
                let mut file = match tokio::fs::File::open(&path).await {
                    Ok(file) => file,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "File response target unavailable");
                        let missing = Response::not_found();
                        stream
                            .write_all(&serialize_response(&missing, self.head_only))
                            .await?;
                        stream.flush().await?;
                        return Ok(());
                    }
                };

                let len = file.metadata().await?.len();
                headers.retain(|k, _| !k.eq_ignore_ascii_case("Content-Length"));
                headers.insert("Content-Length".to_string(), len.to_string());
                stream.write_all(&serialize_head(status, &headers)).await?;
                if !self.head_only {
                    tokio::io::copy(&mut file, stream).await?;
                }
            }

            Body::Stream(events) => {
                headers.retain(|k, _| !k.eq_ignore_ascii_case("Content-Length"));
                stream.write_all(&serialize_head(status, &headers)).await?;
                stream.flush().await?;
                if self.head_only {
                    return Ok(());
                }

                let (tx, mut rx) = mpsc::channel::<Bytes>(STREAM_CHANNEL_CAPACITY);
                let producer = tokio::task::spawn_blocking(move || {
                    let mut out = ChannelWriter { tx };
                    events.run(&mut EventSink::new(&mut out))
                });

                while let Some(chunk) = rx.recv().await {
                    stream.write_all(&chunk).await?;
                    stream.flush().await?;
                }

                match producer.await {
                    Ok(Ok(())) => tracing::trace!("Event stream finished"),
                    Ok(Err(e)) => tracing::debug!(error = %e, "Event stream ended early"),
                    Err(e) => tracing::warn!(error = %e, "Event stream callback panicked"),
                }
            }
        }

        stream.flush().await?;
        Ok(())
    }
}
