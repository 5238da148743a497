use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::http::mime;

/// HTTP status codes the kernel produces.
///
/// Common HTTP status codes used in responses:
/// - `Ok` (200): Request successful
/// - `Found` (302): Redirect after a form post
/// - `Unauthorized` (401): Guard rejected an anonymous caller
/// - `Forbidden` (403): Guard or CSRF check rejected the caller
/// - `NotFound` (404): No route matched
/// - `InternalServerError` (500): Guard or action failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 204 No Content
    NoContent,
    /// 301 Moved Permanently
    MovedPermanently,
    /// 302 Found
    Found,
    /// 303 See Other
    SeeOther,
    /// 400 Bad Request
    BadRequest,
    /// 401 Unauthorized
    Unauthorized,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 422 Unprocessable Entity
    UnprocessableEntity,
    /// 429 Too Many Requests
    TooManyRequests,
    /// 500 Internal Server Error
    InternalServerError,
    /// 503 Service Unavailable
    ServiceUnavailable,
}

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use keel::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::NoContent => 204,
            StatusCode::MovedPermanently => 301,
            StatusCode::Found => 302,
            StatusCode::SeeOther => 303,
            StatusCode::BadRequest => 400,
            StatusCode::Unauthorized => 401,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::UnprocessableEntity => 422,
            StatusCode::TooManyRequests => 429,
            StatusCode::InternalServerError => 500,
            StatusCode::ServiceUnavailable => 503,
        }
    }

    /// Inverse of [`StatusCode::as_u16`] for the codes listed above.
    pub fn from_u16(code: u16) -> Option<Self> {
        Some(match code {
            200 => StatusCode::Ok,
            201 => StatusCode::Created,
            204 => StatusCode::NoContent,
            301 => StatusCode::MovedPermanently,
            302 => StatusCode::Found,
            303 => StatusCode::SeeOther,
            400 => StatusCode::BadRequest,
            401 => StatusCode::Unauthorized,
            403 => StatusCode::Forbidden,
            404 => StatusCode::NotFound,
            405 => StatusCode::MethodNotAllowed,
            422 => StatusCode::UnprocessableEntity,
            429 => StatusCode::TooManyRequests,
            500 => StatusCode::InternalServerError,
            503 => StatusCode::ServiceUnavailable,
            _ => return None,
        })
    }

    /// Returns the standard HTTP reason phrase for this status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use keel::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    /// assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::Created => "Created",
            StatusCode::NoContent => "No Content",
            StatusCode::MovedPermanently => "Moved Permanently",
            StatusCode::Found => "Found",
            StatusCode::SeeOther => "See Other",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Unauthorized => "Unauthorized",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
            StatusCode::UnprocessableEntity => "Unprocessable Entity",
            StatusCode::TooManyRequests => "Too Many Requests",
            StatusCode::InternalServerError => "Internal Server Error",
            StatusCode::ServiceUnavailable => "Service Unavailable",
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(
            self,
            StatusCode::MovedPermanently | StatusCode::Found | StatusCode::SeeOther
        )
    }
}

/// Writer handed to a server-sent-events callback.
///
/// Wraps whatever the adapter streams into; every write goes straight out.
pub struct EventSink<'a> {
    out: &'a mut (dyn Write + Send),
}

impl<'a> EventSink<'a> {
    pub fn new(out: &'a mut (dyn Write + Send)) -> Self {
        Self { out }
    }

    /// Sends a named event. Multi-line data becomes several `data:` lines.
    pub fn event(&mut self, name: &str, data: &str) -> io::Result<()> {
        let mut frame = format!("event: {name}\n");
        push_data_lines(&mut frame, data);
        self.send_frame(frame)
    }

    /// Sends an unnamed `message` event.
    pub fn data(&mut self, data: &str) -> io::Result<()> {
        let mut frame = String::new();
        push_data_lines(&mut frame, data);
        self.send_frame(frame)
    }

    /// Sends a comment line, typically as a keep-alive ping.
    pub fn comment(&mut self, text: &str) -> io::Result<()> {
        self.send_frame(format!(": {text}\n\n"))
    }

    fn send_frame(&mut self, frame: String) -> io::Result<()> {
        self.out.write_all(frame.as_bytes())?;
        self.out.flush()
    }
}

fn push_data_lines(frame: &mut String, data: &str) {
    for line in data.split('\n') {
        frame.push_str("data: ");
        frame.push_str(line);
        frame.push('\n');
    }
    frame.push('\n');
}

impl Write for EventSink<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.out.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

type StreamFn = dyn for<'a> FnOnce(&mut EventSink<'a>) -> io::Result<()> + Send;

/// Callback producing a server-sent-events body.
pub struct EventStream(Box<StreamFn>);

impl EventStream {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&mut EventSink<'_>) -> io::Result<()> + Send + 'static,
    {
        Self(Box::new(f))
    }

    /// Runs the callback to completion against `sink`.
    pub fn run(self, sink: &mut EventSink<'_>) -> io::Result<()> {
        (self.0)(sink)
    }
}

/// What the adapter emits after the headers. Exactly one kind per response.
pub enum Body {
    /// In-memory payload
    Bytes(Vec<u8>),
    /// File streamed from disk by the adapter
    File(PathBuf),
    /// Server-sent events produced by a callback
    Stream(EventStream),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Body::File(path) => f.debug_tuple("File").field(path).finish(),
            Body::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Represents a complete HTTP response ready to be sent to a client.
///
/// Contains the HTTP status code, headers, and response body. Handlers and
/// middleware may still mutate it; once returned to the adapter it is final.
#[derive(Debug)]
pub struct Response {
    /// The HTTP status code
    pub status: StatusCode,
    /// HTTP headers as key-value pairs
    pub headers: HashMap<String, String>,
    /// Response body
    pub body: Body,
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```
/// # use keel::http::response::{ResponseBuilder, StatusCode};
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .header("Content-Type", "application/json")
///     .body(b"{}".to_vec())
///     .build();
/// assert_eq!(response.header("Content-Length"), Some("2"));
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    headers: HashMap<String, String>,
    body: Body,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Body::Bytes(Vec::new()),
        }
    }

    /// Adds or replaces a header.
    ///
    /// # Arguments
    ///
    /// * `key` - Header name (case-insensitive in HTTP)
    /// * `value` - Header value
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        insert_header(&mut self.headers, key.into(), value.into());
        self
    }

    /// Sets an in-memory response body.
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Body::Bytes(body);
        self
    }

    /// Serves a file from disk instead of an in-memory body.
    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.body = Body::File(path.into());
        self
    }

    /// Streams server-sent events produced by `stream`.
    pub fn stream(mut self, stream: EventStream) -> Self {
        self.body = Body::Stream(stream);
        self
    }

    /// Builds the final Response.
    ///
    /// In-memory bodies get a Content-Length header unless one is already present.
    pub fn build(mut self) -> Response {
        if let Body::Bytes(bytes) = &self.body {
            if find_header(&self.headers, "Content-Length").is_none() {
                self.headers
                    .insert("Content-Length".to_string(), bytes.len().to_string());
            }
        }

        Response {
            status: self.status,
            headers: self.headers,
            body: self.body,
        }
    }
}

fn find_header<'a>(headers: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    headers
        .get(key)
        .or_else(|| {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v)
        })
        .map(String::as_str)
}

fn insert_header(headers: &mut HashMap<String, String>, key: String, value: String) {
    headers.retain(|k, _| !k.eq_ignore_ascii_case(&key));
    headers.insert(key, value);
}

impl Response {
    /// Creates a simple 200 OK response with the given body.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        ResponseBuilder::new(StatusCode::Ok)
            .body(body.into())
            .build()
    }

    /// Plain text with an explicit status.
    pub fn text(body: impl Into<String>, status: StatusCode) -> Self {
        ResponseBuilder::new(status)
            .header("Content-Type", "text/plain; charset=UTF-8")
            .body(body.into().into_bytes())
            .build()
    }

    /// 200 OK with an HTML body.
    pub fn html(body: impl Into<String>) -> Self {
        ResponseBuilder::new(StatusCode::Ok)
            .header("Content-Type", "text/html; charset=UTF-8")
            .body(body.into().into_bytes())
            .build()
    }

    /// Serializes `value` as a JSON body.
    pub fn json<T: Serialize + ?Sized>(value: &T, status: StatusCode) -> Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(ResponseBuilder::new(status)
            .header("Content-Type", "application/json")
            .body(body)
            .build())
    }

    /// 302 redirect to `target`.
    ///
    /// `current_host` is the `Host` of the request being answered. Absolute
    /// targets must point at that host; scheme-relative targets are always
    /// rejected. The `Location` header carries `target` verbatim.
    ///
    /// ```
    /// # use keel::http::response::Response;
    /// assert!(Response::redirect("/login", Some("myapp.com")).is_ok());
    /// assert!(Response::redirect("https://myapp.com/x", Some("myapp.com")).is_ok());
    /// assert!(Response::redirect("https://evil.com/x", Some("myapp.com")).is_err());
    /// assert!(Response::redirect("//evil.com/x", Some("myapp.com")).is_err());
    /// ```
    pub fn redirect(target: &str, current_host: Option<&str>) -> Result<Self> {
        Self::redirect_with(target, current_host, StatusCode::Found)
    }

    /// 301 variant of [`Response::redirect`].
    pub fn redirect_permanent(target: &str, current_host: Option<&str>) -> Result<Self> {
        Self::redirect_with(target, current_host, StatusCode::MovedPermanently)
    }

    fn redirect_with(target: &str, current_host: Option<&str>, status: StatusCode) -> Result<Self> {
        check_redirect_target(target, current_host)?;
        Ok(ResponseBuilder::new(status)
            .header("Location", target)
            .build())
    }

    /// Serves the file at `path`; the content type follows the extension.
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        ResponseBuilder::new(StatusCode::Ok)
            .header("Content-Type", mime::from_path(&path))
            .file(path)
            .build()
    }

    /// Server-sent-events response driven by `callback`.
    pub fn sse<F>(callback: F) -> Self
    where
        F: FnOnce(&mut EventSink<'_>) -> io::Result<()> + Send + 'static,
    {
        ResponseBuilder::new(StatusCode::Ok)
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .header("X-Accel-Buffering", "no")
            .stream(EventStream::new(callback))
            .build()
    }

    /// Creates a 404 Not Found response.
    pub fn not_found() -> Self {
        Self::error(StatusCode::NotFound)
    }

    /// Creates a 401 Unauthorized response.
    pub fn unauthorized() -> Self {
        Self::error(StatusCode::Unauthorized)
    }

    /// Creates a 403 Forbidden response.
    pub fn forbidden() -> Self {
        Self::error(StatusCode::Forbidden)
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_error() -> Self {
        Self::error(StatusCode::InternalServerError)
    }

    /// Plain-text error page such as `404 Not Found`.
    pub fn error(status: StatusCode) -> Self {
        Self::text(
            format!("{} {}", status.as_u16(), status.reason_phrase()),
            status,
        )
    }

    /// Header lookup ignoring ASCII case.
    pub fn header(&self, key: &str) -> Option<&str> {
        find_header(&self.headers, key)
    }

    /// Sets a header, replacing any existing header with the same name.
    pub fn set_header(&mut self, key: impl Into<String>, value: impl Into<String>) {
        insert_header(&mut self.headers, key.into(), value.into());
    }

    /// Replaces the body with in-memory bytes and refreshes Content-Length.
    pub fn set_body(&mut self, body: impl Into<Vec<u8>>) {
        let body = body.into();
        self.set_header("Content-Length", body.len().to_string());
        self.body = Body::Bytes(body);
    }

    /// In-memory body, if that is what this response carries.
    pub fn body_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            Body::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// In-memory body as text, lossy on invalid UTF-8. Empty for file and stream bodies.
    pub fn body_text(&self) -> String {
        self.body_bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default()
    }

    /// Whether the adapter should close the connection after emitting this.
    pub fn closes_connection(&self) -> bool {
        self.status.is_redirect() || !matches!(self.body, Body::Bytes(_))
    }
}

/// Rejects scheme-relative targets and absolute URLs pointing at another host.
pub fn check_redirect_target(target: &str, current_host: Option<&str>) -> Result<()> {
    let invalid = || Error::InvalidRedirectTarget(target.to_string());
    let trimmed = target.trim();

    let scheme_relative = ["//", "\\\\", "/\\", "\\/"]
        .iter()
        .any(|prefix| trimmed.starts_with(prefix));
    if scheme_relative || trimmed.chars().any(char::is_control) {
        return Err(invalid());
    }

    match url::Url::parse(trimmed) {
        Ok(url) => {
            let same_host = match (url.host_str(), current_host) {
                (Some(host), Some(current)) => host.eq_ignore_ascii_case(strip_port(current)),
                _ => false,
            };
            if same_host { Ok(()) } else { Err(invalid()) }
        }
        Err(url::ParseError::RelativeUrlWithoutBase) => Ok(()),
        Err(_) => Err(invalid()),
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_port_handles_ipv6_and_plain_hosts() {
        assert_eq!(strip_port("myapp.com:8080"), "myapp.com");
        assert_eq!(strip_port("myapp.com"), "myapp.com");
        assert_eq!(strip_port("[::1]:8080"), "[::1]");
    }

    #[test]
    fn redirect_rejects_backslash_tricks_and_pseudo_schemes() {
        assert!(check_redirect_target("/\\evil.com", Some("myapp.com")).is_err());
        assert!(check_redirect_target("javascript:alert(1)", Some("myapp.com")).is_err());
        assert!(check_redirect_target("https://myapp.com/x", None).is_err());
        assert!(check_redirect_target("dashboard?tab=2", None).is_ok());
    }

    #[test]
    fn set_header_overwrites_case_insensitively() {
        let mut resp = Response::ok("x");
        resp.set_header("x-marker", "a");
        resp.set_header("X-Marker", "b");
        assert_eq!(resp.header("X-MARKER"), Some("b"));
        assert_eq!(
            resp.headers.keys().filter(|k| k.eq_ignore_ascii_case("x-marker")).count(),
            1
        );
    }

    #[test]
    fn sse_callback_writes_frames() {
        let resp = Response::sse(|sink| {
            sink.event("ping", "ok")?;
            sink.data("line1\nline2")
        });
        let Body::Stream(stream) = resp.body else {
            panic!("expected stream body");
        };

        let mut out: Vec<u8> = Vec::new();
        stream.run(&mut EventSink::new(&mut out)).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(
            text,
            "event: ping\ndata: ok\n\ndata: line1\ndata: line2\n\n"
        );
    }
}
