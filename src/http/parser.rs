use crate::http::request::{Method, Request, RequestBuilder};

#[derive(Debug)]
pub enum ParseError {
    InvalidRequest,
    InvalidMethod,
    InvalidHeader,
    InvalidContentLength,
    Incomplete,
}

/// Parses one HTTP/1.x request from the front of `buf`.
///
/// Returns the request together with the number of bytes it occupied. The
/// query string is split off the path and `application/x-www-form-urlencoded`
/// bodies are decoded into form fields.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {

    // Look for header/body separator
    let headers_end = find_headers_end(buf).ok_or(ParseError::Incomplete)?;
    let header_bytes = &buf[..headers_end];
    let body_bytes = &buf[headers_end + 4..];

    let headers_str = std::str::from_utf8(header_bytes)
        .map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest);
    let mut parts = request_line?.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let target = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;
    if !target.starts_with('/') {
        return Err(ParseError::InvalidRequest);
    }

    let mut builder = RequestBuilder::new()
        .method(method)
        .path(target)
        .version(version);

    // Headers
    let mut content_length = None;
    let mut form_encoded = false;

    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line
            .split_once(':')
            .ok_or(ParseError::InvalidHeader)?;
        let (key, value) = (key.trim(), value.trim());

        if key.eq_ignore_ascii_case("Content-Length") {
            content_length = Some(
                value
                    .parse::<usize>()
                    .map_err(|_| ParseError::InvalidContentLength)?,
            );
        }
        if key.eq_ignore_ascii_case("Content-Type") {
            form_encoded = value
                .to_ascii_lowercase()
                .starts_with("application/x-www-form-urlencoded");
        }

        builder = builder.header(key, value);
    }

    // Body
    let content_length = content_length.unwrap_or(0);

    if body_bytes.len() < content_length {
        return Err(ParseError::Incomplete);
    }

    let body = body_bytes[..content_length].to_vec();
    if form_encoded {
        builder = builder.form_urlencoded(&body);
    }

    let request = builder
        .body(body)
        .build()
        .map_err(|_| ParseError::InvalidRequest)?;

    let total_consumed = headers_end + 4 + content_length;
    Ok((request, total_consumed))

}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
}
