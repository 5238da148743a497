use keel::http::request::{Method, Request};
use std::net::{IpAddr, Ipv4Addr};

fn get(path: &str) -> keel::http::request::RequestBuilder {
    Request::builder().method(Method::GET).path(path)
}

#[test]
fn test_request_header_retrieval() {
    let req = get("/")
        .header("Host", "example.com")
        .header("Content-Type", "application/json")
        .build()
        .unwrap();

    assert_eq!(req.header("Host"), Some("example.com"));
    assert_eq!(req.header("content-type"), Some("application/json"));
    assert_eq!(req.header("Missing"), None);
}

#[test]
fn test_request_content_length_parsing() {
    let req = Request::builder()
        .method(Method::POST)
        .path("/api")
        .header("Content-Length", "42")
        .build()
        .unwrap();

    assert_eq!(req.content_length(), 42);
}

#[test]
fn test_request_content_length_missing_or_invalid() {
    let req = get("/").build().unwrap();
    assert_eq!(req.content_length(), 0);

    let req = get("/").header("Content-Length", "not-a-number").build().unwrap();
    assert_eq!(req.content_length(), 0);
}

#[test]
fn test_request_keep_alive_http11_default() {
    let req = get("/").build().unwrap();
    assert!(req.keep_alive());
}

#[test]
fn test_request_keep_alive_http10_default() {
    let req = get("/").version("HTTP/1.0").build().unwrap();
    assert!(!req.keep_alive());
}

#[test]
fn test_request_keep_alive_close() {
    let req = get("/").header("Connection", "close").build().unwrap();
    assert!(!req.keep_alive());
}

#[test]
fn test_request_keep_alive_case_insensitive() {
    let req = get("/").header("Connection", "Keep-Alive").build().unwrap();
    assert!(req.keep_alive());
}

#[test]
fn test_request_method_from_string() {
    assert_eq!(Method::from_str("GET"), Some(Method::GET));
    assert_eq!(Method::from_str("POST"), Some(Method::POST));
    assert_eq!(Method::from_str("INVALID"), None);
    assert_eq!(Method::from_str("get"), None); // Case-sensitive
}

#[test]
fn test_request_state_changing_methods() {
    assert!(!Method::GET.is_state_changing());
    assert!(!Method::HEAD.is_state_changing());
    assert!(Method::POST.is_state_changing());
    assert!(Method::DELETE.is_state_changing());
}

#[test]
fn test_request_query_last_value_wins() {
    let req = get("/search?q=rust&page=2&q=tokio").build().unwrap();

    assert_eq!(req.path(), "/search");
    assert_eq!(req.query("q"), Some("tokio"));
    assert_eq!(req.query("page"), Some("2"));
    assert_eq!(req.query_or("sort", "new"), "new");
}

#[test]
fn test_request_form_fields() {
    let req = Request::builder()
        .method(Method::POST)
        .path("/login")
        .form_urlencoded(b"username=ad+min&note=a%26b")
        .build()
        .unwrap();

    assert_eq!(req.form("username"), Some("ad min"));
    assert_eq!(req.form("note"), Some("a&b"));
    assert_eq!(req.form_or("missing", ""), "");
}

#[test]
fn test_request_cookie_lookup() {
    let req = get("/")
        .header("Cookie", "theme=dark; keel_session=abc123 ; lang=en")
        .build()
        .unwrap();

    assert_eq!(req.cookie("keel_session"), Some("abc123"));
    assert_eq!(req.cookie("lang"), Some("en"));
    assert_eq!(req.cookie("missing"), None);
}

#[test]
fn test_request_client_details() {
    let addr = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7));
    let req = get("/")
        .header("Host", "myapp.com:8080")
        .header("User-Agent", "curl/8")
        .header("X-Requested-With", "XMLHttpRequest")
        .client_addr(addr)
        .build()
        .unwrap();

    assert_eq!(req.host(), Some("myapp.com:8080"));
    assert_eq!(req.user_agent(), Some("curl/8"));
    assert_eq!(req.client_addr(), Some(addr));
    assert!(req.is_ajax());
}

#[test]
fn test_request_builder_rejects_bad_paths() {
    assert!(get("relative").build().is_err());
    assert!(Request::builder().path("/").build().is_err());
}

#[test]
fn test_request_with_body() {
    let body_content = b"test body content".to_vec();
    let req = Request::builder()
        .method(Method::POST)
        .path("/api")
        .body(body_content.clone())
        .build()
        .unwrap();

    assert_eq!(req.body(), body_content.as_slice());
    assert!(req.params().is_empty());
}
