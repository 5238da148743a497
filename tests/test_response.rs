use keel::http::response::{Body, Response, ResponseBuilder, StatusCode};
use keel::Error;

#[test]
fn test_status_code_as_u16() {
    assert_eq!(StatusCode::Ok.as_u16(), 200);
    assert_eq!(StatusCode::Created.as_u16(), 201);
    assert_eq!(StatusCode::NoContent.as_u16(), 204);
    assert_eq!(StatusCode::BadRequest.as_u16(), 400);
    assert_eq!(StatusCode::NotFound.as_u16(), 404);
    assert_eq!(StatusCode::MethodNotAllowed.as_u16(), 405);
    assert_eq!(StatusCode::InternalServerError.as_u16(), 500);
}

#[test]
fn test_status_code_reason_phrase() {
    assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    assert_eq!(StatusCode::Created.reason_phrase(), "Created");
    assert_eq!(StatusCode::NoContent.reason_phrase(), "No Content");
    assert_eq!(StatusCode::BadRequest.reason_phrase(), "Bad Request");
    assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    assert_eq!(
        StatusCode::MethodNotAllowed.reason_phrase(),
        "Method Not Allowed"
    );
    assert_eq!(
        StatusCode::InternalServerError.reason_phrase(),
        "Internal Server Error"
    );
}

#[test]
fn test_response_builder_basic() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .body(b"Hello, World!".to_vec())
        .build();

    assert_eq!(response.status, StatusCode::Ok);
    assert_eq!(response.body_bytes(), Some(&b"Hello, World!"[..]));
}

#[test]
fn test_response_builder_with_headers() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Type", "text/plain")
        .header("X-Custom", "value")
        .body(b"test".to_vec())
        .build();

    assert_eq!(response.headers.get("Content-Type").unwrap(), "text/plain");
    assert_eq!(response.headers.get("X-Custom").unwrap(), "value");
}

#[test]
fn test_response_builder_auto_content_length() {
    let body = b"This is the body".to_vec();
    let response = ResponseBuilder::new(StatusCode::Ok)
        .body(body.clone())
        .build();

    let content_length = response.headers.get("Content-Length").unwrap();
    assert_eq!(content_length, &body.len().to_string());
}

#[test]
fn test_response_builder_preserves_custom_content_length() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Length", "999")
        .body(b"test".to_vec())
        .build();

    // Should keep the custom value
    assert_eq!(response.headers.get("Content-Length").unwrap(), "999");
}

#[test]
fn test_response_builder_multiple_headers() {
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("Content-Type", "application/json")
        .header("Cache-Control", "no-cache")
        .header("X-Frame-Options", "DENY")
        .body(b"{}".to_vec())
        .build();

    assert_eq!(response.headers.len(), 4); // 3 custom + 1 auto (Content-Length)
    assert_eq!(
        response.headers.get("Content-Type").unwrap(),
        "application/json"
    );
    assert_eq!(response.headers.get("Cache-Control").unwrap(), "no-cache");
    assert_eq!(response.headers.get("X-Frame-Options").unwrap(), "DENY");
}

#[test]
fn test_response_builder_empty_body() {
    let response = ResponseBuilder::new(StatusCode::NoContent).build();

    assert_eq!(response.body_bytes(), Some(&b""[..]));
    assert_eq!(response.headers.get("Content-Length").unwrap(), "0");
}

#[test]
fn test_response_builder_various_status_codes() {
    let statuses = vec![
        StatusCode::Ok,
        StatusCode::Created,
        StatusCode::BadRequest,
        StatusCode::NotFound,
    ];

    for status in statuses {
        let response = ResponseBuilder::new(status).body(b"test".to_vec()).build();
        assert_eq!(response.status, status);
    }
}

#[test]
fn test_response_builder_fluent_api() {
    // Test that builder methods return self for chaining
    let response = ResponseBuilder::new(StatusCode::Ok)
        .header("Header1", "value1")
        .header("Header2", "value2")
        .header("Header3", "value3")
        .body(b"body".to_vec())
        .build();

    assert_eq!(response.headers.len(), 4); // 3 custom + 1 auto
}

#[test]
fn test_response_ok_helper() {
    let response = Response::ok(b"test content".to_vec());

    assert_eq!(response.status, StatusCode::Ok);
    assert_eq!(response.body_text(), "test content");
}

#[test]
fn test_response_not_found_helper() {
    let response = Response::not_found();

    assert_eq!(response.status, StatusCode::NotFound);
    assert_eq!(response.body_text(), "404 Not Found");
}

#[test]
fn test_response_internal_error_helper() {
    let response = Response::internal_error();

    assert_eq!(response.status, StatusCode::InternalServerError);
    assert_eq!(response.body_text(), "500 Internal Server Error");
}

#[test]
fn test_redirect_to_foreign_host_is_rejected() {
    let result = Response::redirect("https://evil.com/x", Some("myapp.com"));
    assert!(matches!(result, Err(Error::InvalidRedirectTarget(t)) if t == "https://evil.com/x"));
}

#[test]
fn test_redirect_scheme_relative_is_rejected() {
    assert!(Response::redirect("//evil.com/x", Some("myapp.com")).is_err());
    assert!(Response::redirect("//myapp.com/x", Some("myapp.com")).is_err());
}

#[test]
fn test_redirect_relative_and_same_host() {
    let response = Response::redirect("/login", Some("myapp.com")).unwrap();
    assert_eq!(response.status, StatusCode::Found);
    assert_eq!(response.header("Location"), Some("/login"));

    let response = Response::redirect("https://myapp.com/x", Some("myapp.com:8443")).unwrap();
    assert_eq!(response.header("Location"), Some("https://myapp.com/x"));

    let response = Response::redirect_permanent("/new-home", None).unwrap();
    assert_eq!(response.status, StatusCode::MovedPermanently);
    assert_eq!(response.header("Location"), Some("/new-home"));
}

#[test]
fn test_response_json_helper() {
    #[derive(serde::Serialize)]
    struct Item {
        id: u32,
        name: &'static str,
    }

    let response = Response::json(&Item { id: 7, name: "lamp" }, StatusCode::Created).unwrap();

    assert_eq!(response.status, StatusCode::Created);
    assert_eq!(response.header("content-type"), Some("application/json"));
    assert_eq!(response.body_text(), r#"{"id":7,"name":"lamp"}"#);
}

#[test]
fn test_response_html_and_text_helpers() {
    let html = Response::html("<p>hi</p>");
    assert_eq!(html.header("Content-Type"), Some("text/html; charset=UTF-8"));

    let text = Response::text("slow down", StatusCode::TooManyRequests);
    assert_eq!(text.status.as_u16(), 429);
    assert_eq!(text.header("Content-Length"), Some("9"));
}

#[test]
fn test_response_file_helper() {
    let response = Response::file("static/report.pdf");

    assert_eq!(response.header("Content-Type"), Some("application/pdf"));
    assert!(matches!(response.body, Body::File(ref p) if p.ends_with("report.pdf")));
    assert!(response.closes_connection());
}

#[test]
fn test_response_sse_headers() {
    let response = Response::sse(|sink| sink.comment("ping"));

    assert_eq!(response.header("Content-Type"), Some("text/event-stream"));
    assert_eq!(response.header("Cache-Control"), Some("no-cache"));
    assert_eq!(response.header("Content-Length"), None);
    assert!(response.body_bytes().is_none());
    assert!(response.closes_connection());
}

#[test]
fn test_response_set_body_refreshes_length() {
    let mut response = Response::ok("short");
    response.set_body("a longer body");

    assert_eq!(response.header("Content-Length"), Some("13"));
    assert_eq!(response.body_text(), "a longer body");
    assert!(!response.closes_connection());
}

#[test]
fn test_status_code_round_trip_and_redirects() {
    for code in [200, 302, 401, 403, 404, 500] {
        assert_eq!(StatusCode::from_u16(code).unwrap().as_u16(), code);
    }
    assert_eq!(StatusCode::from_u16(999), None);
    assert!(StatusCode::Found.is_redirect());
    assert!(!StatusCode::Ok.is_redirect());
}
