// Assertions for test responses

use crate::TestResponse;
use girder_core::HttpStatus;

pub fn assert_status(response: &TestResponse, expected: u16) {
    let actual = response.status();
    assert_eq!(
        actual,
        expected,
        "Expected status {}, got {}. Body: {}",
        expected,
        actual,
        response.body_string()
    );
}

pub fn assert_http_status(response: &TestResponse, expected: HttpStatus) {
    assert_status(response, expected.code());
}

/// Assert the JSON body equals `expected`
pub fn assert_json<T>(response: &TestResponse, expected: &T)
where
    T: serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
{
    let actual: T = response
        .body_json()
        .unwrap_or_else(|e| panic!("Response body is not the expected JSON: {}", e));
    assert_eq!(actual, *expected, "JSON bodies do not match");
}

pub fn assert_header(response: &TestResponse, key: &str, expected: &str) {
    let actual = response.header(key);
    assert_eq!(
        actual,
        Some(expected),
        "Expected header '{}' to be '{}', got {:?}",
        key,
        expected,
        actual
    );
}

pub fn assert_body_contains(response: &TestResponse, expected: &str) {
    let body = response.body_string();
    assert!(
        body.contains(expected),
        "Expected body to contain '{}'. Body: {}",
        expected,
        body
    );
}

/// Assert a JSON error body of the given kind
pub fn assert_error_kind(response: &TestResponse, expected: &str) {
    let kind = response.error_kind();
    assert_eq!(
        kind.as_deref(),
        Some(expected),
        "Expected error kind '{}'. Body: {}",
        expected,
        response.body_string()
    );
}

pub fn assert_success(response: &TestResponse) {
    let status = response.status();
    assert!(
        (200..300).contains(&status),
        "Expected successful status (2xx), got {}",
        status
    );
}

pub fn assert_client_error(response: &TestResponse) {
    let status = response.status();
    assert!(
        (400..500).contains(&status),
        "Expected client error status (4xx), got {}",
        status
    );
}

pub fn assert_server_error(response: &TestResponse) {
    let status = response.status();
    assert!(
        (500..600).contains(&status),
        "Expected server error status (5xx), got {}",
        status
    );
}

pub fn assert_json_content_type(response: &TestResponse) {
    let content_type = response.header("Content-Type");
    assert!(
        content_type.is_some_and(|ct| ct.contains("application/json")),
        "Expected JSON content type, got {:?}",
        content_type
    );
}

pub fn assert_html_content_type(response: &TestResponse) {
    let content_type = response.header("Content-Type");
    assert!(
        content_type.is_some_and(|ct| ct.contains("text/html")),
        "Expected HTML content type, got {:?}",
        content_type
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use girder_core::HttpResponse;
    use serde_json::json;

    fn response(status: u16, body: &str) -> TestResponse {
        TestResponse::new(HttpResponse::new(status).with_body(body.as_bytes().to_vec()))
    }

    #[test]
    fn test_status_ranges() {
        assert_status(&response(200, "OK"), 200);
        assert_http_status(&response(201, ""), HttpStatus::Created);
        assert_success(&response(204, ""));
        assert_client_error(&response(404, "Not Found"));
        assert_server_error(&response(500, "Internal Error"));
    }

    #[test]
    fn test_body_assertions() {
        assert_body_contains(&response(200, "Hello World"), "World");

        let json_response = TestResponse::new(HttpResponse::ok().with_json(&json!({"hello": "world"})).unwrap());
        assert_json(&json_response, &json!({"hello": "world"}));
        assert_json_content_type(&json_response);
    }

    #[test]
    fn test_header_assertions() {
        let mut inner = HttpResponse::ok();
        inner.write_html("<p>x</p>".to_string());
        inner.set_header("X-Custom", "value");
        let test_response = TestResponse::new(inner);

        assert_header(&test_response, "x-custom", "value");
        assert_html_content_type(&test_response);
    }

    #[test]
    fn test_error_kind_assertion() {
        let inner = HttpResponse::new(403)
            .with_json(&json!({"error": {"kind": "PolicyDenied", "message": "denied"}}))
            .unwrap();
        assert_error_kind(&TestResponse::new(inner), "PolicyDenied");
    }

    #[test]
    #[should_panic(expected = "Expected status 200")]
    fn test_status_mismatch_panics() {
        assert_status(&response(500, "boom"), 200);
    }
}
