use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use url::form_urlencoded;
use uuid::Uuid;

use crate::errors::GatewayError;

/// A replayable description of one API call.
///
/// The body is kept as immutable bytes so the call can be re-issued after a
/// renewal. `retried` flips once, on the first replay, and is never reset.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    id: Uuid,
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Option<Bytes>,
    retried: bool,
    uses_session: bool,
}

impl ApiRequest {
    /// `path` is relative to the gateway's base url and may carry a query string.
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            method,
            path: path.into(),
            headers: HeaderMap::new(),
            body: None,
            retried: false,
            uses_session: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Adds a header. An `Authorization` header set here is replaced whenever
    /// the session has a token to attach.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Send without the session: no token is attached and a 401 is returned
    /// as is instead of triggering a renewal. Used for sign-in and sign-up.
    pub fn without_session(mut self) -> Self {
        self.uses_session = false;
        self
    }

    /// Appends a query parameter to the path.
    pub fn query(mut self, key: &str, value: &str) -> Self {
        let pair = form_urlencoded::Serializer::new(String::new())
            .append_pair(key, value)
            .finish();
        let separator = if self.path.contains('?') { '&' } else { '?' };
        self.path.push(separator);
        self.path.push_str(&pair);
        self
    }

    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, GatewayError> {
        let encoded = serde_json::to_vec(body).map_err(|e| GatewayError::Encode(e.to_string()))?;
        Ok(self.body(HeaderValue::from_static("application/json"), encoded))
    }

    pub fn body(mut self, content_type: HeaderValue, body: impl Into<Bytes>) -> Self {
        self.headers.insert(CONTENT_TYPE, content_type);
        self.body = Some(body.into());
        self
    }

    /// A `multipart/form-data` body carrying a single file field.
    pub fn multipart_file(
        self,
        field: &str,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<Self, GatewayError> {
        let boundary = format!("flashgate-{}", Uuid::new_v4().simple());
        let header = HeaderValue::from_str(&format!("multipart/form-data; boundary={}", boundary))
            .map_err(|e| GatewayError::Encode(e.to_string()))?;

        let mut body = Vec::with_capacity(data.len() + 256);
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                quote_param(field),
                quote_param(filename)
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());

        Ok(self.body(header, body))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body_bytes(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn uses_session(&self) -> bool {
        self.uses_session
    }

    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }
}

/// Escapes a value for a quoted `Content-Disposition` parameter.
fn quote_param(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\r' | '\n' => {}
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            _ => quoted.push(c),
        }
    }
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_appends_with_proper_separator() {
        let request = ApiRequest::get("/api/decks")
            .query("show_all", "1")
            .query("q", "a b&c");
        assert_eq!(request.path(), "/api/decks?show_all=1&q=a+b%26c");
    }

    #[test]
    fn test_json_body_sets_content_type() {
        let request = ApiRequest::post("/auth/login")
            .json(&serde_json::json!({ "username": "ann" }))
            .unwrap();
        assert_eq!(request.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(
            request.body_bytes().map(|b| &b[..]),
            Some(br#"{"username":"ann"}"#.as_slice())
        );
        assert!(!request.is_retried());
        assert!(request.uses_session());
        assert!(!request.without_session().uses_session());
    }

    #[test]
    fn test_clone_keeps_identity_and_body() {
        let mut request = ApiRequest::put("/api/decks/1")
            .json(&serde_json::json!({ "name": "Verbs" }))
            .unwrap();
        request.mark_retried();
        let replay = request.clone();
        assert_eq!(replay.id(), request.id());
        assert_eq!(replay.body_bytes(), request.body_bytes());
        assert!(replay.is_retried());
    }

    #[test]
    fn test_multipart_file_layout() {
        let request = ApiRequest::post("/api/decks/1/import")
            .multipart_file("file", "my\"deck.xlsx", "application/octet-stream", b"DATA")
            .unwrap();
        let content_type = request.headers()[CONTENT_TYPE].to_str().unwrap().to_string();
        let boundary = content_type
            .strip_prefix("multipart/form-data; boundary=")
            .expect("boundary parameter");
        let body = String::from_utf8(request.body_bytes().unwrap().to_vec()).unwrap();

        assert!(body.starts_with(&format!("--{}\r\n", boundary)));
        assert!(body.contains(r#"name="file"; filename="my\"deck.xlsx""#));
        assert!(body.contains("\r\n\r\nDATA\r\n"));
        assert!(body.ends_with(&format!("--{}--\r\n", boundary)));
    }
}
