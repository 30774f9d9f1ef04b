//! Store API client (blocking).

use std::thread;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub const MAX_RETRIES: u32 = 3;
const USER_AGENT: &str = concat!("porchlight/", env!("CARGO_PKG_VERSION"));

/// The four entity collections the store exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Properties,
    Occupants,
    Assignments,
    Volunteers,
}

impl Entity {
    pub fn path(&self) -> &'static str {
        match self {
            Self::Properties => "properties",
            Self::Occupants => "occupants",
            Self::Assignments => "assignments",
            Self::Volunteers => "volunteers",
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path())
    }
}

/// Error type for store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Network / timeout error after retries.
    Network(String),
    /// Token rejected (401 / 403).
    Auth(u16, String),
    /// Request rejected as malformed (400).
    Validation(String),
    /// Rate limited and retries exhausted (429).
    RateLimited(String),
    /// Record does not exist (404).
    NotFound,
    /// Other HTTP error.
    Http(u16, String),
    /// Response body was not the JSON we expected.
    Parse(String),
    /// Cursor pagination stopped making progress.
    Pagination(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Network(msg) => write!(f, "network error: {msg}"),
            StoreError::Auth(code, msg) => write!(f, "store auth failed ({code}): {msg}"),
            StoreError::Validation(msg) => write!(f, "store rejected request: {msg}"),
            StoreError::RateLimited(msg) => write!(f, "rate limited: {msg}"),
            StoreError::NotFound => write!(f, "record not found"),
            StoreError::Http(code, msg) => write!(f, "HTTP {code}: {msg}"),
            StoreError::Parse(msg) => write!(f, "parse error: {msg}"),
            StoreError::Pagination(msg) => write!(f, "pagination error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl StoreError {
    /// Errors worth one more per-record attempt during execution.
    /// Auth and validation failures never get better on retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Network(_) | StoreError::RateLimited(_))
            || matches!(self, StoreError::Http(code, _) if *code >= 500)
    }
}

/// Store API client (blocking).
#[derive(Clone)]
pub struct StoreClient {
    http: reqwest::blocking::Client,
    base_url: String,
    token: String,
}

impl StoreClient {
    pub fn new(base_url: &str, token: &str) -> Self {
        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn url(&self, entity: Entity, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}/api/{}/{}", self.base_url, entity.path(), id),
            None => format!("{}/api/{}", self.base_url, entity.path()),
        }
    }

    /// One page of a collection listing.
    pub fn list_page<T: DeserializeOwned>(
        &self,
        entity: Entity,
        limit: u32,
        next_token: Option<&str>,
    ) -> Result<crate::paginate::Page<T>, StoreError> {
        let url = self.url(entity, None);
        let body = self.request_with_retry(|http| {
            let mut req = http.get(&url).query(&[("limit", limit.to_string())]);
            if let Some(token) = next_token {
                req = req.query(&[("next_token", token)]);
            }
            req.bearer_auth(&self.token)
        })?;
        serde_json::from_value(body).map_err(|e| StoreError::Parse(e.to_string()))
    }

    /// Fetch one record. A missing id is `Ok(None)`, not an error.
    pub fn get<T: DeserializeOwned>(&self, entity: Entity, id: &str) -> Result<Option<T>, StoreError> {
        let url = self.url(entity, Some(id));
        match self.request_with_retry(|http| http.get(&url).bearer_auth(&self.token)) {
            Ok(body) => {
                serde_json::from_value(body).map(Some).map_err(|e| StoreError::Parse(e.to_string()))
            }
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn create<T: DeserializeOwned>(
        &self,
        entity: Entity,
        fields: &impl Serialize,
    ) -> Result<T, StoreError> {
        let url = self.url(entity, None);
        let body = self
            .request_with_retry(|http| http.post(&url).bearer_auth(&self.token).json(fields))?;
        serde_json::from_value(body).map_err(|e| StoreError::Parse(e.to_string()))
    }

    /// Partial update. Setting a field to a value it already has is a
    /// no-op server-side, so retrying a PATCH is safe.
    pub fn update(
        &self,
        entity: Entity,
        id: &str,
        patch: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let url = self.url(entity, Some(id));
        self.request_with_retry(|http| http.patch(&url).bearer_auth(&self.token).json(patch))?;
        Ok(())
    }

    /// Delete by id. A 404 means the record is already gone, which is the
    /// state we asked for, so it counts as success.
    pub fn delete(&self, entity: Entity, id: &str) -> Result<(), StoreError> {
        let url = self.url(entity, Some(id));
        match self.request_with_retry(|http| http.delete(&url).bearer_auth(&self.token)) {
            Ok(_) | Err(StoreError::NotFound) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Send a request with retry + exponential backoff.
    ///
    /// `build_request` is called once per attempt. Auth (401/403),
    /// validation (400), and not-found (404) fail immediately; 429 and
    /// 5xx retry with doubling backoff, honoring `Retry-After` on 429.
    fn request_with_retry(
        &self,
        build_request: impl Fn(&reqwest::blocking::Client) -> reqwest::blocking::RequestBuilder,
    ) -> Result<serde_json::Value, StoreError> {
        let mut backoff_secs = 1u64;

        for attempt in 0..=MAX_RETRIES {
            let req = build_request(&self.http);
            match req.send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();

                    if status == 401 || status == 403 {
                        return Err(StoreError::Auth(status, read_error_message(resp)));
                    }
                    if status == 400 {
                        return Err(StoreError::Validation(read_error_message(resp)));
                    }
                    if status == 404 {
                        return Err(StoreError::NotFound);
                    }
                    if (400..500).contains(&status) && status != 429 {
                        return Err(StoreError::Http(status, read_error_message(resp)));
                    }

                    if status == 429 || status >= 500 {
                        if attempt == MAX_RETRIES {
                            return if status == 429 {
                                Err(StoreError::RateLimited(format!(
                                    "still rate limited after {MAX_RETRIES} retries"
                                )))
                            } else {
                                Err(StoreError::Http(
                                    status,
                                    format!("upstream error after {MAX_RETRIES} retries"),
                                ))
                            };
                        }

                        // Respect Retry-After for 429.
                        let wait = if status == 429 {
                            resp.headers()
                                .get("retry-after")
                                .and_then(|v| v.to_str().ok())
                                .and_then(|v| v.parse::<u64>().ok())
                                .unwrap_or(backoff_secs)
                        } else {
                            backoff_secs
                        };

                        eprintln!(
                            "warning: retry {}/{} in {}s (HTTP {})",
                            attempt + 1,
                            MAX_RETRIES,
                            wait,
                            status,
                        );
                        thread::sleep(Duration::from_secs(wait));
                        backoff_secs *= 2;
                        continue;
                    }

                    let text = resp
                        .text()
                        .map_err(|e| StoreError::Network(format!("failed to read body: {e}")))?;
                    let text = text.trim_start_matches('\u{feff}');
                    if text.trim().is_empty() {
                        // DELETE and some PATCH responses have no body.
                        return Ok(serde_json::Value::Null);
                    }
                    return serde_json::from_str(text).map_err(|e| {
                        // Truncate for the error message; byte 200 may not
                        // be a char boundary, so fall back to the full body.
                        let excerpt = text.get(..200).unwrap_or(text);
                        StoreError::Parse(format!("{e} (body: {excerpt})"))
                    });
                }
                Err(e) => {
                    if attempt == MAX_RETRIES {
                        return Err(StoreError::Network(format!(
                            "failed after {MAX_RETRIES} retries: {e}"
                        )));
                    }
                    eprintln!(
                        "warning: retry {}/{} in {}s ({})",
                        attempt + 1,
                        MAX_RETRIES,
                        backoff_secs,
                        e,
                    );
                    thread::sleep(Duration::from_secs(backoff_secs));
                    backoff_secs *= 2;
                }
            }
        }

        unreachable!("retry loop always returns")
    }
}

fn read_error_message(resp: reqwest::blocking::Response) -> String {
    let body: serde_json::Value = resp.json().unwrap_or(serde_json::Value::Null);
    body.get("message")
        .or_else(|| body.get("error"))
        .and_then(|v| v.as_str())
        .unwrap_or("no error detail")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[derive(Debug, serde::Deserialize)]
    struct Stub {
        id: String,
    }

    #[test]
    fn get_returns_decoded_record() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/properties/h1");
            then.status(200).json_body(serde_json::json!({"id": "h1"}));
        });

        let client = StoreClient::new(&server.base_url(), "tok");
        let got: Option<Stub> = client.get(Entity::Properties, "h1").unwrap();
        assert_eq!(got.unwrap().id, "h1");
    }

    #[test]
    fn create_posts_fields_and_returns_record() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/occupants")
                .json_body(serde_json::json!({"firstName": "Luther", "lastName": "Williams"}));
            then.status(201).json_body(serde_json::json!({"id": "p-new"}));
        });

        let client = StoreClient::new(&server.base_url(), "tok");
        let created: Stub = client
            .create(
                Entity::Occupants,
                &serde_json::json!({"firstName": "Luther", "lastName": "Williams"}),
            )
            .unwrap();
        mock.assert();
        assert_eq!(created.id, "p-new");
    }

    #[test]
    fn get_missing_record_is_none() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/api/properties/h-gone");
            then.status(404);
        });

        let client = StoreClient::new(&server.base_url(), "tok");
        let got: Option<Stub> = client.get(Entity::Properties, "h-gone").unwrap();
        assert!(got.is_none());
    }

    #[test]
    fn delete_already_gone_is_success() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/api/occupants/p1");
            then.status(404);
        });

        let client = StoreClient::new(&server.base_url(), "tok");
        client.delete(Entity::Occupants, "p1").unwrap();
    }

    #[test]
    fn auth_failure_does_not_retry() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/properties/h1");
            then.status(401).json_body(serde_json::json!({"message": "bad token"}));
        });

        let client = StoreClient::new(&server.base_url(), "bad");
        let err = client.get::<Stub>(Entity::Properties, "h1").unwrap_err();
        assert!(matches!(err, StoreError::Auth(401, _)));
        mock.assert_hits(1);
    }

    #[test]
    fn validation_failure_does_not_retry() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PATCH).path("/api/properties/h1");
            then.status(400).json_body(serde_json::json!({"message": "absenteeOwner must be a boolean"}));
        });

        let client = StoreClient::new(&server.base_url(), "tok");
        let err = client
            .update(Entity::Properties, "h1", &serde_json::json!({"absenteeOwner": "yes"}))
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
        mock.assert_hits(1);
    }

    #[test]
    fn rate_limit_honors_retry_after() {
        let server = MockServer::start();
        let limited = server.mock(|when, then| {
            when.method(GET).path("/api/volunteers/v1");
            then.status(429)
                .header("retry-after", "0")
                .json_body(serde_json::json!({"message": "slow down"}));
        });

        let client = StoreClient::new(&server.base_url(), "tok");
        let err = client.get::<Stub>(Entity::Volunteers, "v1").unwrap_err();
        assert!(matches!(err, StoreError::RateLimited(_)));
        assert_eq!(limited.hits(), (MAX_RETRIES + 1) as usize);
    }

    #[test]
    fn empty_delete_body_is_ok() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(DELETE).path("/api/assignments/a1");
            then.status(204);
        });

        let client = StoreClient::new(&server.base_url(), "tok");
        client.delete(Entity::Assignments, "a1").unwrap();
    }

    #[test]
    fn non_json_body_with_multibyte_text_is_a_parse_error() {
        let server = MockServer::start();
        // 199 ASCII bytes, then a 2-byte char straddling the excerpt cut.
        let body = format!("{}\u{e9}clair is not JSON", "x".repeat(199));
        server.mock(|when, then| {
            when.method(GET).path("/api/properties/h1");
            then.status(200).body(body);
        });

        let client = StoreClient::new(&server.base_url(), "tok");
        let err = client.get::<Stub>(Entity::Properties, "h1").unwrap_err();
        assert!(matches!(err, StoreError::Parse(_)), "got {err:?}");
    }

    #[test]
    fn transient_classification() {
        assert!(StoreError::Network("timeout".into()).is_transient());
        assert!(StoreError::RateLimited("429".into()).is_transient());
        assert!(StoreError::Http(503, "unavailable".into()).is_transient());
        assert!(!StoreError::Auth(401, "bad token".into()).is_transient());
        assert!(!StoreError::Validation("bad field".into()).is_transient());
        assert!(!StoreError::NotFound.is_transient());
    }
}
