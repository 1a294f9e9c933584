//! JSON-RPC client for the Zabbix API.
//!
//! [`Client`] speaks JSON-RPC 2.0 over a [`Transport`]. The default
//! [`HttpTransport`] posts to `api_jsonrpc.php` with a blocking `ureq`
//! agent; [`MockTransport`] replays canned responses for tests.
//!
//! # Authentication
//!
//! Either an API token is configured up front, or `user.login` is called
//! with a user name and password and the returned session id is used as the
//! token. Both are sent as `Authorization: Bearer <token>`.

use crate::error::{Error, Result};
use crate::object::ObjectKind;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Methods that must be called without a bearer token.
const UNAUTHENTICATED_METHODS: &[&str] = &["user.login", "apiinfo.version"];

/// How the client authenticates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A pre-issued API token.
    Token(String),
    /// User name and password for `user.login`.
    Password { user: String, password: String },
}

/// Connection settings.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Frontend URL; `/api_jsonrpc.php` is appended unless already present.
    pub url: String,
    pub credentials: Credentials,
    pub timeout: Duration,
}

impl ClientConfig {
    /// Full JSON-RPC endpoint URL.
    pub fn endpoint(&self) -> String {
        let url = self.url.trim_end_matches('/');
        if url.ends_with(".php") {
            url.to_string()
        } else {
            format!("{url}/api_jsonrpc.php")
        }
    }
}

/// Delivers one JSON-RPC request and returns the raw response envelope.
pub trait Transport: Send + Sync {
    fn send(&self, request: &Value, token: Option<&str>) -> Result<Value>;
}

/// Blocking HTTP transport.
pub struct HttpTransport {
    agent: ureq::Agent,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            endpoint: endpoint.into(),
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &Value, token: Option<&str>) -> Result<Value> {
        let mut call = self
            .agent
            .post(&self.endpoint)
            .header("Content-Type", "application/json-rpc")
            .header("User-Agent", "zlink");
        if let Some(token) = token {
            call = call.header("Authorization", format!("Bearer {token}"));
        }
        let response: Value = call.send_json(request)?.body_mut().read_json()?;
        Ok(response)
    }
}

/// A request recorded by [`MockTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub params: Value,
    pub token: Option<String>,
}

#[derive(Debug, Default)]
struct MockInner {
    responses: HashMap<String, VecDeque<Value>>,
    requests: Vec<RecordedRequest>,
}

/// Mock transport for testing without network access.
///
/// Responses are queued per method and consumed in order. The last queued
/// response for a method is repeated once the queue would run dry.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockInner>>,
}

impl MockTransport {
    /// Create a new empty mock transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful result for a method.
    pub fn respond(&self, method: &str, result: Value) -> &Self {
        self.push(method, json!({"jsonrpc": "2.0", "result": result, "id": 0}))
    }

    /// Queue a JSON-RPC error for a method.
    pub fn fail(&self, method: &str, code: i64, message: &str, data: &str) -> &Self {
        self.push(
            method,
            json!({
                "jsonrpc": "2.0",
                "error": {"code": code, "message": message, "data": data},
                "id": 0
            }),
        )
    }

    fn push(&self, method: &str, envelope: Value) -> &Self {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .responses
            .entry(method.to_string())
            .or_default()
            .push_back(envelope);
        self
    }

    /// Every request sent so far, in order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .requests
            .clone()
    }

    /// Methods called so far, in order.
    pub fn methods(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.method).collect()
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &Value, token: Option<&str>) -> Result<Value> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let method = request["method"].as_str().unwrap_or_default().to_string();
        inner.requests.push(RecordedRequest {
            method: method.clone(),
            params: request["params"].clone(),
            token: token.map(str::to_string),
        });

        let queue = inner
            .responses
            .get_mut(&method)
            .ok_or_else(|| Error::http(format!("no mock response for {method}"), None))?;
        let mut envelope = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };
        envelope["id"] = request["id"].clone();
        Ok(envelope)
    }
}

/// Zabbix API client.
pub struct Client {
    transport: Box<dyn Transport>,
    token: Option<String>,
    next_id: AtomicU64,
}

impl Client {
    /// Connect over HTTP and authenticate.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let endpoint = config.endpoint();
        log::debug!("Connecting to {}", endpoint);
        let transport = HttpTransport::new(endpoint, config.timeout);
        let mut client = Self::with_transport(Box::new(transport));
        client.authenticate(&config.credentials)?;
        Ok(client)
    }

    /// Create an unauthenticated client over a custom transport (useful for testing).
    #[must_use]
    pub fn with_transport(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            token: None,
            next_id: AtomicU64::new(1),
        }
    }

    /// Establish the bearer token.
    pub fn authenticate(&mut self, credentials: &Credentials) -> Result<()> {
        match credentials {
            Credentials::Token(token) => {
                self.token = Some(token.clone());
            }
            Credentials::Password { user, password } => {
                let session: String = self
                    .call("user.login", json!({"username": user, "password": password}))
                    .map_err(|e| match e {
                        Error::Api { message, data, .. } => {
                            Error::Auth(format!("{message} {data}").trim().to_string())
                        }
                        other => other,
                    })?;
                log::debug!("Logged in as {}", user);
                self.token = Some(session);
            }
        }
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Call a method and decode its `result`.
    pub fn call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let token = if UNAUTHENTICATED_METHODS.contains(&method) {
            None
        } else {
            self.token.as_deref()
        };

        log::trace!("-> {} #{}", method, id);
        let mut response = self.transport.send(&request, token)?;

        if let Some(error) = response.get("error") {
            return Err(Error::Api {
                method: method.to_string(),
                code: error["code"].as_i64().unwrap_or_default(),
                message: error["message"].as_str().unwrap_or_default().to_string(),
                data: error["data"].as_str().unwrap_or_default().to_string(),
            });
        }

        let result = response
            .get_mut("result")
            .map(Value::take)
            .ok_or_else(|| Error::InvalidResponse(format!("{method}: missing result")))?;
        serde_json::from_value(result)
            .map_err(|e| Error::InvalidResponse(format!("{method}: {e}")))
    }

    /// Server API version; does not require authentication.
    pub fn api_version(&self) -> Result<String> {
        self.call("apiinfo.version", json!([]))
    }

    // =========================================================================
    // Generic object verbs
    // =========================================================================

    /// Ids of objects matching `params`; only the id field is requested.
    pub fn object_ids(&self, kind: ObjectKind, params: Value) -> Result<Vec<String>> {
        let mut params = params;
        if let Value::Object(map) = &mut params {
            map.insert("output".to_string(), json!([kind.id_field()]));
        }

        let rows: Vec<Value> = self.call(&kind.method("get"), params)?;
        rows.iter()
            .map(|row| {
                id_string(&row[kind.id_field()]).ok_or_else(|| {
                    Error::InvalidResponse(format!(
                        "{} row without {}",
                        kind.method("get"),
                        kind.id_field()
                    ))
                })
            })
            .collect()
    }

    /// Delete objects by id in one call; returns the ids the API reports.
    pub fn delete_objects(&self, kind: ObjectKind, ids: &[String]) -> Result<Vec<String>> {
        let result: Value = self.call(&kind.method("delete"), ids)?;
        Ok(ids_from_result(&result, kind.ids_key()))
    }
}

/// Read an id that may be encoded as a string or number
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Extract `{"<key>": [ids]}` from a create/update/delete result
pub(crate) fn ids_from_result(result: &Value, key: &str) -> Vec<String> {
    result[key]
        .as_array()
        .map(|ids| ids.iter().filter_map(id_string).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(mock: &MockTransport) -> Client {
        let mut client = Client::with_transport(Box::new(mock.clone()));
        client
            .authenticate(&Credentials::Token("secret".to_string()))
            .unwrap();
        client
    }

    #[test]
    fn test_endpoint() {
        let config = |url: &str| ClientConfig {
            url: url.to_string(),
            credentials: Credentials::Token(String::new()),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(
            config("https://zbx.example.com/").endpoint(),
            "https://zbx.example.com/api_jsonrpc.php"
        );
        assert_eq!(
            config("https://zbx.example.com/api_jsonrpc.php").endpoint(),
            "https://zbx.example.com/api_jsonrpc.php"
        );
    }

    #[test]
    fn test_password_login_sets_token() {
        let mock = MockTransport::new();
        mock.respond("user.login", json!("0424bd59b807674191e7d77572075f33"));
        mock.respond("item.get", json!([]));

        let mut client = Client::with_transport(Box::new(mock.clone()));
        client
            .authenticate(&Credentials::Password {
                user: "Admin".to_string(),
                password: "zabbix".to_string(),
            })
            .unwrap();
        client
            .object_ids(ObjectKind::Item, json!({"hostids": "10084"}))
            .unwrap();

        let requests = mock.requests();
        assert_eq!(requests[0].token, None);
        assert_eq!(requests[0].params["username"], "Admin");
        assert_eq!(
            requests[1].token.as_deref(),
            Some("0424bd59b807674191e7d77572075f33")
        );
    }

    #[test]
    fn test_rejected_login_is_auth_error() {
        let mock = MockTransport::new();
        mock.fail(
            "user.login",
            -32602,
            "Invalid params.",
            "Incorrect user name or password or account is temporarily blocked.",
        );

        let mut client = Client::with_transport(Box::new(mock));
        let err = client
            .authenticate(&Credentials::Password {
                user: "Admin".to_string(),
                password: "wrong".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
        assert!(!client.is_authenticated());
    }

    #[test]
    fn test_api_error_is_mapped() {
        let mock = MockTransport::new();
        mock.fail("trigger.delete", -32500, "Application error.", "still in use");

        let err = client(&mock)
            .delete_objects(ObjectKind::Trigger, &["13491".to_string()])
            .unwrap_err();
        match err {
            Error::Api {
                method, code, data, ..
            } => {
                assert_eq!(method, "trigger.delete");
                assert_eq!(code, -32500);
                assert_eq!(data, "still in use");
            }
            other => panic!("Expected Error::Api, got {other:?}"),
        }
    }

    #[test]
    fn test_object_ids_requests_only_id_field() {
        let mock = MockTransport::new();
        mock.respond(
            "discoveryrule.get",
            json!([{"itemid": "23300"}, {"itemid": 23301}]),
        );

        let ids = client(&mock)
            .object_ids(
                ObjectKind::DiscoveryRule,
                json!({"hostids": "10084", "inherited": true}),
            )
            .unwrap();

        assert_eq!(ids, vec!["23300", "23301"]);
        let params = &mock.requests()[0].params;
        assert_eq!(params["output"], json!(["itemid"]));
        assert_eq!(params["inherited"], json!(true));
    }

    #[test]
    fn test_delete_objects_returns_deleted_ids() {
        let mock = MockTransport::new();
        mock.respond("item.delete", json!({"itemids": ["1", "2"]}));

        let deleted = client(&mock)
            .delete_objects(ObjectKind::Item, &["1".to_string(), "2".to_string()])
            .unwrap();

        assert_eq!(deleted, vec!["1", "2"]);
        assert_eq!(mock.requests()[0].params, json!(["1", "2"]));
        assert_eq!(mock.requests()[0].token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_version_is_called_without_token() {
        let mock = MockTransport::new();
        mock.respond("apiinfo.version", json!("7.0.0"));

        let client = client(&mock);
        assert_eq!(client.api_version().unwrap(), "7.0.0");
        assert_eq!(client.api_version().unwrap(), "7.0.0");
        assert_eq!(mock.requests()[1].token, None);
    }

    #[test]
    fn test_missing_result_is_invalid_response() {
        let mock = MockTransport::new();
        mock.respond("item.get", Value::Null);
        let err = client(&mock)
            .call::<_, Vec<Value>>("item.get", json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn test_unmocked_method_fails() {
        let mock = MockTransport::new();
        assert!(client(&mock).api_version().is_err());
    }
}
