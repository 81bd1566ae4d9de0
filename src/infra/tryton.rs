//! [`ObjectPool`] over Tryton's JSON-RPC endpoint.
//!
//! Every call is a `POST {url}/{database}/` with a `{"id", "method", "params"}`
//! envelope. When credentials are configured the client logs in lazily and
//! sends the session on every call, logging in again once if the server
//! answers 401.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use metrics::counter;
use reqwest::{Client, StatusCode, Url, header::AUTHORIZATION};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::application::pool::{ObjectPool, PoolError, Query, Record, RecordId};
use crate::config::{BackendCredentials, BackendSettings};
use crate::infra::error::InfraError;

pub const CALL_TOTAL: &str = "galatea_backend_call_total";
pub const CALL_ERROR_TOTAL: &str = "galatea_backend_call_error_total";

#[derive(Serialize)]
struct RpcRequest<'a> {
    id: u64,
    method: &'a str,
    params: &'a Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

enum CallFailure {
    Unauthorized,
    Pool(PoolError),
}

impl From<PoolError> for CallFailure {
    fn from(error: PoolError) -> Self {
        CallFailure::Pool(error)
    }
}

pub struct TrytonClient {
    client: Client,
    endpoint: Url,
    credentials: Option<BackendCredentials>,
    /// `Authorization` header value of the current session.
    session: Mutex<Option<String>>,
    next_id: AtomicU64,
}

impl TrytonClient {
    pub fn new(settings: &BackendSettings) -> Result<Self, InfraError> {
        let base = format!("{}/", settings.url.as_str().trim_end_matches('/'));
        let endpoint = Url::parse(&base)
            .and_then(|base| base.join(&format!("{}/", urlencoding::encode(&settings.database))))
            .map_err(|err| InfraError::configuration(format!("invalid backend url: {err}")))?;

        let client = Client::builder()
            .user_agent(concat!("galatea/", env!("CARGO_PKG_VERSION")))
            .timeout(settings.timeout)
            .build()
            .map_err(|err| InfraError::backend(format!("failed to build http client: {err}")))?;

        Ok(Self {
            client,
            endpoint,
            credentials: settings.credentials.clone(),
            session: Mutex::new(None),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Issue `method`, attaching (and if needed renewing) the session.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, PoolError> {
        counter!(CALL_TOTAL).increment(1);
        let started = Instant::now();

        let mut result = self.call_with_session(method, &params, false).await;
        if matches!(result, Err(CallFailure::Unauthorized)) && self.credentials.is_some() {
            info!(target = "galatea::tryton", method, "backend session expired; logging in again");
            result = self.call_with_session(method, &params, true).await;
        }

        let result = result.map_err(|failure| match failure {
            CallFailure::Unauthorized => PoolError::Remote {
                method: method.to_string(),
                message: "unauthorized".to_string(),
            },
            CallFailure::Pool(error) => error,
        });

        match &result {
            Ok(_) => debug!(
                target = "galatea::tryton",
                method,
                elapsed_ms = started.elapsed().as_millis(),
                "backend call completed"
            ),
            Err(err) => {
                counter!(CALL_ERROR_TOTAL).increment(1);
                warn!(
                    target = "galatea::tryton",
                    method,
                    elapsed_ms = started.elapsed().as_millis(),
                    error = %err,
                    "backend call failed"
                );
            }
        }
        result
    }

    async fn call_with_session(
        &self,
        method: &str,
        params: &Value,
        renew: bool,
    ) -> Result<Value, CallFailure> {
        let authorization = self.authorization(renew).await?;
        self.post(method, params, authorization.as_deref()).await
    }

    async fn authorization(&self, renew: bool) -> Result<Option<String>, PoolError> {
        let Some(credentials) = &self.credentials else {
            return Ok(None);
        };

        let mut session = self.session.lock().await;
        if renew {
            *session = None;
        }
        if session.is_none() {
            *session = Some(self.login(credentials).await?);
        }
        Ok(session.clone())
    }

    async fn login(&self, credentials: &BackendCredentials) -> Result<String, PoolError> {
        let params = json!([credentials.user, {"password": credentials.password}, Value::Null]);
        let result = self
            .post("common.db.login", &params, None)
            .await
            .map_err(|failure| match failure {
                CallFailure::Unauthorized => PoolError::Remote {
                    method: "common.db.login".to_string(),
                    message: "invalid credentials".to_string(),
                },
                CallFailure::Pool(error) => error,
            })?;

        let (user_id, session) = match result.as_array().map(Vec::as_slice) {
            Some([user_id, session]) => (
                user_id.as_i64(),
                session.as_str().map(str::to_string),
            ),
            _ => (None, None),
        };
        let (Some(user_id), Some(session)) = (user_id, session) else {
            return Err(PoolError::Decode(format!("unexpected login result: {result}")));
        };

        info!(target = "galatea::tryton", user = %credentials.user, user_id, "logged in to backend");
        Ok(session_header(&credentials.user, user_id, &session))
    }

    async fn post(
        &self,
        method: &str,
        params: &Value,
        authorization: Option<&str>,
    ) -> Result<Value, CallFailure> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut request = self
            .client
            .post(self.endpoint.clone())
            .json(&RpcRequest { id, method, params });
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }

        let response = request
            .send()
            .await
            .map_err(|err| PoolError::Transport(err.to_string()))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(CallFailure::Unauthorized);
        }
        if !status.is_success() {
            return Err(PoolError::Transport(format!("`{method}` answered with status {status}")).into());
        }

        let envelope: RpcResponse = response
            .json()
            .await
            .map_err(|err| PoolError::Decode(err.to_string()))?;
        if let Some(error) = envelope.error.filter(|error| !error.is_null()) {
            return Err(PoolError::Remote {
                method: method.to_string(),
                message: remote_message(&error),
            }
            .into());
        }
        Ok(envelope.result.unwrap_or(Value::Null))
    }
}

fn session_header(user: &str, user_id: i64, session: &str) -> String {
    format!("Session {}", STANDARD.encode(format!("{user}:{user_id}:{session}")))
}

fn remote_message(error: &Value) -> String {
    match error {
        Value::String(message) => message.clone(),
        Value::Array(parts) => parts
            .iter()
            .map(|part| match part {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(": "),
        other => other.to_string(),
    }
}

fn context(query: &Query) -> Value {
    match &query.language {
        Some(language) => json!({ "language": language }),
        None => json!({}),
    }
}

fn order(query: &Query) -> Value {
    if query.order.is_empty() {
        return Value::Null;
    }
    Value::Array(
        query
            .order
            .iter()
            .map(|(field, direction)| json!([field, direction.as_str()]))
            .collect(),
    )
}

fn search_params(query: &Query) -> Value {
    json!([query.domain, query.offset, query.limit, order(query), context(query)])
}

fn search_read_params(query: &Query, fields: &[&str]) -> Value {
    json!([
        query.domain,
        query.offset,
        query.limit,
        order(query),
        fields,
        context(query)
    ])
}

#[async_trait]
impl ObjectPool for TrytonClient {
    async fn search(&self, model: &str, query: &Query) -> Result<Vec<RecordId>, PoolError> {
        let result = self
            .call(&format!("model.{model}.search"), search_params(query))
            .await?;
        serde_json::from_value(result).map_err(|err| PoolError::Decode(err.to_string()))
    }

    async fn search_read(
        &self,
        model: &str,
        query: &Query,
        fields: &[&str],
    ) -> Result<Vec<Record>, PoolError> {
        let result = self
            .call(
                &format!("model.{model}.search_read"),
                search_read_params(query, fields),
            )
            .await?;
        match result {
            Value::Array(rows) => rows.into_iter().map(Record::from_value).collect(),
            other => Err(PoolError::Decode(format!("expected a list of records, got {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pool::{Condition, Direction};

    #[test]
    fn search_read_params_follow_positional_layout() {
        let query = Query::filter(Condition::eq("code", "main"))
            .limit(1)
            .order_by("sequence", Direction::Asc)
            .in_language("es_ES");

        assert_eq!(
            search_read_params(&query, &["name", "slug"]),
            json!([
                [["code", "=", "main"]],
                0,
                1,
                [["sequence", "ASC"]],
                ["name", "slug"],
                {"language": "es_ES"}
            ])
        );
    }

    #[test]
    fn search_params_default_to_unbounded_and_unordered() {
        assert_eq!(
            search_params(&Query::default()),
            json!([[], 0, null, null, {}])
        );
    }

    #[test]
    fn session_header_is_base64_of_login_triple() {
        assert_eq!(
            session_header("admin", 1, "abc"),
            format!("Session {}", STANDARD.encode("admin:1:abc"))
        );
    }

    #[test]
    fn remote_errors_flatten_to_text() {
        assert_eq!(
            remote_message(&json!(["UserError", ["Access denied"]])),
            "UserError: [\"Access denied\"]"
        );
        assert_eq!(remote_message(&json!("boom")), "boom");
    }
}
