//! Capability interface onto the remote business-object server.
//!
//! Everything the front-end reads from the backend goes through
//! [`ObjectPool`]: a search returning ids, and a search returning selected
//! fields. Records come back as JSON objects wrapped in [`Record`] for typed
//! access.

use async_trait::async_trait;
use serde::{Serialize, Serializer, ser::SerializeTuple};
use serde_json::{Map, Value};
use thiserror::Error;

pub type RecordId = i64;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("backend transport failed: {0}")]
    Transport(String),
    #[error("backend rejected `{method}`: {message}")]
    Remote { method: String, message: String },
    #[error("unexpected backend payload: {0}")]
    Decode(String),
}

/// One `(field, operator, value)` clause.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: &'static str,
    pub value: Value,
}

impl Condition {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: "=",
            value: value.into(),
        }
    }

    pub fn within(field: impl Into<String>, values: &[RecordId]) -> Self {
        Self {
            field: field.into(),
            operator: "in",
            value: Value::from(values.to_vec()),
        }
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(3)?;
        tuple.serialize_element(&self.field)?;
        tuple.serialize_element(self.operator)?;
        tuple.serialize_element(&self.value)?;
        tuple.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Search parameters shared by `search` and `search_read`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub domain: Vec<Condition>,
    pub offset: usize,
    pub limit: Option<usize>,
    pub order: Vec<(String, Direction)>,
    /// Locale tag sent in the call context, e.g. `es_ES`.
    pub language: Option<String>,
}

impl Query {
    pub fn filter(condition: Condition) -> Self {
        Self {
            domain: vec![condition],
            ..Default::default()
        }
    }

    pub fn and(mut self, condition: Condition) -> Self {
        self.domain.push(condition);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn in_language(mut self, tag: impl Into<String>) -> Self {
        self.language = Some(tag.into());
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order.push((field.into(), direction));
        self
    }
}

/// A backend record: a JSON object with typed accessors.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record(Map<String, Value>);

impl Record {
    pub fn from_value(value: Value) -> Result<Self, PoolError> {
        match value {
            Value::Object(fields) => Ok(Self(fields)),
            other => Err(PoolError::Decode(format!("expected object, got {other}"))),
        }
    }

    pub fn id(&self) -> Option<RecordId> {
        self.i64("id")
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Non-empty string value. Backends send `false`/`null` for unset strings.
    pub fn str(&self, field: &str) -> Option<&str> {
        self.0
            .get(field)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    /// Numbers are rendered too, since widths and heights arrive as integers.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.0.get(field)? {
            Value::String(value) if !value.is_empty() => Some(value.clone()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }

    pub fn bool(&self, field: &str) -> bool {
        self.0.get(field).and_then(Value::as_bool).unwrap_or(false)
    }

    /// Integer field; many2one fields may arrive as `[id, "name"]`.
    pub fn i64(&self, field: &str) -> Option<i64> {
        match self.0.get(field)? {
            Value::Number(number) => number.as_i64(),
            Value::Array(pair) => pair.first().and_then(Value::as_i64),
            _ => None,
        }
    }

    /// One2many / many2many ids.
    pub fn ids(&self, field: &str) -> Vec<RecordId> {
        self.0
            .get(field)
            .and_then(Value::as_array)
            .map(|values| values.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default()
    }
}

#[async_trait]
pub trait ObjectPool: Send + Sync {
    async fn search(&self, model: &str, query: &Query) -> Result<Vec<RecordId>, PoolError>;

    async fn search_read(
        &self,
        model: &str,
        query: &Query,
        fields: &[&str],
    ) -> Result<Vec<Record>, PoolError>;
}
