//! Result sinks and typed client results
//!
//! Demultiplexing is two-phase. Every sink in a batch first *stages* its
//! response (parsing and validating it without touching any state) and only
//! when every sink has staged successfully are the returned commits run. A
//! malformed body anywhere in the batch therefore leaves every sink as it
//! was.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use restq_domain::constants::VALUE_ENVELOPE_KEY;
use restq_domain::{RestqError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use super::context::{ClientContext, HookStatus, QueryOutcome};
use super::ports::TransportRequest;
use super::retry::RetryOptions;
use crate::model::ClientValue;

/// Deferred state change produced by [`ResultSink::stage`]
pub type Commit = Box<dyn FnOnce() + Send>;

/// Destination of a query's decoded response
pub trait ResultSink: Send + Sync {
    /// Validate `payload` and return the change that applies it.
    ///
    /// # Errors
    /// Returns `RestqError::Deserialization` if the payload does not fit.
    fn stage(&self, payload: Value) -> Result<Commit>;

    /// Id of the [`ClientResult`] behind this sink, if any.
    fn result_id(&self) -> Option<Uuid> {
        None
    }
}

/// Trait for values a [`ClientResult`] can hold
pub trait ResultValue: Clone + Send + Sync + 'static {
    /// The value after applying a response payload.
    ///
    /// # Errors
    /// Returns `RestqError::Deserialization` if the payload does not fit.
    fn merged(&self, payload: Value) -> Result<Self>;

    /// Set one field. Values without fields are replaced wholesale.
    ///
    /// # Errors
    /// Returns `RestqError::Deserialization` if `value` does not fit.
    fn apply_property(&mut self, _name: &str, value: Value) -> Result<()> {
        *self = self.merged(value)?;
        Ok(())
    }
}

/// Strip the `{"value": x}` envelope scalar responses arrive in.
fn unwrap_envelope(payload: Value) -> Value {
    match payload {
        Value::Object(mut fields)
            if fields.len() == 1 && fields.contains_key(VALUE_ENVELOPE_KEY) =>
        {
            fields.remove(VALUE_ENVELOPE_KEY).unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn decode_scalar<T: DeserializeOwned>(payload: Value) -> Result<T> {
    serde_json::from_value(unwrap_envelope(payload))
        .map_err(|e| RestqError::Deserialization(e.to_string()))
}

macro_rules! scalar_result_value {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl ResultValue for $ty {
                fn merged(&self, payload: Value) -> Result<Self> {
                    decode_scalar(payload)
                }
            }
        )+
    };
}

scalar_result_value!(String, bool, i32, i64, u32, u64, f64, DateTime<Utc>);

impl ResultValue for Value {
    fn merged(&self, payload: Value) -> Result<Self> {
        Ok(payload)
    }
}

impl ResultValue for () {
    fn merged(&self, _payload: Value) -> Result<Self> {
        Ok(())
    }
}

impl<T> ResultValue for Vec<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn merged(&self, payload: Value) -> Result<Self> {
        decode_scalar(payload)
    }
}

impl<T> ResultValue for Option<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    fn merged(&self, payload: Value) -> Result<Self> {
        decode_scalar(payload)
    }
}

impl ResultValue for ClientValue {
    fn merged(&self, payload: Value) -> Result<Self> {
        let mut next = self.clone();
        next.merge_json(&payload)?;
        Ok(next)
    }

    fn apply_property(&mut self, name: &str, value: Value) -> Result<()> {
        self.set(name, value);
        Ok(())
    }
}

struct ResultCell<T> {
    id: Uuid,
    value: RwLock<T>,
}

/// Typed handle to the eventual result of a query.
///
/// Holds its default until the query completes. Clones share the value.
pub struct ClientResult<T> {
    cell: Arc<ResultCell<T>>,
    context: Arc<ClientContext>,
}

impl<T: ResultValue> ClientResult<T> {
    /// A result that starts out holding `default`.
    pub fn new(context: Arc<ClientContext>, default: T) -> Self {
        let cell = ResultCell { id: Uuid::new_v4(), value: RwLock::new(default) };
        Self { cell: Arc::new(cell), context }
    }

    pub fn id(&self) -> Uuid {
        self.cell.id
    }

    pub fn context(&self) -> &Arc<ClientContext> {
        &self.context
    }

    /// Snapshot of the current value.
    pub fn value(&self) -> T {
        self.cell.value.read().clone()
    }

    pub fn with_value<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.cell.value.read())
    }

    /// Set a field of a structured value, or replace a plain one.
    ///
    /// # Errors
    /// Returns `RestqError::Deserialization` if `value` does not fit `T`.
    pub fn set_property(&self, name: &str, value: impl Into<Value>) -> Result<&Self> {
        self.cell.value.write().apply_property(name, value.into())?;
        Ok(self)
    }

    /// Sink that writes a response into this result.
    pub fn sink(&self) -> Arc<dyn ResultSink> {
        Arc::new(ResultSlot { cell: self.cell.clone() })
    }

    /// Register a hook that sees every outgoing request of the next batches.
    pub fn before_execute(
        &self,
        hook: impl FnMut(&ClientContext, &mut TransportRequest) + Send + 'static,
    ) -> &Self {
        self.context.before_query_execute(hook);
        self
    }

    /// Run `action` once, right after the query feeding this result has
    /// completed.
    pub fn after_execute(&self, action: impl FnOnce(&ClientResult<T>) + Send + 'static) -> &Self {
        let id = self.id();
        let handle = self.clone();
        let mut action = Some(action);
        self.context.after_query_execute(move |_context, outcome: &QueryOutcome<'_>| {
            if outcome.result_id() != Some(id) {
                return HookStatus::Keep;
            }
            if let Some(action) = action.take() {
                action(&handle);
            }
            HookStatus::Done
        });
        self
    }

    /// Flush the pending queue.
    ///
    /// # Errors
    /// Propagates the batch failure.
    pub async fn execute_query(&self) -> Result<&Self> {
        self.context.execute_query().await?;
        Ok(self)
    }

    /// Flush the pending queue under the retry controller.
    ///
    /// # Errors
    /// Returns the final failure once the attempts are spent.
    pub async fn execute_query_retry(&self, options: RetryOptions) -> Result<&Self> {
        self.context.execute_query_retry(options).await?;
        Ok(self)
    }
}

impl<T> Clone for ClientResult<T> {
    fn clone(&self) -> Self {
        Self { cell: self.cell.clone(), context: self.context.clone() }
    }
}

impl<T: fmt::Debug> fmt::Debug for ClientResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientResult")
            .field("id", &self.cell.id)
            .field("value", &*self.cell.value.read())
            .finish()
    }
}

struct ResultSlot<T> {
    cell: Arc<ResultCell<T>>,
}

impl<T: ResultValue> ResultSink for ResultSlot<T> {
    fn stage(&self, payload: Value) -> Result<Commit> {
        // No body: keep the default
        if payload.is_null() {
            return Ok(Box::new(|| {}));
        }
        let next = self.cell.value.read().merged(payload)?;
        let cell = self.cell.clone();
        Ok(Box::new(move || *cell.value.write() = next))
    }

    fn result_id(&self) -> Option<Uuid> {
        Some(self.cell.id)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_scalars_unwrap_value_envelope() {
        assert!(true.merged(json!({"value": false})).is_ok_and(|v| !v));
        assert_eq!(0_i64.merged(json!(42)).unwrap(), 42);
        assert_eq!(String::new().merged(json!({"value": "ok"})).unwrap(), "ok");
    }

    #[test]
    fn test_objects_with_value_field_among_others_are_not_unwrapped() {
        let payload = json!({"value": 1, "other": 2});
        assert_eq!(Value::Null.merged(payload.clone()).unwrap(), payload);
        assert!(0_i64.merged(payload).is_err());
    }

    #[test]
    fn test_type_mismatch_is_deserialization_error() {
        let err = 0_i64.merged(json!("nope")).unwrap_err();
        assert!(matches!(err, RestqError::Deserialization(_)));
    }

    #[test]
    fn test_client_value_merges_fields() {
        let mut base = ClientValue::new("t");
        base.set("a", 1);
        let merged = base.merged(json!({"b": 2})).unwrap();
        assert_eq!(merged.to_json(), json!({"a": 1, "b": 2}));
        // The original stays untouched until commit
        assert_eq!(base.to_json(), json!({"a": 1}));
    }

    #[test]
    fn test_apply_property_replaces_plain_values() {
        let mut value = 1_i64;
        value.apply_property("ignored", json!(5)).unwrap();
        assert_eq!(value, 5);
    }

    #[test]
    fn test_timestamps_and_lists() {
        let timestamp = DateTime::<Utc>::MIN_UTC.merged(json!("2024-05-01T10:00:00Z")).unwrap();
        assert_eq!(timestamp.to_rfc3339(), "2024-05-01T10:00:00+00:00");

        let names: Vec<String> = Vec::new().merged(json!({"value": ["a", "b"]})).unwrap();
        assert_eq!(names, vec!["a", "b"]);

        let missing: Option<String> = None.merged(json!(null)).unwrap();
        assert!(missing.is_none());
    }
}
