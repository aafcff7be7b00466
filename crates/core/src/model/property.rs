//! Property values, per-entity property stores and default-value tables

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use restq_domain::{ResourcePath, RestqError, Result};
use serde_json::{Map, Value};
use tracing::warn;

use super::collection::RawCollection;
use super::entity::Entity;
use super::value::{json_kind, values_from_json, ClientValue};

/// A single property of an entity
///
/// Scalars stay raw JSON. The other variants carry enough type information
/// for a response field to be materialized into the right shape.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Json(Value),
    Strings(Vec<String>),
    Timestamp(DateTime<Utc>),
    Value(ClientValue),
    Values { item_type: &'static str, items: Vec<ClientValue> },
    Entity(Entity),
    Collection(RawCollection),
}

impl PropertyValue {
    pub fn null() -> Self {
        Self::Json(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Json(Value::Null))
    }

    /// Whether the value refers to another addressable resource.
    pub fn is_navigation(&self) -> bool {
        matches!(self, Self::Entity(_) | Self::Collection(_))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_entity(&self) -> Option<&Entity> {
        match self {
            Self::Entity(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&RawCollection> {
        match self {
            Self::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    pub fn as_client_value(&self) -> Option<&ClientValue> {
        match self {
            Self::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Wire representation. Navigation properties are never serialized.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            Self::Json(value) => Some(value.clone()),
            Self::Strings(items) => {
                Some(Value::Array(items.iter().cloned().map(Value::String).collect()))
            }
            Self::Timestamp(timestamp) => Some(Value::String(timestamp.to_rfc3339())),
            Self::Value(value) => Some(value.to_json()),
            Self::Values { items, .. } => {
                Some(Value::Array(items.iter().map(ClientValue::to_json).collect()))
            }
            Self::Entity(_) | Self::Collection(_) => None,
        }
    }

    /// Check that an incoming response field fits the shape of `self`.
    ///
    /// `null` fits every shape. Scalars and timestamps accept anything; an
    /// unparsable timestamp is kept raw.
    ///
    /// # Errors
    /// Returns `RestqError::Deserialization` when a list, client value,
    /// entity or collection field has the wrong shape, at any depth.
    pub(crate) fn check(&self, name: &str, owner: &ResourcePath, incoming: &Value) -> Result<()> {
        if incoming.is_null() {
            return Ok(());
        }
        let mismatch = |expected: &str| {
            RestqError::Deserialization(format!(
                "expected {expected} for field '{name}' of '{owner}', got {}",
                json_kind(incoming)
            ))
        };
        match self {
            Self::Json(_) | Self::Timestamp(_) => Ok(()),
            Self::Strings(_) => match incoming {
                Value::Array(items) if items.iter().all(Value::is_string) => Ok(()),
                _ => Err(mismatch("an array of strings")),
            },
            Self::Value(_) => match incoming {
                Value::Object(_) => Ok(()),
                _ => Err(mismatch("an object")),
            },
            Self::Values { item_type, .. } => values_from_json(item_type, incoming).map(drop),
            Self::Entity(entity) => match incoming {
                Value::Object(fields) => entity.check_fields(fields),
                _ => Err(mismatch("an object")),
            },
            Self::Collection(collection) => collection.check_items(incoming).map(drop),
        }
    }

    /// Shape an incoming response field like `self`.
    ///
    /// `self` is the stored value or the type's default for the field. Sinks
    /// run [`check`](Self::check) first; JSON that still does not fit is
    /// kept raw.
    pub(crate) fn materialize(self, incoming: Value) -> PropertyValue {
        match self {
            Self::Strings(_) => match serde_json::from_value::<Vec<String>>(incoming.clone()) {
                Ok(items) => Self::Strings(items),
                Err(_) => Self::Json(incoming),
            },
            Self::Timestamp(_) => match incoming.as_str().and_then(parse_timestamp) {
                Some(timestamp) => Self::Timestamp(timestamp),
                None => Self::Json(incoming),
            },
            Self::Value(mut value) => match value.merge_json(&incoming) {
                Ok(()) => Self::Value(value),
                Err(_) => Self::Json(incoming),
            },
            Self::Values { item_type, items } => match values_from_json(item_type, &incoming) {
                Ok(parsed) => Self::Values { item_type, items: parsed },
                Err(_) => Self::Values { item_type, items },
            },
            Self::Entity(entity) => match incoming {
                Value::Object(fields) => {
                    entity.absorb(fields);
                    Self::Entity(entity)
                }
                Value::Null => Self::Entity(entity),
                other => Self::Json(other),
            },
            Self::Collection(collection) => {
                if let Err(err) = collection.replace_from_json(&incoming) {
                    warn!(path = %collection.path(), error = %err, "Collection left unchanged");
                }
                Self::Collection(collection)
            }
            Self::Json(_) => Self::Json(incoming),
        }
    }
}

/// Parse the timestamp formats servers emit: RFC 3339, or naive ISO 8601
/// interpreted as UTC.
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::Json(Value::String(value.to_string()))
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::Json(Value::String(value))
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        Self::Json(Value::Bool(value))
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        Self::Json(Value::from(value))
    }
}

impl From<Vec<String>> for PropertyValue {
    fn from(value: Vec<String>) -> Self {
        Self::Strings(value)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Timestamp(value)
    }
}

impl From<ClientValue> for PropertyValue {
    fn from(value: ClientValue) -> Self {
        Self::Value(value)
    }
}

impl From<Entity> for PropertyValue {
    fn from(value: Entity) -> Self {
        Self::Entity(value)
    }
}

impl From<RawCollection> for PropertyValue {
    fn from(value: RawCollection) -> Self {
        Self::Collection(value)
    }
}

/// Field name to value mapping with change tracking
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyStore {
    values: HashMap<String, PropertyValue>,
    dirty: BTreeSet<String>,
}

impl PropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value only; defaults are resolved by the owning entity.
    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Store `value` under `name`, marking it dirty when `persist` is set.
    ///
    /// A client value already stored under `name` absorbs an incoming client
    /// value or JSON object field by field instead of being replaced.
    pub fn set(&mut self, name: &str, value: PropertyValue, persist: bool) {
        let merged = match (self.values.get_mut(name), value) {
            (Some(PropertyValue::Value(existing)), PropertyValue::Value(incoming)) => {
                existing.merge(&incoming);
                None
            }
            (Some(PropertyValue::Value(existing)), PropertyValue::Json(Value::Object(fields))) => {
                existing.merge_json(&Value::Object(fields)).ok();
                None
            }
            (_, value) => Some(value),
        };
        if let Some(value) = merged {
            self.values.insert(name.to_string(), value);
        }
        if persist {
            self.dirty.insert(name.to_string());
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<PropertyValue> {
        self.dirty.remove(name);
        self.values.remove(name)
    }

    pub fn is_dirty(&self, name: &str) -> bool {
        self.dirty.contains(name)
    }

    /// Dirty field names in lexical order.
    pub fn dirty_names(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// JSON object holding exactly the dirty, serializable fields.
    pub fn update_payload(&self) -> Value {
        let fields: Map<String, Value> = self
            .dirty
            .iter()
            .filter_map(|name| {
                let value = self.values.get(name)?.to_json()?;
                Some((name.clone(), value))
            })
            .collect();
        Value::Object(fields)
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Clear the dirty flag of each field in `sent` whose current wire value
    /// still equals the sent one. Fields changed since stay dirty.
    pub fn clear_dirty_unchanged(&mut self, sent: &Map<String, Value>) {
        let values = &self.values;
        self.dirty.retain(|name| match sent.get(name) {
            Some(sent) => values.get(name).and_then(PropertyValue::to_json).as_ref() != Some(sent),
            None => true,
        });
    }

    /// Every serializable stored field.
    pub fn to_json(&self) -> Value {
        let fields: Map<String, Value> = self
            .values
            .iter()
            .filter_map(|(name, value)| Some((name.clone(), value.to_json()?)))
            .collect();
        Value::Object(fields)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Constructor for the value an unset property reads as.
///
/// Receives the owning entity and the property name so navigation defaults
/// can bind to `{owner}/{name}`.
pub type DefaultFactory = fn(&Entity, &str) -> PropertyValue;

/// One row of an entity type's default table
#[derive(Clone, Copy)]
pub struct PropertyDefault {
    pub name: &'static str,
    pub factory: DefaultFactory,
}

impl PropertyDefault {
    pub const fn new(name: &'static str, factory: DefaultFactory) -> Self {
        Self { name, factory }
    }

    pub fn build(&self, owner: &Entity) -> PropertyValue {
        (self.factory)(owner, self.name)
    }
}

impl fmt::Debug for PropertyDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDefault").field("name", &self.name).finish_non_exhaustive()
    }
}

/// Factories for [`PropertyDefault`] tables
pub mod defaults {
    use chrono::{DateTime, Utc};

    use super::PropertyValue;
    use crate::model::{ClientValueType, Entity, EntityType, RawCollection};

    /// Fresh child entity of type `E` at `{owner}/{name}`.
    pub fn entity<E: EntityType>(owner: &Entity, name: &str) -> PropertyValue {
        PropertyValue::Entity(owner.child::<E>(name).into_entity())
    }

    /// Fresh, empty collection of `E` at `{owner}/{name}`.
    pub fn collection<E: EntityType>(owner: &Entity, name: &str) -> PropertyValue {
        PropertyValue::Collection(RawCollection::new(
            owner.context().clone(),
            owner.path().child(name),
            E::TYPE_NAME,
            E::defaults(),
        ))
    }

    pub fn value<V: ClientValueType>(_owner: &Entity, _name: &str) -> PropertyValue {
        PropertyValue::Value(V::empty().into_value())
    }

    pub fn values<V: ClientValueType>(_owner: &Entity, _name: &str) -> PropertyValue {
        PropertyValue::Values { item_type: V::TYPE_NAME, items: Vec::new() }
    }

    pub fn strings(_owner: &Entity, _name: &str) -> PropertyValue {
        PropertyValue::Strings(Vec::new())
    }

    pub fn timestamp(_owner: &Entity, _name: &str) -> PropertyValue {
        PropertyValue::Timestamp(DateTime::<Utc>::MIN_UTC)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_update_payload_contains_only_dirty_fields() {
        let mut store = PropertyStore::new();
        store.set("Id", "42".into(), false);
        store.set("Subject", "Hi".into(), true);

        assert_eq!(store.update_payload(), json!({"Subject": "Hi"}));
        assert!(store.is_dirty("Subject"));
        assert!(!store.is_dirty("Id"));

        store.clear_dirty();
        assert_eq!(store.update_payload(), json!({}));
        assert_eq!(store.get("Subject"), Some(&PropertyValue::from("Hi")));
    }

    #[test]
    fn test_clear_dirty_unchanged_keeps_later_edits() {
        let mut store = PropertyStore::new();
        store.set("Subject", "Hi".into(), true);
        store.set("Location", "Room 1".into(), true);
        let sent = store.update_payload().as_object().cloned().unwrap();

        store.set("Location", "Room 2".into(), true);
        store.set("Body", "later".into(), true);
        store.clear_dirty_unchanged(&sent);

        assert!(!store.is_dirty("Subject"));
        assert_eq!(store.update_payload(), json!({"Body": "later", "Location": "Room 2"}));
    }

    #[test]
    fn test_check_rejects_wrong_shapes() {
        let owner = ResourcePath::root("me");

        assert!(PropertyValue::Strings(Vec::new()).check("tags", &owner, &json!(["a"])).is_ok());
        assert!(PropertyValue::Strings(Vec::new()).check("tags", &owner, &json!(null)).is_ok());
        let err =
            PropertyValue::Strings(Vec::new()).check("tags", &owner, &json!([1])).unwrap_err();
        assert!(matches!(err, RestqError::Deserialization(msg) if msg.contains("'tags' of 'me'")));

        let body = PropertyValue::Value(ClientValue::new("microsoft.graph.itemBody"));
        assert!(body.check("body", &owner, &json!("text")).is_err());

        let values = PropertyValue::Values { item_type: "t", items: Vec::new() };
        assert!(values.check("items", &owner, &json!("garbage")).is_err());
        assert!(PropertyValue::Json(json!(1)).check("count", &owner, &json!("x")).is_ok());
    }

    #[test]
    fn test_client_value_merges_instead_of_replacing() {
        let mut body = ClientValue::new("microsoft.graph.itemBody");
        body.set("contentType", "html");

        let mut store = PropertyStore::new();
        store.set("body", PropertyValue::Value(body), false);
        store.set("body", json!({"content": "<p>hi</p>"}).into(), true);

        let stored = store.get("body").and_then(PropertyValue::as_client_value).unwrap();
        assert_eq!(stored.get("contentType"), json!("html"));
        assert_eq!(stored.get("content"), json!("<p>hi</p>"));
        assert_eq!(
            store.update_payload(),
            json!({"body": {"contentType": "html", "content": "<p>hi</p>"}})
        );
    }

    #[test]
    fn test_scalar_replaces_client_value() {
        let mut store = PropertyStore::new();
        store.set("body", PropertyValue::Value(ClientValue::new("t")), false);
        store.set("body", json!("plain").into(), false);

        assert_eq!(store.get("body"), Some(&PropertyValue::from("plain")));
    }

    #[test]
    fn test_timestamp_serializes_as_rfc3339() {
        let timestamp = parse_timestamp("2024-03-01T09:30:00Z").unwrap();
        assert_eq!(
            PropertyValue::Timestamp(timestamp).to_json(),
            Some(json!("2024-03-01T09:30:00+00:00"))
        );
    }

    #[test]
    fn test_parse_timestamp_accepts_naive_iso() {
        let parsed = parse_timestamp("2024-03-01T09:30:00.5").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-03-01T09:30:00.500+00:00");
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_materialize_follows_template_shape() {
        let strings = PropertyValue::Strings(Vec::new()).materialize(json!(["a", "b"]));
        assert_eq!(strings, PropertyValue::Strings(vec!["a".into(), "b".into()]));

        let mismatch = PropertyValue::Strings(Vec::new()).materialize(json!(7));
        assert_eq!(mismatch, PropertyValue::Json(json!(7)));

        let timestamp = PropertyValue::Timestamp(DateTime::<Utc>::MIN_UTC)
            .materialize(json!("2024-01-01T00:00:00Z"));
        assert!(matches!(timestamp, PropertyValue::Timestamp(t) if t.timestamp() == 1_704_067_200));
    }
}
