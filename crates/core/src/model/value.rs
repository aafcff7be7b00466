//! Client values: structured, path-less property bags
//!
//! A client value is embedded inside an entity (an item body, a principal, a
//! content type id). It has fields but no address of its own, so it can only
//! be read or written as part of its owner.

use std::marker::PhantomData;

use restq_domain::{RestqError, Result};
use serde_json::{Map, Value};

/// Untyped client value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ClientValue {
    type_name: &'static str,
    properties: Map<String, Value>,
}

impl ClientValue {
    pub fn new(type_name: &'static str) -> Self {
        Self { type_name, properties: Map::new() }
    }

    /// Build a value from a JSON object.
    ///
    /// # Errors
    /// Returns `RestqError::Deserialization` if `value` is not an object.
    pub fn from_json(type_name: &'static str, value: &Value) -> Result<Self> {
        let mut client_value = Self::new(type_name);
        client_value.merge_json(value)?;
        Ok(client_value)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Field value, or `Value::Null` when unset.
    pub fn get(&self, name: &str) -> Value {
        self.properties.get(name).cloned().unwrap_or(Value::Null)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(Value::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.properties.get(name).and_then(Value::as_bool)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.properties.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Copy every field of `other` onto `self`, field by field.
    pub fn merge(&mut self, other: &ClientValue) {
        for (name, value) in &other.properties {
            self.properties.insert(name.clone(), value.clone());
        }
    }

    /// Patch fields from a JSON object. `null` leaves the value untouched.
    ///
    /// # Errors
    /// Returns `RestqError::Deserialization` for any other non-object input.
    pub fn merge_json(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Object(fields) => {
                for (name, field) in fields {
                    self.properties.insert(name.clone(), field.clone());
                }
                Ok(())
            }
            Value::Null => Ok(()),
            other => Err(RestqError::Deserialization(format!(
                "expected an object for client value '{}', got {}",
                self.type_name,
                json_kind(other)
            ))),
        }
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.properties.clone())
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Trait for strongly typed client values
///
/// Implemented through [`client_value_type!`](crate::client_value_type),
/// which generates a newtype over [`ClientValue`].
pub trait ClientValueType: Sized + Clone + Send + Sync + 'static {
    const TYPE_NAME: &'static str;

    fn from_value(value: ClientValue) -> Self;
    fn value(&self) -> &ClientValue;
    fn value_mut(&mut self) -> &mut ClientValue;
    fn into_value(self) -> ClientValue;

    fn empty() -> Self {
        Self::from_value(ClientValue::new(Self::TYPE_NAME))
    }
}

/// Declares a newtype client value with its server-side type name.
///
/// ```ignore
/// client_value_type! {
///     /// Body of a message or meeting invitation
///     pub struct ItemBody => "microsoft.graph.itemBody";
/// }
/// ```
#[macro_export]
macro_rules! client_value_type {
    ($(#[$meta:meta])* $vis:vis struct $name:ident => $type_name:literal;) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name($crate::model::ClientValue);

        impl $crate::model::ClientValueType for $name {
            const TYPE_NAME: &'static str = $type_name;

            fn from_value(value: $crate::model::ClientValue) -> Self {
                Self(value)
            }

            fn value(&self) -> &$crate::model::ClientValue {
                &self.0
            }

            fn value_mut(&mut self) -> &mut $crate::model::ClientValue {
                &mut self.0
            }

            fn into_value(self) -> $crate::model::ClientValue {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                <Self as $crate::model::ClientValueType>::empty()
            }
        }

        impl ::std::ops::Deref for $name {
            type Target = $crate::model::ClientValue;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl ::std::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.0
            }
        }

        impl $crate::runtime::ResultValue for $name {
            fn merged(
                &self,
                payload: $crate::__private::Value,
            ) -> $crate::__private::Result<Self> {
                let mut next = self.clone();
                next.0.merge_json(&payload)?;
                Ok(next)
            }

            fn apply_property(
                &mut self,
                name: &str,
                value: $crate::__private::Value,
            ) -> $crate::__private::Result<()> {
                self.0.set(name, value);
                Ok(())
            }
        }

        impl From<$name> for $crate::model::PropertyValue {
            fn from(value: $name) -> Self {
                $crate::model::PropertyValue::Value(value.0)
            }
        }
    };
}

/// Ordered list of typed client values, the default for array-of-values
/// properties.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientValueCollection<V> {
    items: Vec<ClientValue>,
    _marker: PhantomData<fn() -> V>,
}

impl<V: ClientValueType> Default for ClientValueCollection<V> {
    fn default() -> Self {
        Self::from_values(Vec::new())
    }
}

impl<V: ClientValueType> ClientValueCollection<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn from_values(items: Vec<ClientValue>) -> Self {
        Self { items, _marker: PhantomData }
    }

    /// Build from a JSON array, or an object wrapping one under `value`.
    ///
    /// # Errors
    /// Returns `RestqError::Deserialization` if the shape is wrong or an
    /// element is not an object.
    pub fn from_json(value: &Value) -> Result<Self> {
        let items = values_from_json(V::TYPE_NAME, value)?;
        Ok(Self::from_values(items))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<V> {
        self.items.get(index).cloned().map(V::from_value)
    }

    pub fn push(&mut self, value: V) {
        self.items.push(value.into_value());
    }

    pub fn iter(&self) -> impl Iterator<Item = V> + '_ {
        self.items.iter().cloned().map(V::from_value)
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.items.iter().map(ClientValue::to_json).collect())
    }
}

pub(crate) fn values_from_json(item_type: &'static str, value: &Value) -> Result<Vec<ClientValue>> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(envelope) => match envelope.get(restq_domain::constants::VALUE_ENVELOPE_KEY) {
            Some(Value::Array(items)) => items,
            _ => {
                return Err(RestqError::Deserialization(format!(
                    "expected an array of '{item_type}' values"
                )))
            }
        },
        Value::Null => return Ok(Vec::new()),
        other => {
            return Err(RestqError::Deserialization(format!(
                "expected an array of '{item_type}' values, got {}",
                json_kind(other)
            )))
        }
    };
    items.iter().map(|item| ClientValue::from_json(item_type, item)).collect()
}
