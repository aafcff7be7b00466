//! Addressable entities
//!
//! An [`Entity`] couples a property store with a resource path and a handle
//! to the execution context. Typed entities are newtypes over it declared
//! with [`entity_type!`](crate::entity_type), each with a static table of
//! property defaults.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use restq_domain::{ResourcePath, RestqError, Result};
use serde_json::{Map, Value};
use tracing::debug;

use super::collection::EntityCollection;
use super::property::{parse_timestamp, PropertyDefault, PropertyStore, PropertyValue};
use super::value::{json_kind, ClientValue, ClientValueCollection, ClientValueType};
use crate::runtime::{ClientContext, ClientResult, Commit, Query, ResultSink, ResultValue};

struct EntityInner {
    context: Arc<ClientContext>,
    path: RwLock<ResourcePath>,
    type_name: &'static str,
    defaults: &'static [PropertyDefault],
    properties: RwLock<PropertyStore>,
}

/// Shared handle to a remote resource's local state.
///
/// Clones share the same property store. Equality is structural: same
/// path, same type, same stored properties.
#[derive(Clone)]
pub struct Entity {
    inner: Arc<EntityInner>,
}

impl Entity {
    pub fn new(
        context: Arc<ClientContext>,
        path: ResourcePath,
        type_name: &'static str,
        defaults: &'static [PropertyDefault],
    ) -> Self {
        Self {
            inner: Arc::new(EntityInner {
                context,
                path: RwLock::new(path),
                type_name,
                defaults,
                properties: RwLock::new(PropertyStore::new()),
            }),
        }
    }

    /// An entity with no type name and no defaults.
    pub fn untyped(context: Arc<ClientContext>, path: ResourcePath) -> Self {
        Self::new(context, path, "", &[])
    }

    pub fn context(&self) -> &Arc<ClientContext> {
        &self.inner.context
    }

    pub fn path(&self) -> ResourcePath {
        self.inner.path.read().clone()
    }

    /// Move the entity to its server-assigned address, once a create
    /// response names it.
    pub(crate) fn rebind(&self, path: ResourcePath) {
        debug!(from = %self.path(), to = %path, "Rebinding created entity");
        *self.inner.path.write() = path;
    }

    pub fn type_name(&self) -> &'static str {
        self.inner.type_name
    }

    /// Whether both handles share the same underlying state.
    pub fn same_instance(&self, other: &Entity) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Typed entity of type `E` bound to `{self}/{segment}`.
    pub fn child<E: EntityType>(&self, segment: &str) -> E {
        E::bind(self.context().clone(), self.path().child(segment))
    }

    fn default_for(&self, name: &str) -> Option<PropertyValue> {
        self.inner.defaults.iter().find(|row| row.name == name).map(|row| row.build(self))
    }

    /// Stored value, else the type's default for `name`, else `null`.
    ///
    /// Defaults are built fresh on every miss and never stored.
    pub fn get_property(&self, name: &str) -> PropertyValue {
        let stored = self.inner.properties.read().get(name).cloned();
        stored.or_else(|| self.default_for(name)).unwrap_or_else(PropertyValue::null)
    }

    /// Whether a value (not a default) is stored under `name`.
    pub fn is_property_available(&self, name: &str) -> bool {
        self.inner.properties.read().contains(name)
    }

    /// Wire representation of a property, `null` for navigation properties.
    pub fn get_json(&self, name: &str) -> Value {
        self.get_property(name).to_json().unwrap_or(Value::Null)
    }

    pub fn get_string(&self, name: &str) -> Option<String> {
        match self.get_json(name) {
            Value::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get_json(name).as_bool()
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get_json(name).as_i64()
    }

    /// Timestamp property, `DateTime::<Utc>::MIN_UTC` when unset or unparsable.
    pub fn get_timestamp(&self, name: &str) -> DateTime<Utc> {
        match self.get_property(name) {
            PropertyValue::Timestamp(timestamp) => timestamp,
            PropertyValue::Json(Value::String(raw)) => {
                parse_timestamp(&raw).unwrap_or(DateTime::<Utc>::MIN_UTC)
            }
            _ => DateTime::<Utc>::MIN_UTC,
        }
    }

    pub fn get_strings(&self, name: &str) -> Vec<String> {
        match self.get_property(name) {
            PropertyValue::Strings(items) => items,
            PropertyValue::Json(value) => serde_json::from_value(value).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Navigation property as a typed entity, bound to `{self}/{name}` when
    /// nothing is stored.
    pub fn get_entity<E: EntityType>(&self, name: &str) -> E {
        match self.get_property(name) {
            PropertyValue::Entity(entity) => E::from_entity(entity),
            _ => self.child::<E>(name),
        }
    }

    pub fn get_collection<E: EntityType>(&self, name: &str) -> EntityCollection<E> {
        match self.get_property(name) {
            PropertyValue::Collection(raw) => EntityCollection::from_raw(raw),
            _ => EntityCollection::bind(self.context().clone(), self.path().child(name)),
        }
    }

    pub fn get_value<V: ClientValueType>(&self, name: &str) -> V {
        match self.get_property(name) {
            PropertyValue::Value(value) => V::from_value(value),
            PropertyValue::Json(json @ Value::Object(_)) => {
                ClientValue::from_json(V::TYPE_NAME, &json)
                    .map(V::from_value)
                    .unwrap_or_else(|_| V::empty())
            }
            _ => V::empty(),
        }
    }

    pub fn get_values<V: ClientValueType>(&self, name: &str) -> ClientValueCollection<V> {
        match self.get_property(name) {
            PropertyValue::Values { items, .. } => ClientValueCollection::from_values(items),
            PropertyValue::Json(json) => {
                ClientValueCollection::from_json(&json).unwrap_or_default()
            }
            _ => ClientValueCollection::new(),
        }
    }

    /// Store a property. With `persist` the field joins the next update
    /// payload.
    pub fn set_property(
        &self,
        name: &str,
        value: impl Into<PropertyValue>,
        persist: bool,
    ) -> &Self {
        self.inner.properties.write().set(name, value.into(), persist);
        self
    }

    pub fn is_dirty(&self, name: &str) -> bool {
        self.inner.properties.read().is_dirty(name)
    }

    pub fn dirty_properties(&self) -> Vec<String> {
        self.inner.properties.read().dirty_names().map(str::to_string).collect()
    }

    /// JSON object with exactly the fields changed via persisting setters.
    pub fn update_payload(&self) -> Value {
        self.inner.properties.read().update_payload()
    }

    /// Clear the dirty flag of every field in `sent` whose value has not
    /// changed since it was sent.
    pub(crate) fn clear_sent(&self, sent: &Map<String, Value>) {
        self.inner.properties.write().clear_dirty_unchanged(sent);
    }

    /// Every serializable stored property.
    pub fn to_json(&self) -> Value {
        self.inner.properties.read().to_json()
    }

    pub fn property_names(&self) -> Vec<String> {
        self.inner.properties.read().names().map(str::to_string).collect()
    }

    /// Check that every field of a response object fits the shape of its
    /// stored value or default, nested entities and collections included.
    ///
    /// # Errors
    /// Returns `RestqError::Deserialization` naming the first field that
    /// does not fit.
    pub(crate) fn check_fields(&self, fields: &Map<String, Value>) -> Result<()> {
        for (name, incoming) in fields {
            let template = self.inner.properties.read().get(name).cloned();
            if let Some(template) = template.or_else(|| self.default_for(name)) {
                template.check(name, &self.path(), incoming)?;
            }
        }
        Ok(())
    }

    /// Materialize a response object into the store, field by field.
    ///
    /// Each field takes the shape of its stored value or default. Absorbed
    /// fields are not dirty.
    pub(crate) fn absorb(&self, fields: Map<String, Value>) {
        for (name, incoming) in fields {
            let template = self.inner.properties.read().get(&name).cloned();
            let value = match template.or_else(|| self.default_for(&name)) {
                Some(template) => template.materialize(incoming),
                None => PropertyValue::Json(incoming),
            };
            self.inner.properties.write().set(&name, value, false);
        }
    }

    // Deferred operations
    // -----------------------------------------------------------------

    /// Enqueue a retrieve of this entity into itself.
    pub fn get(&self) -> &Self {
        let query = Query::read(self.path()).with_sink(Arc::new(EntitySink::new(self)));
        self.context().add_query(query);
        self
    }

    /// Enqueue a PATCH with the dirty fields.
    ///
    /// Once the update succeeds, the sent fields stop being dirty unless
    /// they were set again in the meantime.
    pub fn update(&self) -> &Self {
        let payload = self.update_payload();
        debug!(path = %self.path(), payload = %payload, "Enqueueing entity update");
        let sent = payload.as_object().cloned().unwrap_or_default();
        let query = Query::update(self.path(), payload)
            .with_sink(Arc::new(EntitySink::new(self).clearing_sent(sent)));
        self.context().add_query(query);
        self
    }

    /// Enqueue a DELETE of this entity.
    pub fn delete_object(&self) -> &Self {
        self.context().add_query(Query::delete(self.path()));
        self
    }

    /// Enqueue a service operation whose response is discarded.
    pub fn invoke(&self, name: &str, parameters: Option<Value>) -> &Self {
        let query = Query::service_operation(self.path(), name, parameters);
        self.context().add_query(query);
        self
    }

    /// Enqueue a service operation with a typed result.
    pub fn invoke_for<T: ResultValue>(
        &self,
        name: &str,
        parameters: Option<Value>,
        default: T,
    ) -> ClientResult<T> {
        let result = ClientResult::new(self.context().clone(), default);
        let query = Query::service_operation(self.path(), name, parameters)
            .with_sink(result.sink());
        self.context().add_query(query);
        result
    }

    /// Enqueue a service operation that returns an entity, materialized into
    /// a fresh `E` at `{self}/{name}`.
    pub fn invoke_for_entity<E: EntityType>(&self, name: &str, parameters: Option<Value>) -> E {
        let target = self.child::<E>(name);
        let query = Query::service_operation(self.path(), name, parameters)
            .with_sink(Arc::new(EntitySink::new(target.entity())));
        self.context().add_query(query);
        target
    }

    /// Flush the context's pending queue.
    ///
    /// # Errors
    /// Propagates the batch failure; see [`ClientContext::execute_query`].
    pub async fn execute_query(&self) -> Result<&Self> {
        self.context().execute_query().await?;
        Ok(self)
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        if self.same_instance(other) {
            return true;
        }
        self.path() == other.path()
            && self.type_name() == other.type_name()
            && *self.inner.properties.read() == *other.inner.properties.read()
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("type_name", &self.type_name())
            .field("path", &self.path().render())
            .field("properties", &self.property_names())
            .finish()
    }
}

/// Populates an entity from a response object.
pub(crate) struct EntitySink {
    entity: Entity,
    sent: Option<Map<String, Value>>,
}

impl EntitySink {
    pub(crate) fn new(entity: &Entity) -> Self {
        Self { entity: entity.clone(), sent: None }
    }

    /// Clear the dirty flags of the `sent` fields on commit.
    pub(crate) fn clearing_sent(mut self, sent: Map<String, Value>) -> Self {
        self.sent = Some(sent);
        self
    }
}

impl ResultSink for EntitySink {
    fn stage(&self, payload: Value) -> Result<Commit> {
        let fields = match payload {
            Value::Object(fields) => fields,
            // PATCH and many service operations reply 204
            Value::Null => Map::new(),
            other => {
                return Err(RestqError::Deserialization(format!(
                    "expected an object for entity at '{}', got {}",
                    self.entity.path(),
                    json_kind(&other)
                )))
            }
        };
        self.entity.check_fields(&fields)?;
        let entity = self.entity.clone();
        let sent = self.sent.clone();
        Ok(Box::new(move || {
            // Compare against what was sent before the response overwrites it
            if let Some(sent) = &sent {
                entity.clear_sent(sent);
            }
            entity.absorb(fields);
        }))
    }
}

/// Trait for strongly typed entities
pub trait EntityType: Sized + Clone + Send + Sync + 'static {
    const TYPE_NAME: &'static str;

    /// Default table consulted when a property is unset
    fn defaults() -> &'static [PropertyDefault] {
        &[]
    }

    fn from_entity(entity: Entity) -> Self;
    fn entity(&self) -> &Entity;
    fn into_entity(self) -> Entity;

    fn bind(context: Arc<ClientContext>, path: ResourcePath) -> Self {
        Self::from_entity(Entity::new(context, path, Self::TYPE_NAME, Self::defaults()))
    }
}

/// Declares a newtype entity with its server-side type name and optional
/// default table.
///
/// ```ignore
/// entity_type! {
///     /// Profile of the current user
///     pub struct UserProfile => "SP.UserProfiles.UserProfile", defaults = USER_PROFILE_DEFAULTS;
/// }
/// ```
#[macro_export]
macro_rules! entity_type {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident => $type_name:literal $(, defaults = $defaults:expr)? ;
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis struct $name($crate::model::Entity);

        impl $crate::model::EntityType for $name {
            const TYPE_NAME: &'static str = $type_name;

            $(
                fn defaults() -> &'static [$crate::model::PropertyDefault] {
                    $defaults
                }
            )?

            fn from_entity(entity: $crate::model::Entity) -> Self {
                Self(entity)
            }

            fn entity(&self) -> &$crate::model::Entity {
                &self.0
            }

            fn into_entity(self) -> $crate::model::Entity {
                self.0
            }
        }

        impl ::std::ops::Deref for $name {
            type Target = $crate::model::Entity;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl From<$name> for $crate::model::PropertyValue {
            fn from(value: $name) -> Self {
                $crate::model::PropertyValue::Entity(value.0)
            }
        }
    };
}
