//! Path-bound entity collections

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::RwLock;
use restq_domain::constants::VALUE_ENVELOPE_KEY;
use restq_domain::{ResourcePath, RestqError, Result};
use serde_json::{Map, Value};

use super::entity::{Entity, EntitySink, EntityType};
use super::property::{PropertyDefault, PropertyValue};
use super::value::json_kind;
use crate::runtime::{ClientContext, Commit, Query, ResultSink};

struct CollectionInner {
    context: Arc<ClientContext>,
    path: ResourcePath,
    item_type: &'static str,
    item_defaults: &'static [PropertyDefault],
    items: RwLock<Vec<Entity>>,
}

/// Untyped collection handle; what a collection property stores.
#[derive(Clone)]
pub struct RawCollection {
    inner: Arc<CollectionInner>,
}

impl RawCollection {
    pub fn new(
        context: Arc<ClientContext>,
        path: ResourcePath,
        item_type: &'static str,
        item_defaults: &'static [PropertyDefault],
    ) -> Self {
        Self {
            inner: Arc::new(CollectionInner {
                context,
                path,
                item_type,
                item_defaults,
                items: RwLock::new(Vec::new()),
            }),
        }
    }

    pub fn context(&self) -> &Arc<ClientContext> {
        &self.inner.context
    }

    pub fn path(&self) -> &ResourcePath {
        &self.inner.path
    }

    pub fn item_type(&self) -> &'static str {
        self.inner.item_type
    }

    pub fn len(&self) -> usize {
        self.inner.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.items.read().is_empty()
    }

    pub fn items(&self) -> Vec<Entity> {
        self.inner.items.read().clone()
    }

    /// Untyped item entity at `{collection}/{key}`.
    pub fn item_at(&self, key: &str) -> Entity {
        self.new_item(self.path().child(key))
    }

    fn new_item(&self, path: ResourcePath) -> Entity {
        Entity::new(self.context().clone(), path, self.item_type(), self.inner.item_defaults)
    }

    pub(crate) fn push(&self, entity: Entity) {
        self.inner.items.write().push(entity);
    }

    /// Check the payload shape and return the item objects.
    fn item_objects(&self, payload: &Value) -> Result<Vec<Map<String, Value>>> {
        let items = match payload {
            Value::Array(items) => items,
            Value::Object(envelope) => match envelope.get(VALUE_ENVELOPE_KEY) {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(RestqError::Deserialization(format!(
                        "expected a '{VALUE_ENVELOPE_KEY}' array for collection at '{}'",
                        self.path()
                    )))
                }
            },
            Value::Null => return Ok(Vec::new()),
            other => {
                return Err(RestqError::Deserialization(format!(
                    "expected an array for collection at '{}', got {}",
                    self.path(),
                    json_kind(other)
                )))
            }
        };

        items
            .iter()
            .map(|item| match item {
                Value::Object(fields) => Ok(fields.clone()),
                other => Err(RestqError::Deserialization(format!(
                    "expected an object item in collection at '{}', got {}",
                    self.path(),
                    json_kind(other)
                ))),
            })
            .collect()
    }

    /// Check the payload shape, item fields included, and return the item
    /// objects.
    pub(crate) fn check_items(&self, payload: &Value) -> Result<Vec<Map<String, Value>>> {
        let objects = self.item_objects(payload)?;
        let template = self.new_item(self.path().clone());
        for fields in &objects {
            template.check_fields(fields)?;
        }
        Ok(objects)
    }

    /// Build item entities from validated objects. An item is addressed by
    /// its `id`/`Id` field; items without one share the collection's path.
    fn materialize_items(&self, objects: Vec<Map<String, Value>>) -> Vec<Entity> {
        objects
            .into_iter()
            .map(|fields| {
                let path = match item_key(&fields) {
                    Some(key) => self.path().child(key),
                    None => self.path().clone(),
                };
                let entity = self.new_item(path);
                entity.absorb(fields);
                entity
            })
            .collect()
    }

    /// Replace the items from a response payload.
    ///
    /// # Errors
    /// Returns `RestqError::Deserialization` if the payload is not an array
    /// (or `value` envelope) of objects; the items are left untouched.
    pub(crate) fn replace_from_json(&self, payload: &Value) -> Result<()> {
        let objects = self.item_objects(payload)?;
        let items = self.materialize_items(objects);
        *self.inner.items.write() = items;
        Ok(())
    }
}

fn item_key(fields: &Map<String, Value>) -> Option<String> {
    ["id", "Id"].iter().find_map(|key| match fields.get(*key) {
        Some(Value::String(id)) if !id.is_empty() => Some(id.clone()),
        Some(Value::Number(id)) => Some(id.to_string()),
        _ => None,
    })
}

impl PartialEq for RawCollection {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }
        self.path() == other.path()
            && self.item_type() == other.item_type()
            && *self.inner.items.read() == *other.inner.items.read()
    }
}

impl fmt::Debug for RawCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawCollection")
            .field("item_type", &self.item_type())
            .field("path", &self.path().render())
            .field("len", &self.len())
            .finish()
    }
}

/// Replaces a collection's items with the response array.
struct CollectionSink {
    collection: RawCollection,
}

impl ResultSink for CollectionSink {
    fn stage(&self, payload: Value) -> Result<Commit> {
        let objects = self.collection.check_items(&payload)?;
        let collection = self.collection.clone();
        Ok(Box::new(move || {
            let items = collection.materialize_items(objects);
            *collection.inner.items.write() = items;
        }))
    }
}

/// Populates the entity returned by `add`, moves it to `{collection}/{id}`
/// when the response carries an id, and appends it to the collection.
struct CreatedItemSink {
    collection: RawCollection,
    item: EntitySink,
    entity: Entity,
}

impl ResultSink for CreatedItemSink {
    fn stage(&self, payload: Value) -> Result<Commit> {
        let key = payload.as_object().and_then(item_key);
        let absorb = self.item.stage(payload)?;
        let collection = self.collection.clone();
        let entity = self.entity.clone();
        Ok(Box::new(move || {
            absorb();
            if let Some(key) = key {
                entity.rebind(collection.path().child(key));
            }
            collection.push(entity);
        }))
    }
}

/// Typed collection of `E` bound to a resource path
pub struct EntityCollection<E> {
    raw: RawCollection,
    _marker: PhantomData<fn() -> E>,
}

impl<E: EntityType> EntityCollection<E> {
    pub fn bind(context: Arc<ClientContext>, path: ResourcePath) -> Self {
        Self::from_raw(RawCollection::new(context, path, E::TYPE_NAME, E::defaults()))
    }

    pub(crate) fn from_raw(raw: RawCollection) -> Self {
        Self { raw, _marker: PhantomData }
    }

    pub fn raw(&self) -> &RawCollection {
        &self.raw
    }

    pub fn path(&self) -> &ResourcePath {
        self.raw.path()
    }

    pub fn context(&self) -> &Arc<ClientContext> {
        self.raw.context()
    }

    /// Enqueue a retrieve that replaces this collection's items.
    pub fn get(&self) -> &Self {
        let sink = CollectionSink { collection: self.raw.clone() };
        self.context().add_query(Query::read(self.path().clone()).with_sink(Arc::new(sink)));
        self
    }

    /// Entity at `{collection}/{id}`. Nothing is enqueued.
    pub fn get_by_id(&self, id: impl fmt::Display) -> E {
        E::bind(self.context().clone(), self.path().child(id.to_string()))
    }

    /// Enqueue a create.
    ///
    /// The returned entity holds `payload` as dirty properties until the
    /// create succeeds. It is bound to the collection's path until the
    /// response names its id, then to `{collection}/{id}`, and is appended
    /// to the collection once the response arrives.
    pub fn add(&self, payload: Value) -> E {
        let entity = self.raw.new_item(self.path().clone());
        let sent = payload.as_object().cloned().unwrap_or_default();
        for (name, value) in &sent {
            entity.set_property(name, value.clone(), true);
        }
        let sink = CreatedItemSink {
            collection: self.raw.clone(),
            item: EntitySink::new(&entity).clearing_sent(sent),
            entity: entity.clone(),
        };
        let query = Query::create(self.path().clone(), payload).with_sink(Arc::new(sink));
        self.context().add_query(query);
        E::from_entity(entity)
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn items(&self) -> Vec<E> {
        self.raw.items().into_iter().map(E::from_entity).collect()
    }

    pub fn first(&self) -> Option<E> {
        self.raw.inner.items.read().first().cloned().map(E::from_entity)
    }
}

impl<E> Clone for EntityCollection<E> {
    fn clone(&self) -> Self {
        Self { raw: self.raw.clone(), _marker: PhantomData }
    }
}

impl<E> PartialEq for EntityCollection<E> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<E> fmt::Debug for EntityCollection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EntityCollection").field(&self.raw).finish()
    }
}

impl<E> From<EntityCollection<E>> for PropertyValue {
    fn from(value: EntityCollection<E>) -> Self {
        Self::Collection(value.raw)
    }
}
