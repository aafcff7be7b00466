//! Entity model: property stores, entities, client values and collections

mod collection;
mod entity;
mod property;
mod value;

pub use collection::{EntityCollection, RawCollection};
pub use entity::{Entity, EntityType};
pub use property::{defaults, DefaultFactory, PropertyDefault, PropertyStore, PropertyValue};
pub use value::{ClientValue, ClientValueCollection, ClientValueType};
