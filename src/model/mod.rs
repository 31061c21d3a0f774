pub mod accessor;
pub mod descriptor;
pub mod dynamic;
pub mod identity;
pub mod naming;
pub mod registry;
pub mod shape;

use std::any::Any;

pub use accessor::FieldAccessor;
pub use descriptor::{FieldDescriptor, ModelDescriptor};
pub use dynamic::{DynamicModel, DynamicRecord};
pub use identity::{IdGenerator, Identity, IdentityStrategy, SnowflakeGenerator};
pub use naming::{ModelConfiguration, NameType};
pub use registry::ModelRegistry;
pub use shape::{FieldSpec, ModelShape};

/// A plain struct persisted as one table row.
///
/// ```ignore
/// #[derive(Default)]
/// struct Customer {
///     id: Option<i64>,
///     name: String,
/// }
///
/// impl Model for Customer {
///     fn shape() -> ModelShape<Self> {
///         ModelShape::new()
///             .field(FieldSpec::new("id", |c: &Customer| &c.id, |c: &mut Customer| &mut c.id))
///             .field(FieldSpec::new("name", |c: &Customer| &c.name, |c: &mut Customer| &mut c.name))
///     }
/// }
/// ```
pub trait Model: Any + Default + Send + Sync {
    fn shape() -> ModelShape<Self>;
}
