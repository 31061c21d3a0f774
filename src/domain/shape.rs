use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

use crate::core::{DbError, Result, Value};
use crate::domain::{Aggregate, ValueObject};
use crate::model::shape::short_type_name;
use crate::model::{Model, ModelDescriptor, ModelRegistry};
use crate::query::ConditionType;

pub(crate) type ModelResolver = fn(&ModelRegistry) -> Result<Arc<ModelDescriptor>>;
pub(crate) type HolderFactory = fn() -> Box<dyn Any>;

fn resolve_model<E: Model>(registry: &ModelRegistry) -> Result<Arc<ModelDescriptor>> {
    registry.require::<E>()
}

fn new_holder<H: ValueObject>() -> Box<dyn Any> {
    Box::new(H::default())
}

fn value_object_decl<H: ValueObject>() -> ValueObjectDecl {
    H::shape().decl
}

fn wrong_owner<T>() -> DbError {
    DbError::type_mismatch(format!("expected an instance of {}", std::any::type_name::<T>()))
}

// ============================================================================
// HOLDER CARDINALITY
// ============================================================================

/// Container a slot keeps its holders in: `Option<H>` for a singular slot,
/// `Vec<H>` for a collection.
pub trait SlotValue<H>: Send + Sync + 'static {
    const COLLECTION: bool;

    fn holders_mut(&mut self) -> Vec<&mut H>;

    fn from_holders(holders: Vec<H>) -> Self;
}

impl<H: Send + Sync + 'static> SlotValue<H> for Option<H> {
    const COLLECTION: bool = false;

    fn holders_mut(&mut self) -> Vec<&mut H> {
        self.iter_mut().collect()
    }

    fn from_holders(holders: Vec<H>) -> Self {
        holders.into_iter().next()
    }
}

impl<H: Send + Sync + 'static> SlotValue<H> for Vec<H> {
    const COLLECTION: bool = true;

    fn holders_mut(&mut self) -> Vec<&mut H> {
        self.iter_mut().collect()
    }

    fn from_holders(holders: Vec<H>) -> Self {
        holders
    }
}

// ============================================================================
// ERASED ACCESS
// ============================================================================

/// Reaches the entity stored in an owner (the aggregate root or a wrapper's
/// entity field).
pub(crate) trait EntityAccess: Send + Sync {
    fn get<'a>(&self, owner: &'a dyn Any) -> Result<Option<&'a dyn Any>>;

    fn get_mut<'a>(&self, owner: &'a mut dyn Any) -> Result<Option<&'a mut dyn Any>>;

    fn put(&self, owner: &mut dyn Any, entity: Box<dyn Any>) -> Result<()>;
}

struct RootField<A, R> {
    get: fn(&A) -> &R,
    get_mut: fn(&mut A) -> &mut R,
}

impl<A: Any, R: Any> EntityAccess for RootField<A, R> {
    fn get<'a>(&self, owner: &'a dyn Any) -> Result<Option<&'a dyn Any>> {
        let owner = owner.downcast_ref::<A>().ok_or_else(wrong_owner::<A>)?;
        Ok(Some((self.get)(owner) as &dyn Any))
    }

    fn get_mut<'a>(&self, owner: &'a mut dyn Any) -> Result<Option<&'a mut dyn Any>> {
        let owner = owner.downcast_mut::<A>().ok_or_else(wrong_owner::<A>)?;
        Ok(Some((self.get_mut)(owner) as &mut dyn Any))
    }

    fn put(&self, owner: &mut dyn Any, entity: Box<dyn Any>) -> Result<()> {
        let owner = owner.downcast_mut::<A>().ok_or_else(wrong_owner::<A>)?;
        let entity = entity.downcast::<R>().map_err(|_| wrong_owner::<R>())?;
        *(self.get_mut)(owner) = *entity;
        Ok(())
    }
}

struct OptionalField<H, E> {
    get: fn(&H) -> &Option<E>,
    get_mut: fn(&mut H) -> &mut Option<E>,
}

impl<H: Any, E: Any> EntityAccess for OptionalField<H, E> {
    fn get<'a>(&self, owner: &'a dyn Any) -> Result<Option<&'a dyn Any>> {
        let owner = owner.downcast_ref::<H>().ok_or_else(wrong_owner::<H>)?;
        Ok((self.get)(owner).as_ref().map(|entity| entity as &dyn Any))
    }

    fn get_mut<'a>(&self, owner: &'a mut dyn Any) -> Result<Option<&'a mut dyn Any>> {
        let owner = owner.downcast_mut::<H>().ok_or_else(wrong_owner::<H>)?;
        Ok((self.get_mut)(owner).as_mut().map(|entity| entity as &mut dyn Any))
    }

    fn put(&self, owner: &mut dyn Any, entity: Box<dyn Any>) -> Result<()> {
        let owner = owner.downcast_mut::<H>().ok_or_else(wrong_owner::<H>)?;
        let entity = entity.downcast::<E>().map_err(|_| wrong_owner::<E>())?;
        *(self.get_mut)(owner) = Some(*entity);
        Ok(())
    }
}

/// Reaches the holders a slot keeps in its parent.
pub(crate) trait SlotAccess: Send + Sync {
    fn holders_mut<'a>(&self, parent: &'a mut dyn Any) -> Result<Vec<&'a mut dyn Any>>;

    fn assign(&self, parent: &mut dyn Any, holders: Vec<Box<dyn Any>>) -> Result<()>;
}

struct SlotField<P, H, C> {
    get_mut: fn(&mut P) -> &mut C,
    _holder: PhantomData<fn() -> H>,
}

impl<P: Any, H: Any, C: SlotValue<H>> SlotAccess for SlotField<P, H, C> {
    fn holders_mut<'a>(&self, parent: &'a mut dyn Any) -> Result<Vec<&'a mut dyn Any>> {
        let parent = parent.downcast_mut::<P>().ok_or_else(wrong_owner::<P>)?;
        Ok((self.get_mut)(parent)
            .holders_mut()
            .into_iter()
            .map(|holder| holder as &mut dyn Any)
            .collect())
    }

    fn assign(&self, parent: &mut dyn Any, holders: Vec<Box<dyn Any>>) -> Result<()> {
        let parent = parent.downcast_mut::<P>().ok_or_else(wrong_owner::<P>)?;
        let holders = holders
            .into_iter()
            .map(|holder| holder.downcast::<H>().map(|boxed| *boxed).map_err(|_| wrong_owner::<H>()))
            .collect::<Result<Vec<H>>>()?;
        *(self.get_mut)(parent) = C::from_holders(holders);
        Ok(())
    }
}

// ============================================================================
// DECLARATIONS
// ============================================================================

pub(crate) struct EntityDecl {
    pub(crate) access: Arc<dyn EntityAccess>,
    pub(crate) model: ModelResolver,
}

pub(crate) enum SlotContent {
    /// The holder is the entity model itself.
    Entity { model: ModelResolver },
    /// A value-object holder; its shape is read when the descriptor is built.
    ValueObject { shape: fn() -> ValueObjectDecl, factory: HolderFactory },
}

pub(crate) struct SlotDecl {
    pub(crate) name: String,
    pub(crate) collection: bool,
    pub(crate) holder_type: TypeId,
    pub(crate) holder_name: &'static str,
    pub(crate) content: SlotContent,
    pub(crate) domain_key: Option<String>,
    pub(crate) entity_key: Option<String>,
    pub(crate) conditions: Vec<(String, ConditionType, Value)>,
    pub(crate) access: Arc<dyn SlotAccess>,
}

pub(crate) struct ValueObjectDecl {
    pub(crate) entities: Vec<EntityDecl>,
    pub(crate) slots: Vec<SlotDecl>,
}

/// One value-object slot of an aggregate or of a value object.
///
/// ```ignore
/// Slot::entity("lines", |o: &mut Order| &mut o.lines)
///     .domain_key("order_id")
///     .condition("kind", ConditionType::Equal, "line")
/// ```
pub struct Slot<P> {
    decl: SlotDecl,
    _parent: PhantomData<fn(&P)>,
}

impl<P: Any> Slot<P> {
    /// A slot whose holders are rows of the entity model `E`.
    pub fn entity<E: Model, C: SlotValue<E>>(
        name: impl Into<String>,
        get_mut: fn(&mut P) -> &mut C,
    ) -> Self {
        Self::with_content::<E, C>(name.into(), get_mut, SlotContent::Entity { model: resolve_model::<E> })
    }

    /// A slot whose holders are value objects of type `H`, which may wrap an
    /// entity and declare slots of their own.
    pub fn value_object<H: ValueObject, C: SlotValue<H>>(
        name: impl Into<String>,
        get_mut: fn(&mut P) -> &mut C,
    ) -> Self {
        let content = SlotContent::ValueObject { shape: value_object_decl::<H>, factory: new_holder::<H> };
        Self::with_content::<H, C>(name.into(), get_mut, content)
    }

    fn with_content<H: Any, C: SlotValue<H>>(
        name: String,
        get_mut: fn(&mut P) -> &mut C,
        content: SlotContent,
    ) -> Self {
        Self {
            decl: SlotDecl {
                name,
                collection: C::COLLECTION,
                holder_type: TypeId::of::<H>(),
                holder_name: short_type_name::<H>(),
                content,
                domain_key: None,
                entity_key: None,
                conditions: Vec::new(),
                access: Arc::new(SlotField::<P, H, C> { get_mut, _holder: PhantomData }),
            },
            _parent: PhantomData,
        }
    }

    /// Field of the slot entity that holds the aggregate root's identity.
    pub fn domain_key(mut self, field: impl Into<String>) -> Self {
        self.decl.domain_key = non_blank(field.into());
        self
    }

    /// Field of the slot entity that holds the owning entity's identity.
    pub fn entity_key(mut self, field: impl Into<String>) -> Self {
        self.decl.entity_key = non_blank(field.into());
        self
    }

    /// Fixed condition applied to every query of the slot. Equality values
    /// are also stamped onto saved entities.
    pub fn condition(mut self, field: impl Into<String>, operator: ConditionType, value: impl Into<Value>) -> Self {
        self.decl.conditions.push((field.into(), operator, value.into()));
        self
    }
}

fn non_blank(name: String) -> Option<String> {
    if name.trim().is_empty() { None } else { Some(name) }
}

/// Root entity and slots of an aggregate type.
pub struct AggregateShape<A> {
    pub(crate) name: String,
    pub(crate) roots: Vec<EntityDecl>,
    pub(crate) slots: Vec<SlotDecl>,
    _aggregate: PhantomData<fn(&A)>,
}

impl<A: Aggregate> AggregateShape<A> {
    pub fn new() -> Self {
        Self {
            name: short_type_name::<A>().to_string(),
            roots: Vec::new(),
            slots: Vec::new(),
            _aggregate: PhantomData,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// The root entity. Declaring more than one fails when the aggregate is
    /// registered.
    pub fn root<R: Model>(mut self, get: fn(&A) -> &R, get_mut: fn(&mut A) -> &mut R) -> Self {
        self.roots.push(EntityDecl {
            access: Arc::new(RootField { get, get_mut }),
            model: resolve_model::<R>,
        });
        self
    }

    pub fn slot(mut self, slot: Slot<A>) -> Self {
        self.slots.push(slot.decl);
        self
    }
}

impl<A: Aggregate> Default for AggregateShape<A> {
    fn default() -> Self {
        Self::new()
    }
}

/// Entity and nested slots of a value-object holder type.
///
/// A holder without an entity is a pure composite of its slots.
pub struct ValueObjectShape<H> {
    decl: ValueObjectDecl,
    _holder: PhantomData<fn(&H)>,
}

impl<H: ValueObject> ValueObjectShape<H> {
    pub fn new() -> Self {
        Self {
            decl: ValueObjectDecl { entities: Vec::new(), slots: Vec::new() },
            _holder: PhantomData,
        }
    }

    pub fn entity<E: Model>(mut self, get: fn(&H) -> &Option<E>, get_mut: fn(&mut H) -> &mut Option<E>) -> Self {
        self.decl.entities.push(EntityDecl {
            access: Arc::new(OptionalField { get, get_mut }),
            model: resolve_model::<E>,
        });
        self
    }

    pub fn slot(mut self, slot: Slot<H>) -> Self {
        self.decl.slots.push(slot.decl);
        self
    }
}

impl<H: ValueObject> Default for ValueObjectShape<H> {
    fn default() -> Self {
        Self::new()
    }
}
