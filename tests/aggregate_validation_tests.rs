//! Aggregate declarations rejected when the descriptor is built.

use std::sync::Arc;

use rustcrud::{
    Aggregate, AggregateShape, ConditionType, CrudContext, DbError, FieldSpec, HolderKind, InMemoryRowStore, Model,
    ModelShape, Slot, ValueObject, ValueObjectShape,
};

#[derive(Debug, Default)]
struct Head {
    id: Option<i64>,
    label: Option<String>,
}

impl Model for Head {
    fn shape() -> ModelShape<Self> {
        ModelShape::new()
            .field(FieldSpec::new("id", |h: &Head| &h.id, |h: &mut Head| &mut h.id))
            .field(FieldSpec::new("label", |h: &Head| &h.label, |h: &mut Head| &mut h.label))
    }
}

#[derive(Debug, Default)]
struct Keyless {
    label: Option<String>,
}

impl Model for Keyless {
    fn shape() -> ModelShape<Self> {
        ModelShape::new().field(FieldSpec::new("label", |k: &Keyless| &k.label, |k: &mut Keyless| &mut k.label))
    }
}

#[derive(Debug, Default)]
struct Tail {
    id: Option<i64>,
    head_id: Option<i64>,
    owner_id: Option<i64>,
    rank: Option<i64>,
}

impl Model for Tail {
    fn shape() -> ModelShape<Self> {
        ModelShape::new()
            .field(FieldSpec::new("id", |t: &Tail| &t.id, |t: &mut Tail| &mut t.id))
            .field(FieldSpec::new("head_id", |t: &Tail| &t.head_id, |t: &mut Tail| &mut t.head_id))
            .field(FieldSpec::new("owner_id", |t: &Tail| &t.owner_id, |t: &mut Tail| &mut t.owner_id))
            .field(FieldSpec::new("rank", |t: &Tail| &t.rank, |t: &mut Tail| &mut t.rank))
    }
}

/// Tail rows keyed only by their owner, without an identity of their own.
#[derive(Debug, Default)]
struct Link {
    head_id: Option<i64>,
    note: Option<String>,
}

impl Model for Link {
    fn shape() -> ModelShape<Self> {
        ModelShape::new()
            .field(FieldSpec::new("head_id", |l: &Link| &l.head_id, |l: &mut Link| &mut l.head_id))
            .field(FieldSpec::new("note", |l: &Link| &l.note, |l: &mut Link| &mut l.note))
    }
}

fn build<A: Aggregate>() -> Result<(), DbError> {
    let ctx = CrudContext::with_store(Arc::new(InMemoryRowStore::new()));
    ctx.repository::<A>().map(|_| ())
}

fn assert_rejected<A: Aggregate>(fragment: &str) {
    match build::<A>() {
        Err(DbError::Configuration(message)) => {
            assert!(message.contains(fragment), "'{}' does not mention '{}'", message, fragment)
        }
        Err(other) => panic!("expected a configuration error, got {:?}", other),
        Ok(()) => panic!("declaration should have been rejected"),
    }
}

macro_rules! aggregate {
    ($name:ident { $($field:ident : $ty:ty,)* } => $shape:expr) => {
        #[derive(Default)]
        struct $name {
            $($field: $ty),*
        }

        impl Aggregate for $name {
            fn shape() -> AggregateShape<Self> {
                $shape
            }
        }
    };
}

aggregate!(NoRoot { head: Head, } => AggregateShape::new());

aggregate!(TwoRoots { head: Head, other: Head, } => AggregateShape::new()
    .root(|a: &TwoRoots| &a.head, |a: &mut TwoRoots| &mut a.head)
    .root(|a: &TwoRoots| &a.other, |a: &mut TwoRoots| &mut a.other));

aggregate!(KeylessRoot { root: Keyless, } => AggregateShape::new()
    .root(|a: &KeylessRoot| &a.root, |a: &mut KeylessRoot| &mut a.root));

aggregate!(MissingLinkField { head: Head, tails: Vec<Tail>, } => AggregateShape::new()
    .root(|a: &MissingLinkField| &a.head, |a: &mut MissingLinkField| &mut a.head)
    .slot(Slot::entity::<Tail, Vec<Tail>>("tails", |a: &mut MissingLinkField| &mut a.tails)
        .domain_key("parent")));

aggregate!(UnlinkedSlot { head: Head, tails: Vec<Tail>, } => AggregateShape::new()
    .root(|a: &UnlinkedSlot| &a.head, |a: &mut UnlinkedSlot| &mut a.head)
    .slot(Slot::entity::<Tail, Vec<Tail>>("tails", |a: &mut UnlinkedSlot| &mut a.tails)
        .domain_key("  ")));

aggregate!(UnknownConditionField { head: Head, tails: Vec<Tail>, } => AggregateShape::new()
    .root(|a: &UnknownConditionField| &a.head, |a: &mut UnknownConditionField| &mut a.head)
    .slot(Slot::entity::<Tail, Vec<Tail>>("tails", |a: &mut UnknownConditionField| &mut a.tails)
        .domain_key("head_id")
        .condition("colour", ConditionType::Equal, "red")));

aggregate!(UncastableCondition { head: Head, tails: Vec<Tail>, } => AggregateShape::new()
    .root(|a: &UncastableCondition| &a.head, |a: &mut UncastableCondition| &mut a.head)
    .slot(Slot::entity::<Tail, Vec<Tail>>("tails", |a: &mut UncastableCondition| &mut a.tails)
        .domain_key("head_id")
        .condition("rank", ConditionType::Equal, "first")));

aggregate!(DuplicateSlots { head: Head, tails: Vec<Tail>, more: Vec<Tail>, } => AggregateShape::new()
    .root(|a: &DuplicateSlots| &a.head, |a: &mut DuplicateSlots| &mut a.head)
    .slot(Slot::entity::<Tail, Vec<Tail>>("tails", |a: &mut DuplicateSlots| &mut a.tails).domain_key("head_id"))
    .slot(Slot::entity::<Tail, Vec<Tail>>("tails", |a: &mut DuplicateSlots| &mut a.more).domain_key("head_id")));

// ============================================================================
// VALUE OBJECT HOLDERS
// ============================================================================

/// Nested tails declared without a link to the owning tail.
#[derive(Debug, Default)]
struct LooseWrapper {
    tail: Option<Tail>,
    subs: Vec<Tail>,
}

impl ValueObject for LooseWrapper {
    fn shape() -> ValueObjectShape<Self> {
        ValueObjectShape::new()
            .entity(|w: &LooseWrapper| &w.tail, |w: &mut LooseWrapper| &mut w.tail)
            .slot(Slot::entity::<Tail, Vec<Tail>>("subs", |w: &mut LooseWrapper| &mut w.subs).domain_key("head_id"))
    }
}

aggregate!(NestedWithoutEntityKey { head: Head, wrappers: Vec<LooseWrapper>, } => AggregateShape::new()
    .root(|a: &NestedWithoutEntityKey| &a.head, |a: &mut NestedWithoutEntityKey| &mut a.head)
    .slot(Slot::value_object::<LooseWrapper, Vec<LooseWrapper>>("wrappers", |a: &mut NestedWithoutEntityKey| &mut a.wrappers)
        .domain_key("head_id")));

#[derive(Debug, Default)]
struct Bundle {
    tails: Vec<Tail>,
}

impl ValueObject for Bundle {
    fn shape() -> ValueObjectShape<Self> {
        ValueObjectShape::new()
            .slot(Slot::entity::<Tail, Vec<Tail>>("tails", |b: &mut Bundle| &mut b.tails).domain_key("head_id"))
    }
}

aggregate!(ConditionOnComposite { head: Head, bundle: Option<Bundle>, } => AggregateShape::new()
    .root(|a: &ConditionOnComposite| &a.head, |a: &mut ConditionOnComposite| &mut a.head)
    .slot(Slot::value_object::<Bundle, Option<Bundle>>("bundle", |a: &mut ConditionOnComposite| &mut a.bundle)
        .condition("rank", ConditionType::Equal, 1)));

aggregate!(KeyOnComposite { head: Head, bundle: Option<Bundle>, } => AggregateShape::new()
    .root(|a: &KeyOnComposite| &a.head, |a: &mut KeyOnComposite| &mut a.head)
    .slot(Slot::value_object::<Bundle, Option<Bundle>>("bundle", |a: &mut KeyOnComposite| &mut a.bundle)
        .domain_key("head_id")));

aggregate!(ValidComposite { head: Head, bundle: Option<Bundle>, } => AggregateShape::new()
    .root(|a: &ValidComposite| &a.head, |a: &mut ValidComposite| &mut a.head)
    .slot(Slot::value_object::<Bundle, Option<Bundle>>("bundle", |a: &mut ValidComposite| &mut a.bundle)));

#[derive(Debug, Default)]
struct DoubleEntity {
    first: Option<Tail>,
    second: Option<Tail>,
}

impl ValueObject for DoubleEntity {
    fn shape() -> ValueObjectShape<Self> {
        ValueObjectShape::new()
            .entity(|d: &DoubleEntity| &d.first, |d: &mut DoubleEntity| &mut d.first)
            .entity(|d: &DoubleEntity| &d.second, |d: &mut DoubleEntity| &mut d.second)
    }
}

aggregate!(TwoEntityHolder { head: Head, pairs: Vec<DoubleEntity>, } => AggregateShape::new()
    .root(|a: &TwoEntityHolder| &a.head, |a: &mut TwoEntityHolder| &mut a.head)
    .slot(Slot::value_object::<DoubleEntity, Vec<DoubleEntity>>("pairs", |a: &mut TwoEntityHolder| &mut a.pairs)
        .domain_key("head_id")));

/// Wraps a keyless entity yet declares nested slots under it.
#[derive(Debug, Default)]
struct LinkWrapper {
    link: Option<Link>,
    tails: Vec<Tail>,
}

impl ValueObject for LinkWrapper {
    fn shape() -> ValueObjectShape<Self> {
        ValueObjectShape::new()
            .entity(|w: &LinkWrapper| &w.link, |w: &mut LinkWrapper| &mut w.link)
            .slot(Slot::entity::<Tail, Vec<Tail>>("tails", |w: &mut LinkWrapper| &mut w.tails).entity_key("owner_id"))
    }
}

aggregate!(NestedUnderKeyless { head: Head, links: Vec<LinkWrapper>, } => AggregateShape::new()
    .root(|a: &NestedUnderKeyless| &a.head, |a: &mut NestedUnderKeyless| &mut a.head)
    .slot(Slot::value_object::<LinkWrapper, Vec<LinkWrapper>>("links", |a: &mut NestedUnderKeyless| &mut a.links)
        .domain_key("head_id")));

aggregate!(KeylessLeaf { head: Head, links: Vec<Link>, } => AggregateShape::new()
    .root(|a: &KeylessLeaf| &a.head, |a: &mut KeylessLeaf| &mut a.head)
    .slot(Slot::entity::<Link, Vec<Link>>("links", |a: &mut KeylessLeaf| &mut a.links).domain_key("head_id")));

/// Entity-less holder that nests itself.
#[derive(Debug, Default)]
struct Cluster {
    tails: Vec<Tail>,
    clusters: Vec<Cluster>,
}

impl ValueObject for Cluster {
    fn shape() -> ValueObjectShape<Self> {
        ValueObjectShape::new()
            .slot(Slot::entity::<Tail, Vec<Tail>>("tails", |c: &mut Cluster| &mut c.tails).domain_key("head_id"))
            .slot(Slot::value_object::<Cluster, Vec<Cluster>>("clusters", |c: &mut Cluster| &mut c.clusters))
    }
}

aggregate!(RecursiveComposite { head: Head, cluster: Option<Cluster>, } => AggregateShape::new()
    .root(|a: &RecursiveComposite| &a.head, |a: &mut RecursiveComposite| &mut a.head)
    .slot(Slot::value_object::<Cluster, Option<Cluster>>("cluster", |a: &mut RecursiveComposite| &mut a.cluster)));

#[test]
fn test_aggregate_needs_exactly_one_root() {
    assert_rejected::<NoRoot>("no root entity");
    assert_rejected::<TwoRoots>("more than one root entity");
}

#[test]
fn test_root_model_needs_an_identity() {
    assert_rejected::<KeylessRoot>("declares no identity field");
}

#[test]
fn test_link_fields_must_exist() {
    assert_rejected::<MissingLinkField>("link field 'parent' not found");
}

#[test]
fn test_entity_slot_needs_a_link_field() {
    assert_rejected::<UnlinkedSlot>("needs a domain key or an entity key");
}

#[test]
fn test_condition_fields_must_exist() {
    assert_rejected::<UnknownConditionField>("condition field 'colour' not found");
}

#[test]
fn test_condition_values_must_cast_to_the_field_type() {
    assert!(build::<UncastableCondition>().is_err());
}

#[test]
fn test_slot_names_are_unique() {
    assert_rejected::<DuplicateSlots>("declares slot 'tails' twice");
}

#[test]
fn test_nested_slots_need_an_entity_key() {
    assert_rejected::<NestedWithoutEntityKey>("nested slot needs an entity key");
}

#[test]
fn test_composites_carry_no_conditions_or_links() {
    assert_rejected::<ConditionOnComposite>("conditions need a slot entity");
    assert_rejected::<KeyOnComposite>("link fields need a slot entity");
}

#[test]
fn test_holder_wraps_at_most_one_entity() {
    assert_rejected::<TwoEntityHolder>("more than one entity field");
}

#[test]
fn test_entity_with_nested_slots_needs_an_identity() {
    assert_rejected::<NestedUnderKeyless>("has nested slots");
}

#[test]
fn test_valid_declarations_build() {
    build::<ValidComposite>().unwrap();
    build::<KeylessLeaf>().unwrap();

    let ctx = CrudContext::with_store(Arc::new(InMemoryRowStore::new()));
    let descriptor = ctx.aggregates().resolve::<ValidComposite>().unwrap();
    let bundle = descriptor.node(descriptor.slot("bundle").unwrap());
    assert_eq!(bundle.kind(), HolderKind::Composite);
    assert!(bundle.model().is_none());
    assert!(!bundle.is_collection());
    assert_eq!(descriptor.slot_count(), 2);
}

#[test]
fn test_self_referential_composite_is_rejected() {
    assert_rejected::<RecursiveComposite>("self-referential slot needs an entity");
}
