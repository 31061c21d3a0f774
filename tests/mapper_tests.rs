//! Single-table mapper operations against the in-memory store.

use std::sync::Arc;

use rustcrud::{
    ConditionSet, CrudConfig, CrudContext, DataType, Datasources, DbError, DynamicModel, DynamicRecord, FieldSpec,
    IdentityStrategy, InMemoryRowStore, Model, ModelConfiguration, ModelMapper, ModelShape, QuerySpec, SortSpec,
    Value,
};

#[derive(Debug, Default, Clone, PartialEq)]
struct Customer {
    id: Option<i64>,
    name: Option<String>,
    city: Option<String>,
    score: Option<i64>,
}

impl Customer {
    fn new(name: &str, city: &str, score: i64) -> Self {
        Self { id: None, name: Some(name.into()), city: Some(city.into()), score: Some(score) }
    }
}

impl Model for Customer {
    fn shape() -> ModelShape<Self> {
        ModelShape::new()
            .field(
                FieldSpec::new("id", |c: &Customer| &c.id, |c: &mut Customer| &mut c.id)
                    .identity(IdentityStrategy::StoreAssigned),
            )
            .field(FieldSpec::new("name", |c: &Customer| &c.name, |c: &mut Customer| &mut c.name))
            .field(FieldSpec::new("city", |c: &Customer| &c.city, |c: &mut Customer| &mut c.city))
            .field(FieldSpec::new("score", |c: &Customer| &c.score, |c: &mut Customer| &mut c.score))
    }
}

#[derive(Debug, Default, Clone)]
struct ArchivedInvoice {
    id: Option<String>,
    total: Option<i64>,
}

impl Model for ArchivedInvoice {
    fn shape() -> ModelShape<Self> {
        ModelShape::new()
            .config(ModelConfiguration::default().datasource("archive"))
            .field(
                FieldSpec::new("id", |i: &ArchivedInvoice| &i.id, |i: &mut ArchivedInvoice| &mut i.id)
                    .identity(IdentityStrategy::Uuid32),
            )
            .field(FieldSpec::new("total", |i: &ArchivedInvoice| &i.total, |i: &mut ArchivedInvoice| &mut i.total))
    }
}

fn setup() -> (Arc<InMemoryRowStore>, ModelMapper<Customer>) {
    let store = Arc::new(InMemoryRowStore::new());
    let ctx = CrudContext::with_store(store.clone());
    let customers = ctx.mapper::<Customer>().unwrap();
    (store, customers)
}

fn seed(customers: &ModelMapper<Customer>) -> Vec<Customer> {
    let mut rows = vec![
        Customer::new("ann", "oslo", 7),
        Customer::new("bob", "rome", 3),
        Customer::new("cid", "oslo", 9),
    ];
    assert!(customers.batch_insert(&mut rows).unwrap());
    rows
}

#[test]
fn test_insert_writes_back_store_assigned_keys() {
    let (_store, customers) = setup();
    let mut first = Customer::new("ann", "oslo", 7);
    let mut second = Customer::new("bob", "rome", 3);

    assert!(customers.insert(&mut first).unwrap());
    assert!(customers.insert(&mut second).unwrap());
    assert_eq!(first.id, Some(1));
    assert_eq!(second.id, Some(2));

    let found = customers.find_by_id(2).unwrap().unwrap();
    assert_eq!(found, second);
}

#[test]
fn test_batch_insert_of_nothing_reports_false() {
    let (_store, customers) = setup();
    assert!(!customers.batch_insert(&mut []).unwrap());
}

#[test]
fn test_batch_insert_and_list_by_ids() {
    let (store, customers) = setup();
    let rows = seed(&customers);
    let ids: Vec<i64> = rows.iter().map(|c| c.id.unwrap()).collect();
    assert_eq!(ids, vec![1, 2, 3]);

    let listed = customers.list_by_ids([1i64, 3]).unwrap();
    let names: Vec<_> = listed.iter().map(|c| c.name.clone().unwrap()).collect();
    assert_eq!(names, vec!["ann", "cid"]);
    assert_eq!(store.table_stats("customer").unwrap().rows_inserted, 3);
}

#[test]
fn test_update_by_id_skips_nulls_unless_asked() {
    let (_store, customers) = setup();
    let rows = seed(&customers);

    let mut patch = Customer { id: rows[0].id, city: Some("bergen".into()), ..Customer::default() };
    assert!(customers.update_by_id(&patch).unwrap());
    let updated = customers.find_by_id(1).unwrap().unwrap();
    assert_eq!(updated.name.as_deref(), Some("ann"));
    assert_eq!(updated.city.as_deref(), Some("bergen"));

    patch.city = None;
    assert!(customers.update_by_id_with_null(&patch).unwrap());
    let cleared = customers.find_by_id(1).unwrap().unwrap();
    assert_eq!(cleared.name, None);
    assert_eq!(cleared.city, None);
}

#[test]
fn test_update_by_id_without_identity_fails() {
    let (_store, customers) = setup();
    let err = customers.update_by_id(&Customer::new("x", "y", 1)).unwrap_err();
    assert!(matches!(err, DbError::PersistFailed(_)));
}

#[test]
fn test_update_missing_row_reports_false() {
    let (_store, customers) = setup();
    let ghost = Customer { id: Some(42), name: Some("ghost".into()), ..Customer::default() };
    assert!(!customers.update_by_id(&ghost).unwrap());
}

#[test]
fn test_update_by_conditions() {
    let (_store, customers) = setup();
    seed(&customers);

    let patch = Customer { city: Some("paris".into()), ..Customer::default() };
    let updated = customers
        .update_by_conditions(&patch, &ConditionSet::new().greater_than("score", 5))
        .unwrap();
    assert_eq!(updated, 2);

    let in_paris = customers
        .count_by_condition(None, &[&ConditionSet::new().equal("city", "paris")])
        .unwrap();
    assert_eq!(in_paris, 2);
}

#[test]
fn test_unconditional_delete_and_update_are_refused() {
    let (_store, customers) = setup();
    seed(&customers);

    let err = customers.delete_by_conditions(&ConditionSet::new()).unwrap_err();
    assert!(matches!(err, DbError::UnsupportedOperation(_)));

    // a condition whose only operand is null filters nothing either
    let mut only_null = ConditionSet::new();
    only_null.push("city", rustcrud::ConditionType::Equal, vec![Value::Null]);
    let err = customers.delete_by_conditions(&only_null).unwrap_err();
    assert!(matches!(err, DbError::UnsupportedOperation(_)));

    let patch = Customer { city: Some("nowhere".into()), ..Customer::default() };
    let err = customers.update_by_conditions(&patch, &ConditionSet::new()).unwrap_err();
    assert!(matches!(err, DbError::UnsupportedOperation(_)));
    assert_eq!(customers.count_by_condition(None, &[]).unwrap(), 3);
}

#[test]
fn test_delete_by_conditions_and_ids() {
    let (_store, customers) = setup();
    seed(&customers);

    assert_eq!(customers.delete_by_conditions(&ConditionSet::new().equal("city", "oslo")).unwrap(), 2);
    assert!(!customers.delete_by_id(Value::Null).unwrap());
    assert!(!customers.delete_by_ids(vec![Value::Null]).unwrap());
    assert!(customers.delete_by_ids([2i64, 99]).unwrap());
    assert_eq!(customers.count_by_condition(None, &[]).unwrap(), 0);
}

#[test]
fn test_static_template_matches_every_field() {
    let (_store, customers) = setup();
    let rows = seed(&customers);

    let exact = rows[1].clone();
    let found = customers.list_by_condition(Some(&exact), &[]).unwrap();
    assert_eq!(found, vec![exact]);

    // the unset identity binds as `id IS NULL`
    let partial = Customer { name: Some("bob".into()), ..Customer::default() };
    assert!(customers.list_by_condition(Some(&partial), &[]).unwrap().is_empty());
}

#[test]
fn test_template_with_conditions_binds_only_present_fields() {
    let (_store, customers) = setup();
    seed(&customers);

    let template = Customer { city: Some("oslo".into()), ..Customer::default() };
    let spec = QuerySpec::filter(ConditionSet::new().less_than("score", 8));
    let found = customers.find_by_condition(Some(&template), &[&spec]).unwrap().unwrap();
    assert_eq!(found.name.as_deref(), Some("ann"));
}

#[test]
fn test_list_sorts_and_projects() {
    let (_store, customers) = setup();
    seed(&customers);

    let spec = QuerySpec::new().select(["name"]).sort(SortSpec::new().desc("score"));
    let listed = customers.list_by_condition(None, &[&spec]).unwrap();
    let names: Vec<_> = listed.iter().map(|c| c.name.clone().unwrap()).collect();
    assert_eq!(names, vec!["cid", "ann", "bob"]);
    assert!(listed.iter().all(|c| c.id.is_none() && c.score.is_none()));
}

#[test]
fn test_page_by_condition_windows_rows() {
    let (_store, customers) = setup();
    let mut rows: Vec<Customer> = (0..25).map(|i| Customer::new(&format!("c{:02}", i), "oslo", i)).collect();
    customers.batch_insert(&mut rows).unwrap();

    let spec = QuerySpec::filter(ConditionSet::new().equal("city", "oslo")).sort(SortSpec::new().asc("score"));
    let page = customers.page_by_condition(None, 2, 10, &[&spec]).unwrap();
    assert_eq!((page.total, page.pages, page.offset), (25, 3, 10));
    let scores: Vec<i64> = page.items.iter().map(|c| c.score.unwrap()).collect();
    assert_eq!(scores, (10..20).collect::<Vec<i64>>());

    let last = customers.page_by_condition(None, 3, 10, &[&spec]).unwrap();
    assert_eq!(last.items.len(), 5);
}

#[test]
fn test_empty_page_skips_the_row_query() {
    let (store, customers) = setup();
    seed(&customers);
    let before = store.table_stats("customer").unwrap();

    let spec = QuerySpec::filter(ConditionSet::new().equal("city", "lima"));
    let page = customers.page_by_condition(None, 2, 10, &[&spec]).unwrap();
    assert!(page.items.is_empty());
    assert_eq!((page.total, page.pages, page.offset), (0, 0, 10));

    let after = store.table_stats("customer").unwrap();
    assert_eq!(after.count_queries, before.count_queries + 1);
    assert_eq!(after.row_queries, before.row_queries);
}

#[test]
fn test_count_and_exist() {
    let (_store, customers) = setup();
    seed(&customers);

    let oslo = ConditionSet::new().equal("city", "oslo");
    let high = ConditionSet::new().greater_equal("score", 9);
    assert_eq!(customers.count_by_condition(None, &[&oslo]).unwrap(), 2);
    assert_eq!(customers.count_by_condition(None, &[&oslo, &high]).unwrap(), 1);
    assert!(customers.exist_by_condition(None, &[&oslo, &oslo]).unwrap());
    assert!(!customers.exist_by_condition(None, &[&ConditionSet::new().like("name", "zz")]).unwrap());
}

#[test]
fn test_models_route_to_their_datasource() {
    let main = Arc::new(InMemoryRowStore::new());
    let archive = Arc::new(InMemoryRowStore::new());

    let only_main = CrudContext::with_store(main.clone());
    assert!(matches!(only_main.mapper::<ArchivedInvoice>(), Err(DbError::Configuration(_))));

    let datasources = Datasources::single(main.clone()).with("archive", archive.clone());
    let ctx = CrudContext::new(CrudConfig::default(), datasources);
    let invoices = ctx.mapper::<ArchivedInvoice>().unwrap();
    let mut invoice = ArchivedInvoice { id: None, total: Some(120) };
    invoices.insert(&mut invoice).unwrap();

    assert_eq!(invoice.id.as_ref().map(String::len), Some(32));
    assert_eq!(archive.rows("archived_invoice").unwrap().len(), 1);
    assert!(main.list_tables().unwrap().is_empty());
}

#[test]
fn test_dynamic_model_crud() {
    let store = Arc::new(InMemoryRowStore::new());
    let ctx = CrudContext::with_store(store.clone());

    let mut model = DynamicModel::new("sensor");
    model.set_id("id", DataType::Integer, IdentityStrategy::StoreAssigned).unwrap();
    model.add_field("label", DataType::Text).unwrap();
    model.add_field("reading", DataType::Float).unwrap();
    let sensors = ctx.register_dynamic(model).unwrap();

    let mut record = DynamicRecord::new().with("label", "boiler").with("reading", 71.5);
    assert!(sensors.insert(&mut record).unwrap());
    assert_eq!(record.get("id"), Some(&Value::Integer(1)));

    let same = ctx.dynamic_mapper("sensor").unwrap();
    let found = same.find_by_id(1).unwrap().unwrap();
    assert_eq!(found.get("label"), Some(&Value::from("boiler")));
    assert_eq!(found.get("reading"), Some(&Value::Float(71.5)));

    let hot = ConditionSet::new().greater_than("reading", 70.0);
    assert_eq!(same.count_by_condition(None, &[&hot]).unwrap(), 1);
    assert!(same.delete_by_id(1).unwrap());
    assert!(store.rows("sensor").unwrap().is_empty());
}

#[test]
fn test_dynamic_mapper_rejects_typed_models() {
    let ctx = CrudContext::with_store(Arc::new(InMemoryRowStore::new()));
    ctx.mapper::<Customer>().unwrap();

    assert!(matches!(ctx.dynamic_mapper("Customer"), Err(DbError::Configuration(_))));
    assert!(matches!(ctx.dynamic_mapper("unknown"), Err(DbError::Configuration(_))));
}
