//! End-to-end tests over a small blog schema stored in sled.

use std::collections::BTreeSet;
use std::sync::Arc;

use ormgen_core::catalog::{
    Catalog, EntityDef, FieldDef, FieldType, OrderBy, RelationDef, ScalarType, SchemaBundle,
};
use ormgen_core::display::CellValue;
use ormgen_core::error::Error;
use ormgen_core::optimizer::QueryOptimizer;
use ormgen_core::query::Restriction;
use ormgen_core::record::Record;
use ormgen_core::resolver::{FieldResolver, FieldSpec};
use ormgen_core::router::{ActionMask, ActionOverrides};
use ormgen_core::storage::{Backend, SledBackend, StorageConfig};
use ormgen_core::value::Value;
use ormgen_core::views::{
    apply_orm_filters, CreateView, DeleteView, DetailView, EditOutcome, ListView, QueryParams,
    Site, UpdateView,
};
use ormgen_core::virtual_join::{JoinConfig, M2mConfig, RecordSource, VirtualRelation};
use ormgen_core::ScaffoldConfig;

fn int(name: &str) -> FieldDef {
    FieldDef::new(name, FieldType::Scalar(ScalarType::Int64))
}

fn text(name: &str) -> FieldDef {
    FieldDef::new(name, FieldType::Scalar(ScalarType::String))
}

fn blog_schema() -> SchemaBundle {
    SchemaBundle::new()
        .with_entity(
            EntityDef::new("Author", "id")
                .with_fields([int("id"), text("name")])
                .with_display_field("name")
                .with_default_order([OrderBy::asc("name")]),
        )
        .with_entity(
            EntityDef::new("Post", "id")
                .with_fields([
                    int("id"),
                    text("title"),
                    int("author_id"),
                    FieldDef::optional_scalar("views", ScalarType::Int64),
                ])
                .with_display_field("title"),
        )
        .with_entity(EntityDef::new("Comment", "id").with_fields([int("id"), int("post_id"), text("body")]))
        .with_entity(
            EntityDef::new("Tag", "id")
                .with_fields([int("id"), text("name")])
                .with_display_field("name"),
        )
        .with_entity(EntityDef::new("PostTag", "id").with_fields([int("id"), int("post_id"), int("tag_id")]))
        .with_entity(
            EntityDef::new("Customer", "id")
                .with_fields([int("id"), int("number"), text("name")])
                .with_display_field("name"),
        )
        .with_entity(EntityDef::new("Order", "id").with_fields([int("id"), int("customer_no")]))
        .with_relation(RelationDef::foreign_key("author", "Post", "author_id", "Author", "id"))
        .with_relation(RelationDef::foreign_key("post", "Comment", "post_id", "Post", "id"))
        .with_relation(RelationDef::many_to_many("tags", "Post", "Tag", "PostTag", "post_id", "tag_id"))
}

const CONFIG: &str = r#"{
    "models": {
        "Post": {
            "list_fields": ["title", ["author__name", "Writer"], "author", "comment", "views"],
            "filter_fields": ["title", "author__name", "author"],
            "filter_orm": true
        }
    }
}"#;

fn row(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn insert(backend: &SledBackend, catalog: &Catalog, entity: &str, rows: Vec<Vec<(String, Value)>>) {
    let def = catalog.entity(entity).unwrap();
    for values in rows {
        backend.insert(def, values).unwrap();
    }
}

fn blog() -> Site {
    let catalog = Catalog::from_bundle(blog_schema()).unwrap();
    let backend = SledBackend::open(StorageConfig::temporary()).unwrap();
    let v = Value::Int64;

    insert(&backend, &catalog, "Author", vec![
        row(&[("id", v(1)), ("name", "Ada".into())]),
        row(&[("id", v(2)), ("name", "Grace".into())]),
    ]);
    insert(&backend, &catalog, "Post", vec![
        row(&[("id", v(1)), ("title", "Rust ownership".into()), ("author_id", v(1)), ("views", v(0))]),
        row(&[("id", v(2)), ("title", "Borrowing".into()), ("author_id", v(1)), ("views", v(10))]),
        row(&[("id", v(3)), ("title", "Compilers".into()), ("author_id", v(2)), ("views", Value::Null)]),
    ]);
    insert(&backend, &catalog, "Comment", vec![
        row(&[("id", v(1)), ("post_id", v(1)), ("body", "nice".into())]),
        row(&[("id", v(2)), ("post_id", v(1)), ("body", "great".into())]),
        row(&[("id", v(3)), ("post_id", v(3)), ("body", "ok".into())]),
    ]);
    insert(&backend, &catalog, "Tag", vec![
        row(&[("id", v(1)), ("name", "rust".into())]),
        row(&[("id", v(2)), ("name", "systems".into())]),
    ]);
    insert(&backend, &catalog, "PostTag", vec![
        row(&[("id", v(1)), ("post_id", v(1)), ("tag_id", v(1))]),
        row(&[("id", v(2)), ("post_id", v(1)), ("tag_id", v(2))]),
        row(&[("id", v(3)), ("post_id", v(2)), ("tag_id", v(1))]),
    ]);
    insert(&backend, &catalog, "Customer", vec![
        row(&[("id", v(1)), ("number", v(2)), ("name", "Acme".into())]),
        row(&[("id", v(2)), ("number", v(3)), ("name", "Globex".into())]),
        row(&[("id", v(3)), ("number", v(4)), ("name", "Initech".into())]),
    ]);
    insert(&backend, &catalog, "Order", vec![
        row(&[("id", v(1)), ("customer_no", v(1))]),
        row(&[("id", v(2)), ("customer_no", v(2))]),
        row(&[("id", v(3)), ("customer_no", v(3))]),
    ]);

    let config = ScaffoldConfig::from_json(CONFIG).unwrap();
    Site::new(Arc::new(catalog), Arc::new(backend), Arc::new(config))
}

fn params(pairs: &[(&str, &str)]) -> QueryParams {
    pairs.iter().copied().collect()
}

fn post_list(site: &Site) -> ListView {
    ListView::new("Post", &site.config.model("Post"), site.config.listview_for("Post"))
}

fn names(records: &[Arc<Record>]) -> Vec<String> {
    records
        .iter()
        .map(|r| r.get("name").map(Value::to_string).unwrap_or_default())
        .collect()
}

#[test]
fn test_resolver_drops_paths_through_to_many() {
    let site = blog();
    let resolver = FieldResolver::new(&site.catalog, "Post");
    assert!(resolver.resolve(&FieldSpec::from("comment__body")).is_none());
    assert!(resolver.resolve(&FieldSpec::from("tags__name")).is_none());
    assert!(resolver.resolve(&FieldSpec::from("tags")).is_some());
}

#[test]
fn test_restriction_union_law() {
    let site = blog();
    let qs = site.queryset("Post").unwrap().only(&["title", "views"]);
    let fields = FieldResolver::new(&site.catalog, "Post")
        .resolve_all(&[FieldSpec::from("views"), FieldSpec::from("author_id"), FieldSpec::from("pk")]);
    let optimizer = QueryOptimizer::new(&site.catalog);

    let once = optimizer.optimize(&qs, &fields).unwrap();
    let twice = optimizer.optimize(&once, &fields).unwrap();

    let expected: BTreeSet<String> = ["title", "views", "author_id", "id"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(once.restriction(), &Restriction::Only(expected));
    assert_eq!(once.restriction(), twice.restriction());
}

#[test]
fn test_virtual_join_to_one() {
    let site = blog();
    let joiner = VirtualRelation::new(&site.catalog, site.backend(), true);
    let orders = site.queryset("Order").unwrap();
    let customers = site.queryset("Customer").unwrap();

    let config = JoinConfig::new().attr("customer").rel_field("customer_no").to_field("number");
    let joined = joiner.join(orders, customers, &config).unwrap();

    assert_eq!(joined.len(), 3);
    let customer = |record: &Record| {
        record
            .attribute("customer")
            .and_then(|r| r.as_one())
            .and_then(|c| c.get("number").cloned())
    };
    assert!(joined[0].attribute("customer").is_some());
    assert_eq!(customer(&joined[0]), None);
    assert_eq!(customer(&joined[1]), Some(Value::Int64(2)));
    assert_eq!(customer(&joined[2]), Some(Value::Int64(3)));
}

#[test]
fn test_virtual_join_to_many_keeps_fetch_order() {
    let site = blog();
    let joiner = VirtualRelation::new(&site.catalog, site.backend(), false);
    let orders: Vec<Record> = [(10, 2), (11, 2), (12, 3)]
        .into_iter()
        .map(|(id, no)| {
            Record::new(
                "Order",
                "id",
                row(&[("id", Value::Int64(id)), ("customer_no", Value::Int64(no))]),
            )
        })
        .collect();

    let config = JoinConfig::new()
        .attr("orders")
        .rel_field("customer_no")
        .to_field("number")
        .reverse();
    let customers = joiner
        .join(site.queryset("Customer").unwrap(), orders, &config)
        .unwrap();

    let ids = |record: &Record| -> Vec<Value> {
        record
            .attribute("orders")
            .map(|r| r.records().iter().filter_map(|o| o.pk().cloned()).collect())
            .unwrap_or_default()
    };
    assert_eq!(ids(&customers[0]), vec![Value::Int64(10), Value::Int64(11)]);
    assert_eq!(ids(&customers[1]), vec![Value::Int64(12)]);
    assert!(customers[2].attribute("orders").is_some_and(|r| r.is_empty()));
}

#[test]
fn test_virtual_join_attr_collision_uses_relation_slot() {
    let site = blog();
    let joiner = VirtualRelation::new(&site.catalog, site.backend(), true);
    let config = JoinConfig::new().attr("author").rel_field("author_id").to_field("id");
    let posts = joiner
        .join(site.queryset("Post").unwrap(), site.queryset("Author").unwrap(), &config)
        .unwrap();

    assert!(posts[0].attribute("author").is_none());
    let author = posts[0].cached_relation("author").and_then(|r| r.as_one()).unwrap();
    assert_eq!(author.get("name"), Some(&Value::from("Ada")));
    // the storage column is untouched
    assert_eq!(posts[0].get("author_id"), Some(&Value::Int64(1)));
}

#[test]
fn test_virtual_join_default_attr_and_empty_related() {
    let site = blog();
    let joiner = VirtualRelation::new(&site.catalog, site.backend(), true);
    let none = site.queryset("Customer").unwrap().none();
    let config = JoinConfig::new().rel_field("customer_no").to_field("number");
    let orders = joiner.join(site.queryset("Order").unwrap(), none, &config).unwrap();

    assert_eq!(orders.len(), 3);
    assert!(orders
        .iter()
        .all(|o| o.attribute("customer").is_some_and(|r| r.is_empty())));
}

#[test]
fn test_virtual_join_without_related_rows() {
    let site = blog();
    let joiner = VirtualRelation::new(&site.catalog, site.backend(), true);

    // no attribute name can be derived, so orders come back as they were
    let config = JoinConfig::new().rel_field("customer_no").to_field("number");
    let orders = joiner
        .join(site.queryset("Order").unwrap(), Vec::<Record>::new(), &config)
        .unwrap();
    assert_eq!(orders.len(), 3);
    assert!(orders.iter().all(|o| o.attribute("customer").is_none()));

    // post 3 has no tags; default attribute names still apply
    let untagged = site.queryset("Post").unwrap().filter("id", Value::Int64(3)).unwrap();
    let posts = joiner
        .join_many_to_many(
            untagged,
            site.queryset("PostTag").unwrap(),
            site.queryset("Tag").unwrap(),
            &M2mConfig::new("post_id", "tag_id"),
        )
        .unwrap();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].attribute("posttag").is_some_and(|links| links.is_empty()));
}

#[test]
fn test_virtual_join_narrows_related_query() {
    let site = blog();
    let orders = site
        .queryset("Order")
        .unwrap()
        .filter("customer_no", Value::Int64(2))
        .unwrap()
        .fetch(site.backend())
        .unwrap();
    let customers = RecordSource::from(site.queryset("Customer").unwrap());

    let fetched = |optimize: bool| -> Vec<Record> {
        let narrowed = VirtualRelation::new(&site.catalog, site.backend(), optimize)
            .narrow(&orders, "customer_no", customers.clone(), "number")
            .unwrap();
        let RecordSource::Query(qs) = narrowed else {
            panic!("related query should stay lazy");
        };
        qs.fetch(site.backend()).unwrap()
    };
    let narrowed = fetched(true);
    assert_eq!(narrowed.len(), 1);
    assert_eq!(narrowed[0].get("name"), Some(&Value::from("Acme")));
    assert_eq!(fetched(false).len(), 3);

    // one scan per side
    let joiner = VirtualRelation::new(&site.catalog, site.backend(), true);
    let config = JoinConfig::new().attr("customer").rel_field("customer_no").to_field("number");
    let before = site.backend().queries();
    joiner
        .join(site.queryset("Order").unwrap(), site.queryset("Customer").unwrap(), &config)
        .unwrap();
    assert_eq!(site.backend().queries() - before, 2);
}

#[test]
fn test_virtual_many_to_many() {
    let site = blog();
    let joiner = VirtualRelation::new(&site.catalog, site.backend(), true);
    let config = M2mConfig::new("post_id", "tag_id").attrs("links", "tag");
    let posts = joiner
        .join_many_to_many(
            site.queryset("Post").unwrap(),
            site.queryset("PostTag").unwrap(),
            site.queryset("Tag").unwrap(),
            &config,
        )
        .unwrap();

    let tags = |record: &Record| -> Vec<String> {
        record
            .attribute("links")
            .map(|links| {
                links
                    .records()
                    .iter()
                    .filter_map(|link| link.attribute("tag").and_then(|t| t.as_one()).cloned())
                    .collect::<Vec<_>>()
            })
            .map(|tags| names(&tags))
            .unwrap_or_default()
    };
    assert_eq!(tags(&posts[0]), vec!["rust", "systems"]);
    assert_eq!(tags(&posts[1]), vec!["rust"]);
    assert!(tags(&posts[2]).is_empty());
}

#[test]
fn test_list_view_renders_cells() {
    let site = blog();
    let page = post_list(&site).render(&site, &QueryParams::new()).unwrap();

    let labels: Vec<_> = page.columns.iter().map(|c| c.label.as_str()).collect();
    assert_eq!(labels, vec!["title", "Writer", "author", "comment", "views"]);
    assert_eq!(page.page.count, 3);
    assert_eq!(page.search_labels.len(), 2);

    let first = &page.rows[0].cells;
    assert_eq!(first[0], CellValue::Value(Value::from("Rust ownership")));
    assert_eq!(first[1], CellValue::Value(Value::from("Ada")));
    assert_eq!(first[2], CellValue::Text("Ada".into()));
    assert_eq!(
        first[3],
        CellValue::List(vec!["Comment object (1)".into(), "Comment object (2)".into()])
    );
    // zero views is a value, missing views is empty
    assert_eq!(first[4], CellValue::Value(Value::Int64(0)));
    assert_eq!(page.rows[2].cells[4], CellValue::Empty);
}

#[test]
fn test_list_view_search_and_orm_filters() {
    let site = blog();
    let view = post_list(&site);

    let page = view.render(&site, &params(&[("s", "  borrow ")])).unwrap();
    assert_eq!(page.page.count, 1);
    assert_eq!(page.search.as_deref(), Some("borrow"));

    let page = view.render(&site, &params(&[("s", "ada")])).unwrap();
    assert_eq!(page.page.count, 2);

    let page = view
        .render(&site, &params(&[("orm_author__name", "Grace"), ("orm_nope", "1")]))
        .unwrap();
    assert_eq!(page.page.count, 1);
    assert_eq!(page.rows[0].pk, serde_json::json!(3));
}

#[test]
fn test_optimized_list_scans_each_relation_once() {
    let site = blog();
    let view = post_list(&site);
    let qs = view.queryset(&site, &QueryParams::new()).unwrap();
    assert_eq!(qs.select_related_paths().len(), 1);
    assert_eq!(qs.prefetch_related_paths().len(), 1);

    // posts, then authors, then comments
    let before = site.backend().queries();
    let posts = qs.fetch(site.backend()).unwrap();
    assert_eq!(posts.len(), 3);
    assert_eq!(site.backend().queries() - before, 3);

    // rendering adds a single scan for the page count
    let before = site.backend().queries();
    view.render(&site, &QueryParams::new()).unwrap();
    assert_eq!(site.backend().queries() - before, 4);
}

#[test]
fn test_strict_orm_filters_empty_the_query() {
    let site = blog();
    let qs = site.queryset("Post").unwrap();
    let strict = apply_orm_filters(&qs, &params(&[("orm_views__gt", "abc")]), false);
    assert!(strict.is_none());
    assert_eq!(strict.count(site.backend()).unwrap(), 0);

    let lenient = apply_orm_filters(&qs, &params(&[("orm_views__gt", "abc")]), true);
    assert_eq!(lenient.count(site.backend()).unwrap(), 3);
}

#[test]
fn test_list_view_pagination() {
    let site = blog();
    let view = post_list(&site);

    let page = view.render(&site, &params(&[("pagesize", "500")])).unwrap();
    assert_eq!(page.page.per_page, 100);

    let page = view.render(&site, &params(&[("pagesize", "abc")])).unwrap();
    assert_eq!(page.page.per_page, 20);

    let page = view
        .render(&site, &params(&[("pagesize", "1"), ("page", "2"), ("s", "")]))
        .unwrap();
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0].pk, serde_json::json!(2));
    assert_eq!(page.url_args, vec!["pagesize=1".to_string(), "s=".to_string()]);
    assert_eq!(page.page_size_list, vec![20, 30, 50]);

    let result = view.render(&site, &params(&[("page", "9")]));
    assert!(matches!(result, Err(Error::InvalidPage(_))));
}

#[test]
fn test_detail_view() {
    let site = blog();
    let page = DetailView::new("Post").render(&site, "1").unwrap();
    assert_eq!(page.title, "Rust ownership");

    let author = page.fields.iter().find(|f| f.path == "author").unwrap();
    assert_eq!(author.value, CellValue::Text("Ada".into()));
    let author_id = page.fields.iter().find(|f| f.path == "author_id").unwrap();
    assert_eq!(author_id.value, CellValue::Value(Value::Int64(1)));

    assert!(matches!(
        DetailView::new("Post").render(&site, "42"),
        Err(Error::NotFound)
    ));
}

#[test]
fn test_create_view() {
    let site = blog();
    let view = CreateView::new("Post", None);

    let payload = serde_json::json!({"title": "New", "author": 2});
    let outcome = view.submit(&site, payload.as_object().unwrap()).unwrap();
    assert_eq!(
        outcome,
        EditOutcome::Saved {
            pk: serde_json::json!(4),
            success_url: "/post".to_string()
        }
    );

    let missing = view.submit(&site, &serde_json::Map::new()).unwrap();
    let EditOutcome::Invalid { errors } = missing else {
        panic!("expected validation errors");
    };
    assert!(errors.contains_key("title"));
    assert!(errors.contains_key("author_id"));
    assert!(!errors.contains_key("views"));

    let dangling = serde_json::json!({"title": "x", "author_id": 99, "nope": 1});
    let EditOutcome::Invalid { errors } = view.submit(&site, dangling.as_object().unwrap()).unwrap() else {
        panic!("expected validation errors");
    };
    assert!(errors["author_id"][0].contains("does not exist"));
    assert_eq!(errors["nope"], vec!["unknown field".to_string()]);
}

#[test]
fn test_update_view() {
    let site = blog();
    let view = UpdateView::new("Post", Some("/done".to_string()));

    let payload = serde_json::json!({"title": "Borrowing, revisited"});
    let outcome = view.submit(&site, "2", payload.as_object().unwrap()).unwrap();
    assert!(outcome.is_saved());

    let record = view.initial(&site, "2").unwrap();
    assert_eq!(record.get("title"), Some(&Value::from("Borrowing, revisited")));
    assert_eq!(record.get("views"), Some(&Value::Int64(10)));

    let change_pk = serde_json::json!({"id": 7});
    assert!(!view.submit(&site, "2", change_pk.as_object().unwrap()).unwrap().is_saved());
    assert!(matches!(
        view.submit(&site, "99", &serde_json::Map::new()),
        Err(Error::NotFound)
    ));
}

#[test]
fn test_delete_view() {
    let site = blog();
    let view = DeleteView::new("Comment");

    let outcome = view.submit(&site, &[]);
    assert!(!outcome.status);
    assert!(outcome.error.is_some());

    let outcome = view.submit(&site, &["x".to_string()]);
    assert!(!outcome.status);

    let outcome = view.submit(&site, &["1".to_string(), "3".to_string()]);
    assert!(outcome.status);
    assert_eq!(outcome.deleted, 2);
    assert_eq!(site.queryset("Comment").unwrap().count(site.backend()).unwrap(), 1);
}

#[test]
fn test_route_all() {
    let site = blog();
    let urls = site
        .router()
        .route_all(ActionMask(0b00011), &ActionOverrides::new())
        .unwrap();
    assert_eq!(urls.len(), 14);
    assert_eq!(urls[0].name, "author_detail");
    assert_eq!(urls[1].name, "author_list");
    assert_eq!(urls[1].path, "/author");
}
