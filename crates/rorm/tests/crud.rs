use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use rorm::{
    Context, FieldUpdates, InMemoryHashStore, Orm, OrmConfig, OrmError, Record, StoreError,
};

#[derive(Debug, Default, Clone, PartialEq, Record)]
#[redis(name = "test::Item")]
struct Item {
    #[redis("primary")]
    id: String,
    name: String,
    count: i64,
    ratio: f64,
    enabled: bool,
    tags: Vec<String>,
    attrs: BTreeMap<String, i32>,
    nickname: Option<String>,
    #[redis("-")]
    transient: String,
}

#[derive(Debug, Default, Record)]
#[redis(name = "test::Unkeyed")]
struct Unkeyed {
    value: i32,
}

#[derive(Debug, Default, Record)]
#[redis(name = "test::Handles")]
struct Handles {
    #[redis("primary")]
    id: u32,
    value: i32,
    events: Option<tokio::sync::mpsc::Sender<String>>,
    callback: Option<fn() -> u8>,
    nested_option: Option<Option<i32>>,
}

#[derive(Debug, Default, Record)]
#[redis(name = "test::Legacy")]
struct Legacy {
    #[redis(tag = "primary", rename = "ID")]
    id: String,
    #[redis(rename = "Name")]
    name: String,
}

fn setup() -> (Arc<InMemoryHashStore>, Orm, Context) {
    let store = Arc::new(InMemoryHashStore::new());
    let orm = Orm::new(store.clone());
    (store, orm, Context::background())
}

fn item() -> Item {
    Item {
        id: "i1".into(),
        name: "widget".into(),
        count: -4,
        ratio: 2.8,
        enabled: true,
        tags: vec!["a".into(), "b".into()],
        attrs: BTreeMap::from([("w".to_string(), 3)]),
        nickname: Some("wid".into()),
        transient: "scratch".into(),
    }
}

fn lookup(id: &str) -> Item {
    Item {
        id: id.into(),
        ..Item::default()
    }
}

#[tokio::test]
async fn create_then_find_round_trips() {
    let (store, orm, ctx) = setup();
    let original = item();
    orm.query().create(&ctx, &original).await.unwrap();

    let hash = store.snapshot("test::Item/id/i1").unwrap();
    assert_eq!(hash["enabled"], "1");
    assert_eq!(hash["tags"], "[\"a\",\"b\"]");
    assert!(!hash.contains_key("transient"));

    let mut found = lookup("i1");
    let outcome = orm.query().find(&ctx, &mut found).await.unwrap();
    assert!(!outcome.is_loaded());
    assert_eq!(
        found,
        Item {
            transient: String::new(),
            ..original
        }
    );
}

#[tokio::test]
async fn nil_pointer_is_not_written() {
    let (store, orm, ctx) = setup();
    let record = Item {
        nickname: None,
        ..item()
    };
    orm.query().create(&ctx, &record).await.unwrap();
    let hash = store.snapshot("test::Item/id/i1").unwrap();
    assert!(!hash.contains_key("nickname"));
}

#[tokio::test]
async fn find_missing_record_is_data_not_found() {
    let (_, orm, ctx) = setup();
    let mut found = lookup("absent");
    let err = orm.query().find(&ctx, &mut found).await.unwrap_err();
    assert!(matches!(err, OrmError::DataNotFound(key) if key == "test::Item/id/absent"));
}

#[tokio::test]
async fn type_without_primary_fails_before_store() {
    let (store, orm, ctx) = setup();
    let err = orm.query().create(&ctx, &Unkeyed { value: 1 }).await.unwrap_err();
    assert!(matches!(err, OrmError::PrimaryKeyNotFound(_)));
    assert_eq!(store.pipelines_executed(), 0);
}

#[tokio::test]
async fn update_requires_existing_record() {
    let (_, orm, ctx) = setup();
    let record = item();

    let err = orm
        .query()
        .update(&ctx, &record, "count", 10i64)
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::PrimaryKeyNotFound(_)));

    orm.query().create(&ctx, &record).await.unwrap();
    orm.query()
        .update(&ctx, &record, "count", 10i64)
        .await
        .unwrap();

    let mut found = lookup("i1");
    orm.query().find(&ctx, &mut found).await.unwrap();
    assert_eq!(found.count, 10);
    assert_eq!(found.name, "widget");
}

#[tokio::test]
async fn update_unknown_field_fails_before_store() {
    let (store, orm, ctx) = setup();
    let err = orm
        .query()
        .update(&ctx, &item(), "Missing", 1)
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::FieldNotExist(name) if name == "Missing"));
    assert_eq!(store.pipelines_executed(), 0);
}

#[tokio::test]
async fn updates_write_every_field() {
    let (_, orm, ctx) = setup();
    let record = item();
    orm.query().create(&ctx, &record).await.unwrap();

    let updates = FieldUpdates::new()
        .set("name", "gadget".to_string())
        .set("tags", vec!["z".to_string()])
        .set("enabled", false);
    orm.query().updates(&ctx, &record, &updates).await.unwrap();

    let mut found = lookup("i1");
    orm.query().find(&ctx, &mut found).await.unwrap();
    assert_eq!(found.name, "gadget");
    assert_eq!(found.tags, vec!["z".to_string()]);
    assert!(!found.enabled);
    assert_eq!(found.count, -4);
}

#[tokio::test]
async fn updates_with_unknown_field_write_nothing() {
    let (store, orm, ctx) = setup();
    let record = item();
    orm.query().create(&ctx, &record).await.unwrap();
    let before = store.snapshot("test::Item/id/i1").unwrap();
    let pipelines = store.pipelines_executed();

    let updates = FieldUpdates::new()
        .set("name", "gadget".to_string())
        .set("bogus", 1u8);
    let err = orm
        .query()
        .updates(&ctx, &record, &updates)
        .await
        .unwrap_err();

    assert!(matches!(err, OrmError::FieldNotExist(name) if name == "bogus"));
    assert_eq!(store.pipelines_executed(), pipelines);
    assert_eq!(store.snapshot("test::Item/id/i1").unwrap(), before);
}

#[tokio::test]
async fn skip_tagged_field_is_not_writable() {
    let (store, orm, ctx) = setup();
    let record = item();
    orm.query().create(&ctx, &record).await.unwrap();
    let before = store.snapshot("test::Item/id/i1").unwrap();
    let pipelines = store.pipelines_executed();

    let err = orm
        .query()
        .update(&ctx, &record, "transient", "leaked".to_string())
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::FieldNotExist(name) if name == "transient"));

    let updates = FieldUpdates::new()
        .set("name", "gadget".to_string())
        .set("transient", "leaked".to_string());
    let err = orm
        .query()
        .updates(&ctx, &record, &updates)
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::FieldNotExist(name) if name == "transient"));

    assert_eq!(store.pipelines_executed(), pipelines);
    let after = store.snapshot("test::Item/id/i1").unwrap();
    assert_eq!(after, before);
    assert!(!after.contains_key("transient"));
}

#[tokio::test]
async fn update_to_none_clears_stored_field() {
    let (store, orm, ctx) = setup();
    let record = item();
    orm.query().create(&ctx, &record).await.unwrap();

    orm.query()
        .update(&ctx, &record, "nickname", None::<String>)
        .await
        .unwrap();
    let hash = store.snapshot("test::Item/id/i1").unwrap();
    assert!(!hash.contains_key("nickname"));
    assert_eq!(hash["name"], "widget");

    let mut found = lookup("i1");
    orm.query().find(&ctx, &mut found).await.unwrap();
    assert_eq!(found.nickname, None);
}

#[tokio::test]
async fn updates_with_none_clear_only_that_field() {
    let (store, orm, ctx) = setup();
    let record = item();
    orm.query().create(&ctx, &record).await.unwrap();

    let updates = FieldUpdates::new()
        .set("nickname", None::<String>)
        .set("count", 9i64);
    orm.query().updates(&ctx, &record, &updates).await.unwrap();

    let hash = store.snapshot("test::Item/id/i1").unwrap();
    assert!(!hash.contains_key("nickname"));
    assert_eq!(hash["count"], "9");
}

#[tokio::test]
async fn updates_require_existing_record() {
    let (_, orm, ctx) = setup();
    let updates = FieldUpdates::new().set("name", "x".to_string());
    let err = orm
        .query()
        .updates(&ctx, &item(), &updates)
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::PrimaryKeyNotFound(_)));
}

#[tokio::test]
async fn selection_reads_only_named_fields() {
    let (_, orm, ctx) = setup();
    orm.query().create(&ctx, &item()).await.unwrap();

    let mut found = lookup("i1");
    orm.query()
        .select(["name", "count"])
        .find(&ctx, &mut found)
        .await
        .unwrap();
    assert_eq!(found.name, "widget");
    assert_eq!(found.count, -4);
    assert!(found.tags.is_empty());
    assert!(!found.enabled);
}

#[tokio::test]
async fn selection_of_unknown_field_fails_before_store() {
    let (store, orm, ctx) = setup();
    let mut found = lookup("i1");
    let err = orm
        .query()
        .select(["name", "nope"])
        .find(&ctx, &mut found)
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::FieldNotExist(name) if name == "nope"));
    assert_eq!(store.pipelines_executed(), 0);
}

#[tokio::test]
async fn selection_of_absent_fields_is_data_not_found() {
    let (_, orm, ctx) = setup();
    orm.query()
        .create(&ctx, &Item { nickname: None, ..item() })
        .await
        .unwrap();
    let mut found = lookup("i1");
    let err = orm
        .query()
        .select(["nickname"])
        .find(&ctx, &mut found)
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::DataNotFound(_)));
}

#[tokio::test]
async fn expiry_is_applied_after_create() {
    let (store, orm, ctx) = setup();
    orm.query()
        .expire(Duration::from_secs(60))
        .create(&ctx, &item())
        .await
        .unwrap();
    let ttl = store.ttl("test::Item/id/i1").unwrap();
    assert!(ttl <= Duration::from_secs(60));
    assert!(ttl > Duration::from_secs(50));
}

#[tokio::test]
async fn configured_default_expiry_applies() {
    let store = Arc::new(InMemoryHashStore::new());
    let config = OrmConfig {
        default_expire_secs: Some(30),
        ..OrmConfig::default()
    };
    let orm = Orm::with_config(store.clone(), config);
    orm.query()
        .create(&Context::background(), &item())
        .await
        .unwrap();
    assert!(store.ttl("test::Item/id/i1").is_some());
}

#[tokio::test]
async fn records_without_expiry_persist() {
    let (store, orm, ctx) = setup();
    orm.query().create(&ctx, &item()).await.unwrap();
    assert!(store.ttl("test::Item/id/i1").is_none());
}

#[tokio::test]
async fn runtime_handles_are_skipped() {
    let (store, orm, ctx) = setup();
    let (tx, _rx) = tokio::sync::mpsc::channel(1);
    fn seven() -> u8 {
        7
    }
    let record = Handles {
        id: 9,
        value: 5,
        events: Some(tx),
        callback: Some(seven as fn() -> u8),
        nested_option: Some(Some(1)),
    };
    orm.query().create(&ctx, &record).await.unwrap();

    let hash = store.snapshot("test::Handles/id/9").unwrap();
    assert_eq!(hash.len(), 2);
    assert_eq!(hash["value"], "5");

    let mut found = Handles {
        id: 9,
        ..Handles::default()
    };
    orm.query().find(&ctx, &mut found).await.unwrap();
    assert_eq!(found.value, 5);
    assert!(found.events.is_none());
    assert!(found.callback.is_none());
    assert!(found.nested_option.is_none());
}

#[tokio::test]
async fn renamed_fields_use_stored_names() {
    let (store, orm, ctx) = setup();
    let record = Legacy {
        id: "7".into(),
        name: "old".into(),
    };
    assert_eq!(orm.key_of(&record).unwrap(), "test::Legacy/ID/7");
    orm.query().create(&ctx, &record).await.unwrap();
    let hash = store.snapshot("test::Legacy/ID/7").unwrap();
    assert_eq!(hash["Name"], "old");

    orm.query()
        .update(&ctx, &record, "Name", "new".to_string())
        .await
        .unwrap();
    let mut found = Legacy {
        id: "7".into(),
        ..Legacy::default()
    };
    orm.query().find(&ctx, &mut found).await.unwrap();
    assert_eq!(found.name, "new");
}

#[tokio::test]
async fn undecodable_field_aborts_find() {
    let (store, orm, ctx) = setup();
    orm.query().create(&ctx, &item()).await.unwrap();
    let mut pipe = rorm::Pipeline::new();
    pipe.hset("test::Item/id/i1", "count", "many");
    rorm::HashStore::execute(store.as_ref(), &pipe).await.unwrap();

    let mut found = lookup("i1");
    let err = orm.query().find(&ctx, &mut found).await.unwrap_err();
    assert!(matches!(err, OrmError::Codec { field, .. } if field == "count"));
}

#[tokio::test]
async fn flags_written_by_other_clients_read_leniently() {
    let (store, orm, ctx) = setup();
    orm.query().create(&ctx, &item()).await.unwrap();
    let mut pipe = rorm::Pipeline::new();
    pipe.hset("test::Item/id/i1", "enabled", "");
    rorm::HashStore::execute(store.as_ref(), &pipe).await.unwrap();

    let mut found = lookup("i1");
    orm.query().find(&ctx, &mut found).await.unwrap();
    assert!(!found.enabled);
    assert_eq!(found.name, "widget");
}

#[tokio::test]
async fn exists_reflects_store() {
    let (_, orm, ctx) = setup();
    assert!(!orm.query().exists(&ctx, &item()).await.unwrap());
    orm.query().create(&ctx, &item()).await.unwrap();
    assert!(orm.query().exists(&ctx, &item()).await.unwrap());
}

#[tokio::test]
async fn transport_failure_propagates() {
    let (store, orm, ctx) = setup();
    store.fail_next_pipeline(StoreError::Transport("connection reset".into()));
    let err = orm.query().create(&ctx, &item()).await.unwrap_err();
    assert!(matches!(err, OrmError::Store(StoreError::Transport(_))));
    assert!(store.is_empty());
}

#[tokio::test]
async fn closed_store_propagates() {
    let (store, orm, ctx) = setup();
    store.close();
    let mut found = lookup("i1");
    let err = orm.query().find(&ctx, &mut found).await.unwrap_err();
    assert!(matches!(err, OrmError::Store(StoreError::Closed)));
}
