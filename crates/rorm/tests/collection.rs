use std::sync::Arc;

use rorm::{Context, InMemoryHashStore, Orm, OrmConfig, OrmError, Record, StoreError};

#[derive(Debug, Default, Clone, PartialEq, Record)]
#[redis(name = "test::Entry")]
struct Entry {
    #[redis("primary")]
    id: String,
    score: u32,
}

#[derive(Debug, Default, Clone, Record)]
#[redis(name = "test::Other")]
struct Other {
    #[redis("primary")]
    id: String,
}

fn entry(id: &str, score: u32) -> Entry {
    Entry {
        id: id.into(),
        score,
    }
}

async fn seeded(scan_count: usize) -> (Arc<InMemoryHashStore>, Orm, Context) {
    let store = Arc::new(InMemoryHashStore::new());
    let config = OrmConfig {
        scan_count,
        ..OrmConfig::default()
    };
    let orm = Orm::with_config(store.clone(), config);
    let ctx = Context::background();
    for (id, score) in [("try1", 1), ("other", 2), ("retry", 3), ("plain", 4)] {
        orm.query().create(&ctx, &entry(id, score)).await.unwrap();
    }
    orm.query()
        .create(&ctx, &Other { id: "try9".into() })
        .await
        .unwrap();
    (store, orm, ctx)
}

fn sorted(mut entries: Vec<Entry>) -> Vec<Entry> {
    entries.sort_by(|a, b| a.id.cmp(&b.id));
    entries
}

#[tokio::test]
async fn pattern_scan_returns_exactly_the_matches() {
    let (_, orm, ctx) = seeded(10).await;
    let found: Vec<Entry> = orm
        .query()
        .where_pattern("*try*")
        .find_all(&ctx)
        .await
        .unwrap();
    assert_eq!(sorted(found), vec![entry("retry", 3), entry("try1", 1)]);
}

#[tokio::test]
async fn scan_spans_many_pages() {
    let (store, orm, ctx) = seeded(1).await;
    let scans_before = store.scans_executed();
    let found: Vec<Entry> = orm
        .query()
        .where_type::<Entry>()
        .find_all(&ctx)
        .await
        .unwrap();
    assert_eq!(found.len(), 4);
    assert!(store.scans_executed() - scans_before >= 5);
}

#[tokio::test]
async fn records_are_fetched_in_one_pipeline() {
    let (store, orm, ctx) = seeded(10).await;
    let before = store.pipelines_executed();
    let found: Vec<Entry> = orm
        .query()
        .where_type::<Entry>()
        .find_all(&ctx)
        .await
        .unwrap();
    assert_eq!(found.len(), 4);
    assert_eq!(store.pipelines_executed() - before, 1);
}

#[tokio::test]
async fn results_append_to_existing_collection() {
    let (_, orm, ctx) = seeded(10).await;
    let mut out = vec![entry("kept", 0)];
    let appended = orm
        .query()
        .where_pattern("*try*")
        .find_all_into(&ctx, &mut out)
        .await
        .unwrap();
    assert_eq!(appended, 2);
    assert_eq!(out.len(), 3);
    assert_eq!(out[0], entry("kept", 0));
}

#[tokio::test]
async fn empty_pattern_is_rejected() {
    let (store, orm, ctx) = seeded(10).await;
    let scans = store.scans_executed();

    let err = orm.query().find_all::<Entry>(&ctx).await.unwrap_err();
    assert!(matches!(err, OrmError::EmptyPattern));

    let err = orm
        .query()
        .where_pattern("")
        .find_all::<Entry>(&ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::EmptyPattern));
    assert_eq!(store.scans_executed(), scans);
}

#[tokio::test]
async fn no_matches_yield_empty_collection() {
    let (store, orm, ctx) = seeded(10).await;
    let before = store.pipelines_executed();
    let found: Vec<Entry> = orm
        .query()
        .where_pattern("nothing*")
        .find_all(&ctx)
        .await
        .unwrap();
    assert!(found.is_empty());
    assert_eq!(store.pipelines_executed(), before);
}

#[tokio::test]
async fn fetch_failure_aborts_collection() {
    let (store, orm, ctx) = seeded(10).await;
    store.fail_next_pipeline(StoreError::Transport("broken pipe".into()));
    let err = orm
        .query()
        .where_type::<Entry>()
        .find_all::<Entry>(&ctx)
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Store(StoreError::Transport(_))));
}

#[tokio::test]
async fn expired_records_are_not_returned() {
    let store = Arc::new(InMemoryHashStore::new());
    let orm = Orm::new(store.clone());
    let ctx = Context::background();
    orm.query()
        .expire(std::time::Duration::from_millis(20))
        .create(&ctx, &entry("short", 1))
        .await
        .unwrap();
    orm.query().create(&ctx, &entry("long", 2)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let found: Vec<Entry> = orm
        .query()
        .where_type::<Entry>()
        .find_all(&ctx)
        .await
        .unwrap();
    assert_eq!(found, vec![entry("long", 2)]);
}
