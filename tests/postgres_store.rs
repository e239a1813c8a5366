//! PostgreSQL score store tests
//!
//! These run against a live database named by `IDP_TEST_POSTGRES_URL` and
//! return early when it is unset. Keys carry a per-run suffix so repeated
//! runs against the same database do not interfere.

use idp_reputation::{DatabasePool, PgScoreStore, ReputationError, ReputationKind, ScoreStore};
use tokio::sync::Mutex;

const TEST_DATABASE_ENV: &str = "IDP_TEST_POSTGRES_URL";

static SCHEMA_READY: Mutex<bool> = Mutex::const_new(false);

async fn connect() -> Option<PgScoreStore> {
    let Ok(url) = std::env::var(TEST_DATABASE_ENV) else {
        eprintln!("{} not set, skipping PostgreSQL test", TEST_DATABASE_ENV);
        return None;
    };

    let db = DatabasePool::new(&url, 16)
        .await
        .expect("connect to test database");

    let mut ready = SCHEMA_READY.lock().await;
    if !*ready {
        db.init_schema().await.expect("initialize test schema");
        *ready = true;
    }

    Some(db.scores().clone())
}

fn unique_key(name: &str) -> String {
    let run = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("pg-{}-{}", name, run)
}

#[tokio::test]
async fn test_unseen_key_reads_zero() {
    let Some(store) = connect().await else { return };
    let key = unique_key("unseen");

    assert_eq!(store.get(ReputationKind::Identifier, &key).await.unwrap(), 0);
    assert!(store
        .record(ReputationKind::Identifier, &key)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_concurrent_adjustments_on_one_key() {
    let Some(store) = connect().await else { return };
    let key = unique_key("contended");
    let writers: i64 = 100;

    let mut handles = Vec::new();
    for _ in 0..writers {
        let store = store.clone();
        let key = key.clone();
        handles.push(tokio::spawn(async move {
            store.adjust(ReputationKind::NetworkAddress, &key, -1).await
        }));
    }

    let mut returned = Vec::new();
    for handle in handles {
        returned.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(
        store.get(ReputationKind::NetworkAddress, &key).await.unwrap(),
        -writers
    );

    // Every writer saw a distinct intermediate score
    returned.sort_unstable();
    let expected: Vec<i64> = (-writers..=-1).collect();
    assert_eq!(returned, expected);
}

#[tokio::test]
async fn test_set_and_list_order() {
    let Some(store) = connect().await else { return };
    let prefix = unique_key("order");
    let key = |suffix: &str| format!("{}-{}", prefix, suffix);

    store.set(ReputationKind::Identifier, &key("b"), 5).await.unwrap();
    store.set(ReputationKind::Identifier, &key("c"), -3).await.unwrap();
    store.adjust(ReputationKind::Identifier, &key("a"), -3).await.unwrap();
    store.set(ReputationKind::Identifier, &key("b"), 7).await.unwrap();

    let listed: Vec<(String, i64)> = store
        .list(Some(ReputationKind::Identifier))
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.key.starts_with(&prefix))
        .map(|r| (r.key, r.score))
        .collect();

    assert_eq!(
        listed,
        vec![(key("a"), -3), (key("c"), -3), (key("b"), 7)]
    );

    let addresses = store.list(Some(ReputationKind::NetworkAddress)).await.unwrap();
    assert!(addresses.iter().all(|r| !r.key.starts_with(&prefix)));
}

#[tokio::test]
async fn test_overflowing_adjust_is_rejected() {
    let Some(store) = connect().await else { return };
    let key = unique_key("overflow");

    store
        .set(ReputationKind::Identifier, &key, i64::MIN + 1)
        .await
        .unwrap();

    let result = store.adjust(ReputationKind::Identifier, &key, -2).await;
    assert!(matches!(result, Err(ReputationError::Storage(_))));
    assert_eq!(
        store.get(ReputationKind::Identifier, &key).await.unwrap(),
        i64::MIN + 1
    );
}
