//! Service-level behaviour against the in-memory executor: retry policy, timeouts,
//! no-op deletes and stale page handling.

mod common;

use chrono::{TimeZone, Utc};
use common::{fake_metadata, sample_users, users_table, FakeExecutor};
use std::sync::atomic::AtomicU32;
use std::sync::Arc;
use std::time::Duration;
use table_editor::app::generation::GenerationTracker;
use table_editor::domain::filter::{Filter, FilterOperator};
use table_editor::domain::query::{QueryOptions, SortDirection};
use table_editor::infra::config::EditorConfig;
use table_editor::{EditorError, SqlValue, TableEditorService, ValueMap};

fn service(executor: Arc<FakeExecutor>, config: EditorConfig) -> TableEditorService {
    TableEditorService::new(executor, Arc::new(fake_metadata()), config)
}

fn fast_config() -> EditorConfig {
    EditorConfig {
        query_timeout: Duration::from_millis(500),
        read_retries: 2,
        default_page_size: 100,
    }
}

#[tokio::test]
async fn fetch_rows_runs_select_and_count_with_shared_filters() {
    let executor = Arc::new(FakeExecutor::with_rows(sample_users()));
    let svc = service(executor.clone(), fast_config());

    let options = QueryOptions::new(1, 50)
        .with_sort("email", SortDirection::Asc)
        .with_filters(vec![Filter::new("email", FilterOperator::Like, "%acme%")]);
    let page = svc.fetch_rows(&users_table(), &options).await.unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.rows.len(), 2);
    assert_eq!(page.rows[0].key, 1);
    assert_eq!((page.page, page.page_size), (1, 50));

    let statements = executor.statements();
    assert!(statements.contains(
        &"SELECT * FROM public.\"users\" WHERE \"email\" LIKE '%acme%' ORDER BY \"email\" ASC LIMIT 50 OFFSET 0".to_string()
    ));
    assert!(statements.contains(
        &"SELECT COUNT(*) AS count FROM public.\"users\" WHERE \"email\" LIKE '%acme%'".to_string()
    ));
}

#[tokio::test]
async fn unknown_sort_column_is_rejected_before_execution() {
    let executor = Arc::new(FakeExecutor::default());
    let svc = service(executor.clone(), fast_config());

    let options = QueryOptions::new(1, 10).with_sort("nope", SortDirection::Desc);
    let err = svc.fetch_rows(&users_table(), &options).await.unwrap_err();
    assert!(matches!(err, EditorError::UnknownColumn { .. }));
    assert!(executor.statements().is_empty());
}

#[tokio::test]
async fn reads_retry_transport_failures() {
    let executor = Arc::new(FakeExecutor {
        transport_failures: AtomicU32::new(2),
        total: 7,
        ..FakeExecutor::default()
    });
    let svc = service(executor.clone(), fast_config());

    let total = svc.count_rows(&users_table(), &[]).await.unwrap();
    assert_eq!(total, 7);
    assert_eq!(executor.count_matching("SELECT COUNT(*)"), 3);
}

#[tokio::test]
async fn reads_give_up_after_configured_retries() {
    let executor = Arc::new(FakeExecutor {
        transport_failures: AtomicU32::new(10),
        ..FakeExecutor::default()
    });
    let config = EditorConfig {
        read_retries: 1,
        ..fast_config()
    };
    let svc = service(executor.clone(), config);

    let err = svc.count_rows(&users_table(), &[]).await.unwrap_err();
    assert!(matches!(err, EditorError::Transport(_)));
    assert_eq!(executor.statements().len(), 2);
}

#[tokio::test]
async fn database_errors_are_not_retried_and_keep_message() {
    let executor = Arc::new(FakeExecutor {
        database_error: Some("relation \"users\" does not exist".to_string()),
        ..FakeExecutor::default()
    });
    let svc = service(executor.clone(), fast_config());

    let err = svc.count_rows(&users_table(), &[]).await.unwrap_err();
    assert_eq!(err.to_string(), "relation \"users\" does not exist");
    assert_eq!(executor.statements().len(), 1);
}

#[tokio::test]
async fn mutations_run_exactly_once() {
    let executor = Arc::new(FakeExecutor {
        transport_failures: AtomicU32::new(1),
        ..FakeExecutor::default()
    });
    let svc = service(executor.clone(), fast_config());

    let mut updates = ValueMap::new();
    updates.insert("email", "new@acme.com");
    let err = svc
        .update_row(&users_table(), &SqlValue::int(1), &updates)
        .await
        .unwrap_err();
    assert!(matches!(err, EditorError::Transport(_)));
    assert_eq!(executor.count_matching("UPDATE"), 1);
}

#[tokio::test]
async fn slow_statements_time_out() {
    let executor = Arc::new(FakeExecutor {
        delay: Some(Duration::from_millis(300)),
        ..FakeExecutor::default()
    });
    let config = EditorConfig {
        query_timeout: Duration::from_millis(20),
        read_retries: 0,
        default_page_size: 100,
    };
    let svc = service(executor.clone(), config);

    let err = svc
        .delete_rows(&users_table(), &[SqlValue::int(1)])
        .await
        .unwrap_err();
    assert!(matches!(err, EditorError::Timeout(20)));
    assert_eq!(executor.statements().len(), 1);
}

#[tokio::test]
async fn empty_delete_never_reaches_executor() {
    let executor = Arc::new(FakeExecutor::default());
    let svc = service(executor.clone(), fast_config());

    assert_eq!(svc.delete_rows(&users_table(), &[]).await.unwrap(), 0);
    assert!(executor.statements().is_empty());
}

#[tokio::test]
async fn delete_selected_maps_identities_to_primary_keys() {
    let executor = Arc::new(FakeExecutor::with_rows(sample_users()));
    let svc = service(executor.clone(), fast_config());
    let table = users_table();

    let page = svc.fetch_rows(&table, &QueryOptions::default()).await.unwrap();
    let selected: Vec<i32> = page.rows.iter().map(|r| r.key).collect();
    let deleted = svc.delete_selected(&table, &page, &selected).await.unwrap();

    assert_eq!(deleted, 2);
    assert!(executor
        .statements()
        .contains(&"DELETE FROM public.\"users\" WHERE \"id\" = 1 OR \"id\" = 2".to_string()));
}

#[tokio::test]
async fn default_row_insert_uses_synthesized_values() {
    let executor = Arc::new(FakeExecutor::default());
    let svc = service(executor.clone(), fast_config());
    let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

    let inserted = svc.insert_default_row(&users_table(), now).await.unwrap();
    assert!(inserted.is_some());
    assert_eq!(
        executor.statements(),
        vec![
            "INSERT INTO public.\"users\" (\"email\", \"created_at\", \"profile\") VALUES ('', '2024-03-01T12:30:00.000Z', NULL) RETURNING *"
                .to_string()
        ]
    );
}

#[tokio::test]
async fn superseded_page_is_discarded() {
    let executor = Arc::new(FakeExecutor {
        delay: Some(Duration::from_millis(80)),
        ..FakeExecutor::with_rows(sample_users())
    });
    let svc = service(executor, fast_config());
    let tracker = GenerationTracker::new();
    let table = users_table();

    let page2 = QueryOptions::new(2, 10);
    let page3 = QueryOptions::new(3, 10);
    let (older, newer) = tokio::join!(
        svc.fetch_rows_tracked(&tracker, &table, &page2),
        async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            svc.fetch_rows_tracked(&tracker, &table, &page3).await
        }
    );

    assert!(older.unwrap().is_none());
    let newer = newer.unwrap().expect("latest request is applied");
    assert_eq!(newer.page, 3);
}
