use depotfetch_e2e_tests::{MockLinks, init_tracing, request_count, worker_context};
use depotfetch_lib::item::{ChunkedFile, ItemDescriptor};
use depotfetch_lib::progress::ProgressCounters;
use depotfetch_lib::worker::{DownloadWorker, ItemOutcome};
use std::sync::Arc;
use wiremock::MockServer;

#[tokio::test]
async fn test_directories_and_empty_files_never_touch_the_network() {
    init_tracing();
    let server = MockServer::start().await;
    let install = tempfile::tempdir().unwrap();
    let context = worker_context(
        install.path(),
        MockLinks::new(&server),
        Arc::new(ProgressCounters::default()),
    );

    let items = vec![
        ItemDescriptor::Directory {
            path: "saves\\slot1".to_string(),
        },
        ItemDescriptor::EmptyFile {
            path: "logs/empty.log".to_string(),
        },
        ItemDescriptor::ChunkedFile(ChunkedFile {
            path: "no_chunks.dat".to_string(),
            flags: vec![],
            product_id: "1207658924".to_string(),
            chunks: vec![],
            digest: None,
        }),
    ];

    for _ in 0..2 {
        for item in &items {
            let outcome = DownloadWorker::new(item.clone(), context.clone())
                .run()
                .await
                .unwrap();
            assert_eq!(outcome, ItemOutcome::Created);
        }
    }

    assert!(install.path().join("saves").join("slot1").is_dir());
    assert_eq!(
        std::fs::metadata(install.path().join("logs/empty.log")).unwrap().len(),
        0
    );
    assert_eq!(
        std::fs::metadata(install.path().join("no_chunks.dat")).unwrap().len(),
        0
    );
    assert_eq!(request_count(&server).await, 0);
}

#[tokio::test]
async fn test_existing_empty_file_is_truncated() {
    init_tracing();
    let server = MockServer::start().await;
    let install = tempfile::tempdir().unwrap();
    std::fs::write(install.path().join("stale.txt"), b"leftover").unwrap();
    let context = worker_context(
        install.path(),
        MockLinks::new(&server),
        Arc::new(ProgressCounters::default()),
    );

    let item = ItemDescriptor::EmptyFile {
        path: "stale.txt".to_string(),
    };
    DownloadWorker::new(item, context).run().await.unwrap();

    assert_eq!(
        std::fs::metadata(install.path().join("stale.txt")).unwrap().len(),
        0
    );
}
