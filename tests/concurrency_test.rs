//! Concurrent batch tests
//!
//! Writer batches are serialized by the engine lock while readers may overlap, so
//! the final map must reflect every committed batch exactly once.

use futures::future::join_all;
use std::sync::Arc;
use tagraph::{EngineConfig, GraphEngine, MemoryFileStore, StatusCode};

fn engine_with(config: EngineConfig) -> GraphEngine {
    GraphEngine::new(config, Arc::new(MemoryFileStore::new()))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_disjoint_batches() {
    let engine = engine_with(EngineConfig::default());
    let writers = 16;
    let per_batch = 10;

    let handles: Vec<_> = (0..writers)
        .map(|w| {
            let engine = engine.clone();
            tokio::spawn(async move {
                let mut batch = String::new();
                for i in 0..per_batch {
                    batch.push_str(&format!("add node key=w{}-n{} set writer={};\n", w, i, w));
                }
                for i in 1..per_batch {
                    batch.push_str(&format!(
                        "add edge from=w{0}-n{1}, to=w{0}-n{2}, type=next;\n",
                        w,
                        i - 1,
                        i
                    ));
                }
                engine.execute_batch(&batch).await
            })
        })
        .collect();

    for result in join_all(handles).await {
        assert!(result.unwrap().is_ok());
    }

    let map = engine.map_snapshot().await;
    assert_eq!(map.node_count(), writers * per_batch);
    assert_eq!(map.edge_count(), writers * (per_batch - 1));

    let result = engine.execute("select (writer=3);").await;
    assert_eq!(result.nodes.len(), per_batch);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_conflicting_writers_commit_once() {
    let engine = engine_with(EngineConfig::default());

    let handles: Vec<_> = (0..8)
        .map(|w| {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .execute_batch(&format!("add node key=w{}; add node key=shared;", w))
                    .await
            })
        })
        .collect();

    let results: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();

    let committed = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(committed, 1);
    assert!(results
        .iter()
        .filter(|r| !r.is_ok())
        .all(|r| r.status.code == StatusCode::Conflict));

    // losers rolled back their first statement too
    assert_eq!(engine.map_snapshot().await.node_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_readers_see_whole_batches() {
    let engine = engine_with(EngineConfig::default());
    engine.execute("add node key=seed set group=g;").await;

    let writer = {
        let engine = engine.clone();
        tokio::spawn(async move {
            for i in 0..20 {
                let batch = format!(
                    "add node key=a{0} set group=g; add node key=b{0} set group=g;",
                    i
                );
                assert!(engine.execute_batch(&batch).await.is_ok());
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move {
                for _ in 0..20 {
                    let result = engine.execute("select (group=g);").await;
                    assert!(result.is_ok());
                    // seed plus whole pairs only
                    assert_eq!(result.nodes.len() % 2, 1);
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    writer.await.unwrap();
    for reader in join_all(readers).await {
        reader.unwrap();
    }
    assert_eq!(engine.map_snapshot().await.node_count(), 41);
}
