//! Concurrent access tests for the pool and the engine.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;

use printeer::factory::mock::MockBrowserFactory;
use printeer::prelude::*;
use printeer::renderer::mock::MockRenderer;
use printeer::{BrowserPool, PrinteerError};

/// Route engine logs through the test harness; `RUST_LOG=debug cargo test`
/// then shows the pool/scheduler traffic of a failing test.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn test_config(max: usize) -> EffectiveConfig {
    init_logging();
    let mut config = EffectiveConfig::defaults(Environment::Test);
    config.browser.pool.max = max;
    config.browser.pool.idle_timeout = Duration::from_secs(300);
    config.resources.max_browser_instances = max;
    config
}

/// Many tasks acquiring and releasing against a small pool: every acquire
/// eventually succeeds, the ceiling is never breached, and shutdown
/// leaves nothing behind.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_acquire_release() {
    let factory = Arc::new(MockBrowserFactory::new());
    let pool = Arc::new(BrowserPool::new(
        &test_config(3),
        Arc::clone(&factory) as Arc<dyn BrowserFactory>,
        None,
    ));

    let mut tasks = JoinSet::new();
    for worker in 0..8 {
        let pool = Arc::clone(&pool);
        tasks.spawn(async move {
            for _ in 0..10 {
                let browser = pool
                    .get_browser_with_timeout(Duration::from_secs(10))
                    .await
                    .expect("acquire within timeout");
                tokio::time::sleep(Duration::from_millis(2)).await;
                browser.release().await;
            }
            worker
        });
    }
    while let Some(result) = tasks.join_next().await {
        result.expect("worker must not panic");
    }

    let status = pool.status();
    assert!(status.total_browsers <= 3, "ceiling breached: {status}");
    assert_eq!(status.busy, 0);
    assert!(status.metrics.reused > 0);

    pool.shutdown().await;
    let status = pool.status();
    assert_eq!(status.total_browsers, 0);
    for state in factory.states() {
        assert!(!state.alive.load(std::sync::atomic::Ordering::SeqCst));
    }
}

/// Shutdown racing active borrowers: waiters fail fast, in-flight
/// borrowers' late releases are ignored cleanly, and a second shutdown
/// is a no-op.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shutdown_races_borrowers() {
    let factory = Arc::new(MockBrowserFactory::new());
    let pool = Arc::new(BrowserPool::new(
        &test_config(2),
        Arc::clone(&factory) as Arc<dyn BrowserFactory>,
        None,
    ));

    let a = pool.get_browser().await.unwrap();
    let b = pool.get_browser().await.unwrap();

    let waiter = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.get_browser_with_timeout(Duration::from_secs(30)).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    let shutdown = {
        let pool = Arc::clone(&pool);
        tokio::spawn(async move { pool.shutdown().await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    // Late releases from the borrowers land after shutdown started.
    a.release().await;
    b.release().await;

    shutdown.await.unwrap();
    assert!(matches!(
        waiter.await.unwrap(),
        Err(PrinteerError::ShuttingDown)
    ));

    pool.shutdown().await;
    assert_eq!(pool.status().total_browsers, 0);
}

/// Concurrent oneshot conversions through the engine: all succeed, the
/// request counter returns to zero and no process survives.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_conversions() {
    init_logging();
    let factory = Arc::new(MockBrowserFactory::new());
    let renderer = Arc::new(MockRenderer::new());
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(".printeerrc.json"),
        r#"{ "environment": "test" }"#,
    )
    .unwrap();

    let engine = Arc::new(
        Printeer::builder()
            .base_dir(dir.path().to_path_buf())
            .factory(Arc::clone(&factory) as Arc<dyn BrowserFactory>)
            .renderer(Arc::clone(&renderer) as Arc<dyn Renderer>)
            .disable_monitoring()
            .build()
            .unwrap(),
    );

    let mut tasks = JoinSet::new();
    for i in 0..6 {
        let engine = Arc::clone(&engine);
        let output = dir.path().join(format!("out-{i}.pdf"));
        tasks.spawn(async move {
            engine
                .convert(&format!("http://localhost/page/{i}"), &output, None)
                .await
        });
    }
    while let Some(result) = tasks.join_next().await {
        let descriptor = result.unwrap().unwrap();
        assert_eq!(descriptor.media_type, MediaType::Pdf);
    }

    assert_eq!(engine.monitor().request_count(), 0);
    assert_eq!(renderer.call_count(), 6);
    for state in factory.states() {
        assert!(!state.alive.load(std::sync::atomic::Ordering::SeqCst));
    }
    engine.shutdown().await;
}
