//! Integration tests for the conversion engine's public surface.
//!
//! Everything here runs against the mock browser factory and mock
//! renderer (the `test-utils` feature), so the suites exercise the
//! engine's orchestration — strategy, pooling, scheduling, reporting —
//! without a Chrome binary.

use std::sync::Arc;

use printeer::factory::mock::MockBrowserFactory;
use printeer::prelude::*;
use printeer::renderer::mock::MockRenderer;

/// Route engine logs through the test harness; `RUST_LOG=debug cargo test`
/// then shows the pool/scheduler traffic of a failing test.
fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

struct TestEngine {
    engine: Printeer,
    factory: Arc<MockBrowserFactory>,
    renderer: Arc<MockRenderer>,
    dir: tempfile::TempDir,
}

fn engine_with_renderer(renderer: MockRenderer) -> TestEngine {
    init_logging();
    let factory = Arc::new(MockBrowserFactory::new());
    let renderer = Arc::new(renderer);
    let dir = tempfile::tempdir().unwrap();
    // Pin the environment: host CI/container markers must not reshape the
    // config profile under test.
    std::fs::write(
        dir.path().join(".printeerrc.json"),
        r#"{ "environment": "test", "browser": { "pool": { "max": 2 } } }"#,
    )
    .unwrap();

    let engine = Printeer::builder()
        .base_dir(dir.path().to_path_buf())
        .factory(Arc::clone(&factory) as Arc<dyn BrowserFactory>)
        .renderer(Arc::clone(&renderer) as Arc<dyn Renderer>)
        .disable_monitoring()
        .build()
        .unwrap();

    TestEngine {
        engine,
        factory,
        renderer,
        dir,
    }
}

/// Oneshot single conversion: a PDF lands at the requested path, the
/// pool stays empty, and no browser process survives the call.
#[tokio::test]
async fn test_oneshot_single_conversion() {
    let t = engine_with_renderer(MockRenderer::new());
    let output = t.dir.path().join("out.pdf");

    let descriptor = t
        .engine
        .convert("http://localhost:4000/static/simple", &output, None)
        .await
        .unwrap();

    assert_eq!(descriptor.media_type, MediaType::Pdf);
    assert!(std::fs::read(&output).unwrap().starts_with(b"%PDF"));

    let status = t.engine.pool_status();
    assert_eq!(status.total_browsers, 0);
    for state in t.factory.states() {
        assert!(
            !state.alive.load(std::sync::atomic::Ordering::SeqCst),
            "no browser process may remain after a oneshot conversion"
        );
    }
    t.engine.shutdown().await;
}

/// Pooled reuse: two sequential jobs through the pool strategy create
/// one browser and reuse it at least once.
#[tokio::test]
async fn test_pooled_reuse() {
    let t = engine_with_renderer(MockRenderer::new());

    let jobs = vec![
        BatchJob::new("first", "http://localhost/a", "a.pdf"),
        BatchJob::new("second", "http://localhost/b", "b.pdf"),
    ];
    let options = BatchOptions {
        concurrency: 1,
        output_dir: Some(t.dir.path().to_path_buf()),
        ..BatchOptions::default()
    };
    let report = t.engine.run_batch(jobs, options).await.unwrap();

    assert_eq!(report.completed, 2);
    let pool = report.pool.expect("pool insights");
    assert_eq!(pool.created, 1, "one browser serves both jobs");
    assert!(pool.reused >= 1, "the second job must reuse it");
    t.engine.shutdown().await;
}

/// Dependency ordering: A completes before B and C; B and C may
/// interleave freely.
#[tokio::test]
async fn test_dependency_ordering() {
    let t = engine_with_renderer(MockRenderer::new());

    let jobs = vec![
        BatchJob::new("a", "http://localhost/a", "a.pdf"),
        BatchJob::new("b", "http://localhost/b", "b.pdf").depends_on(["a"]),
        BatchJob::new("c", "http://localhost/c", "c.pdf").depends_on(["a"]),
    ];
    let options = BatchOptions {
        concurrency: 4,
        output_dir: Some(t.dir.path().to_path_buf()),
        ..BatchOptions::default()
    };
    let report = t.engine.run_batch(jobs, options).await.unwrap();

    assert_eq!(report.completed, 3);
    assert_eq!(report.total, 3);

    let calls = t.renderer.calls();
    assert_eq!(calls.len(), 3);
    assert!(
        calls[0].ends_with("/a"),
        "a must render before its dependents, got {calls:?}"
    );
    t.engine.shutdown().await;
}

/// Retry then success: the first render attempt fails, the second
/// succeeds, and the result reads completed with retry_count 1.
#[tokio::test]
async fn test_retry_then_success() {
    let t = engine_with_renderer(MockRenderer::failing_first(1));

    let jobs = vec![BatchJob::new("flaky", "http://localhost/x", "x.pdf")];
    let options = BatchOptions {
        retry_attempts: 2,
        output_dir: Some(t.dir.path().to_path_buf()),
        ..BatchOptions::default()
    };
    let report = t.engine.run_batch(jobs, options).await.unwrap();

    let result = report.result("flaky").unwrap();
    assert_eq!(result.status, JobStatus::Completed);
    assert_eq!(result.retry_count, 1);
    assert!(t.dir.path().join("x.pdf").exists());
    t.engine.shutdown().await;
}

/// Cycle detection: a two-job cycle fails before dispatch; nothing is
/// rendered and no results are produced.
#[tokio::test]
async fn test_cycle_detection() {
    let t = engine_with_renderer(MockRenderer::new());

    let jobs = vec![
        BatchJob::new("a", "http://localhost/a", "a.pdf").depends_on(["b"]),
        BatchJob::new("b", "http://localhost/b", "b.pdf").depends_on(["a"]),
    ];
    let result = t.engine.run_batch(jobs, BatchOptions::default()).await;

    match result {
        Err(PrinteerError::CycleDetected { cycle }) => {
            assert_eq!(cycle, vec!["a".to_string(), "b".to_string()]);
        }
        other => panic!("expected cycle_detected, got {other:?}"),
    }
    assert_eq!(t.renderer.call_count(), 0, "no job may execute");
    t.engine.shutdown().await;
}

/// Parametric expansion flows end to end: list variables multiply jobs
/// and every expanded job gets exactly one result.
#[tokio::test]
async fn test_parametric_batch() {
    let t = engine_with_renderer(MockRenderer::new());

    let mut job = BatchJob::new("page", "http://localhost/{lang}", "{lang}.pdf");
    job.variables.insert(
        "lang".to_string(),
        printeer::batch::VariableValue::List(vec!["en".to_string(), "de".to_string()]),
    );
    let options = BatchOptions {
        output_dir: Some(t.dir.path().to_path_buf()),
        ..BatchOptions::default()
    };
    let report = t.engine.run_batch(vec![job], options).await.unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.completed, 2);
    assert!(report.result("page-en").is_some());
    assert!(report.result("page-de").is_some());
    assert!(t.dir.path().join("en.pdf").exists());
    assert!(t.dir.path().join("de.pdf").exists());
    t.engine.shutdown().await;
}

/// Engine shutdown is idempotent and fails fast afterwards.
#[tokio::test]
async fn test_shutdown_idempotent_and_fails_fast() {
    let t = engine_with_renderer(MockRenderer::new());

    t.engine.shutdown().await;
    t.engine.shutdown().await;

    let result = t
        .engine
        .convert("http://localhost/x", t.dir.path().join("x.pdf"), None)
        .await;
    assert!(matches!(result, Err(PrinteerError::ShuttingDown)));
    assert_eq!(t.engine.pool_status().total_browsers, 0);
}

/// The failed-dependency rule: a failed job skips its dependents while
/// independent work completes, and the report accounts for every job
/// exactly once.
#[tokio::test]
async fn test_failed_dependency_skips() {
    // Only the first call fails; with retries off, job "root" fails for
    // good while "free" succeeds.
    let t = engine_with_renderer(MockRenderer::failing_first(1));

    let jobs = vec![
        BatchJob::new("root", "http://localhost/root", "root.pdf").with_priority(10),
        BatchJob::new("child", "http://localhost/child", "child.pdf").depends_on(["root"]),
        BatchJob::new("free", "http://localhost/free", "free.pdf"),
    ];
    let options = BatchOptions {
        concurrency: 1,
        retry_attempts: 0,
        continue_on_error: true,
        output_dir: Some(t.dir.path().to_path_buf()),
        ..BatchOptions::default()
    };
    let report = t.engine.run_batch(jobs, options).await.unwrap();

    assert_eq!(report.result("root").unwrap().status, JobStatus::Failed);
    assert_eq!(report.result("child").unwrap().status, JobStatus::Skipped);
    assert_eq!(report.result("free").unwrap().status, JobStatus::Completed);
    assert_eq!(report.total, 3);
    t.engine.shutdown().await;
}

/// Configuration layering reaches the engine: file values apply and CLI
/// overrides win over them.
#[tokio::test]
async fn test_config_layering_through_engine() {
    init_logging();
    let factory = Arc::new(MockBrowserFactory::new());
    let renderer = Arc::new(MockRenderer::new());
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("printeer.config.yaml"),
        "environment: test\nbrowser:\n  pool:\n    max: 3\nresources:\n  max_memory_mb: 512\n",
    )
    .unwrap();

    let cli = CliOverrides::parse(["--pool-max", "4"]).unwrap();
    let engine = Printeer::builder()
        .base_dir(dir.path().to_path_buf())
        .cli_overrides(cli)
        .factory(Arc::clone(&factory) as Arc<dyn BrowserFactory>)
        .renderer(Arc::clone(&renderer) as Arc<dyn Renderer>)
        .disable_monitoring()
        .build()
        .unwrap();

    let config = engine.config();
    assert_eq!(config.environment, Environment::Test);
    assert_eq!(config.resources.max_memory_mb, 512); // from the file
    assert_eq!(config.browser.pool.max, 4); // CLI wins
    engine.shutdown().await;
}
