use std::sync::Arc;
use std::time::{Duration, Instant};

use kicad_gateway::config::{ExecutionConfig, MAX_CALL_DEPTH_CEILING};
use kicad_gateway::executor::{ExecutionEngine, ExecutionRequest, ExecutionStatus};
use kicad_gateway::session::{MemoryBackend, SessionError, SessionGateway};
use pretty_assertions::assert_eq;

fn engine_with(config: ExecutionConfig) -> (Arc<MemoryBackend>, ExecutionEngine) {
    let backend = Arc::new(MemoryBackend::demo());
    let gateway = SessionGateway::new(backend.clone());
    (backend, ExecutionEngine::new(Arc::new(gateway), config))
}

fn engine() -> (Arc<MemoryBackend>, ExecutionEngine) {
    engine_with(ExecutionConfig::default())
}

fn via_count(backend: &MemoryBackend) -> usize {
    backend.document().expect("document open").vias.len()
}

#[tokio::test]
async fn test_print_and_trailing_expression() {
    let (_, engine) = engine();
    let result = engine
        .execute(ExecutionRequest::new("print('hi'); 2+2"))
        .await
        .unwrap();
    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(result.stdout_text, "hi\n");
    assert_eq!(result.return_value_repr.as_deref(), Some("4"));
    assert_eq!(result.error, None);
}

#[tokio::test]
async fn test_output_keeps_print_order() {
    let (_, engine) = engine();
    let result = engine
        .execute(ExecutionRequest::new(
            "for i in range(3) { print(i) }\nprint('done')",
        ))
        .await
        .unwrap();
    assert!(result.is_success());
    assert_eq!(result.stdout_text, "0\n1\n2\ndone\n");
    assert_eq!(result.return_value_repr, None);
}

#[tokio::test]
async fn test_undefined_name_is_a_name_error() {
    let (_, engine) = engine();
    let result = engine
        .execute(ExecutionRequest::new("undefined_name"))
        .await
        .unwrap();
    assert_eq!(result.status, ExecutionStatus::Error);
    assert_eq!(result.error_kind(), Some("NameError"));
    let error = result.error.unwrap();
    assert!(error.message.contains("undefined_name"));
}

#[tokio::test]
async fn test_output_before_a_fault_is_kept() {
    let (_, engine) = engine();
    let code = "print('before')\ndef f() {\n    return 1 / 0\n}\nf()";
    let result = engine.execute(ExecutionRequest::new(code)).await.unwrap();
    assert_eq!(result.error_kind(), Some("ZeroDivisionError"));
    assert_eq!(result.stdout_text, "before\n");
    let traceback = result.error.unwrap().traceback;
    assert!(traceback.contains("in f"));
    assert!(traceback.contains("return 1 / 0"));
}

#[tokio::test]
async fn test_syntax_errors_are_reported() {
    let (_, engine) = engine();
    let result = engine
        .execute(ExecutionRequest::new("if True {\n    print('x')\n"))
        .await
        .unwrap();
    assert_eq!(result.error_kind(), Some("SyntaxError"));
}

#[tokio::test]
async fn test_imports_are_rejected() {
    let (_, engine) = engine();
    let result = engine
        .execute(ExecutionRequest::new("import os"))
        .await
        .unwrap();
    assert_eq!(result.status, ExecutionStatus::Error);
}

#[tokio::test]
async fn test_namespace_does_not_survive_between_requests() {
    let (_, engine) = engine();
    let first = engine.execute(ExecutionRequest::new("x = 41")).await.unwrap();
    assert!(first.is_success());
    let second = engine.execute(ExecutionRequest::new("x + 1")).await.unwrap();
    assert_eq!(second.error_kind(), Some("NameError"));
}

#[tokio::test]
async fn test_fault_inside_commit_keeps_direct_mutations() {
    let (backend, engine) = engine();
    let before = via_count(&backend);
    let code = r#"
board = get_board()
board.create_items([Via(position=Vector2.from_xy_mm(1, 1), net="GND")])
commit = board.begin_commit()
board.create_items([Via(position=Vector2.from_xy_mm(2, 2))])
undefined_name
"#;
    let result = engine.execute(ExecutionRequest::new(code)).await.unwrap();
    assert_eq!(result.error_kind(), Some("NameError"));
    assert_eq!(result.abandoned_commits.len(), 1);
    assert_eq!(via_count(&backend), before + 1);
    assert!(!backend.has_open_commit());
}

#[tokio::test]
async fn test_rejected_push_is_a_commit_error() {
    let (backend, engine) = engine();
    backend.reject_next_push("board is locked");
    let before = via_count(&backend);
    let code = r#"
board = get_board()
commit = board.begin_commit()
board.create_items(Via(position=Vector2.from_xy_mm(5, 5)))
board.push_commit(commit, "add via")
"#;
    let result = engine.execute(ExecutionRequest::new(code)).await.unwrap();
    assert_eq!(result.error_kind(), Some("CommitError"));
    assert!(result.error.unwrap().message.contains("board is locked"));
    assert_eq!(result.abandoned_commits.len(), 1);
    assert_eq!(via_count(&backend), before);
}

#[tokio::test]
async fn test_infinite_loop_hits_the_deadline() {
    let (_, engine) = engine_with(ExecutionConfig {
        timeout_ms: 200,
        ..ExecutionConfig::default()
    });
    let started = Instant::now();
    let result = engine
        .execute(ExecutionRequest::new("while True { pass }"))
        .await
        .unwrap();
    assert_eq!(result.error_kind(), Some("TimeoutError"));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
async fn test_deep_recursion_is_a_recursion_error() {
    let (_, engine) = engine_with(ExecutionConfig {
        max_call_depth: 50,
        ..ExecutionConfig::default()
    });
    let code = "def down(n) {\n    return down(n + 1)\n}\ndown(0)";
    let result = engine.execute(ExecutionRequest::new(code)).await.unwrap();
    assert_eq!(result.error_kind(), Some("RecursionError"));
}

#[tokio::test]
async fn test_recursion_at_the_default_and_largest_depth_limits() {
    let code = "def down(n) {\n    return down(n + 1)\n}\ndown(0)";
    for depth in [ExecutionConfig::default().max_call_depth, MAX_CALL_DEPTH_CEILING] {
        let (_, engine) = engine_with(ExecutionConfig {
            max_call_depth: depth,
            ..ExecutionConfig::default()
        });
        let result = engine.execute(ExecutionRequest::new(code)).await.unwrap();
        assert_eq!(result.error_kind(), Some("RecursionError"), "depth {depth}");
    }
}

#[tokio::test]
async fn test_runaway_builtins_and_cycles_stay_contained() {
    let (_, engine) = engine_with(ExecutionConfig {
        timeout_ms: 200,
        ..ExecutionConfig::default()
    });
    let started = Instant::now();
    let result = engine
        .execute(ExecutionRequest::new("sum(range(10**12))"))
        .await
        .unwrap();
    assert_eq!(result.error_kind(), Some("TimeoutError"));
    assert!(started.elapsed() < Duration::from_secs(10));

    let result = engine
        .execute(ExecutionRequest::new(
            "a = []\na.append(a)\nb = []\nb.append(b)\na == b",
        ))
        .await
        .unwrap();
    assert_eq!(result.error_kind(), Some("RecursionError"));

    let result = engine
        .execute(ExecutionRequest::new(
            "list(range(-9223372036854775807, 9223372036854775807, 4611686018427387904))",
        ))
        .await
        .unwrap();
    assert!(result.is_success(), "{:?}", result.error);
}

#[tokio::test]
async fn test_unreachable_backend_runs_nothing() {
    let (backend, engine) = engine();
    backend.set_reachable(false);
    let before = backend.document().unwrap();

    let err = engine
        .execute(ExecutionRequest::new(
            "get_board().create_items(Via(position=Vector2(0, 0)))",
        ))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::Unavailable(_)));
    assert_eq!(backend.document().unwrap(), before);
}

#[tokio::test]
async fn test_closed_document_is_unavailable() {
    let (backend, engine) = engine();
    backend.close_document();
    let err = engine
        .execute(ExecutionRequest::new("1"))
        .await
        .unwrap_err();
    assert!(err.is_unavailable());
}

#[tokio::test]
async fn test_requests_are_serialized() {
    let (_, engine) = engine();
    let engine = Arc::new(engine);
    let code = "board = get_board()\nc = board.begin_commit()\nfor i in range(2000) { pass }\nboard.drop_commit(c)\n'ok'";

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.execute(ExecutionRequest::new(code)).await })
        })
        .collect();
    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(result.return_value_repr.as_deref(), Some("'ok'"));
    }
}
