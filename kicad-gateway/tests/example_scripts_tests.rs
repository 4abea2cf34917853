use std::sync::Arc;

use kicad_gateway::catalog::ResourceCatalog;
use kicad_gateway::config::ExecutionConfig;
use kicad_gateway::executor::{ExecutionEngine, ExecutionRequest, ExecutionResult};
use kicad_gateway::session::{MemoryBackend, SessionGateway};
use pretty_assertions::assert_eq;

fn harness() -> (Arc<MemoryBackend>, ExecutionEngine) {
    let backend = Arc::new(MemoryBackend::demo());
    let gateway = Arc::new(SessionGateway::new(backend.clone()));
    (backend, ExecutionEngine::new(gateway, ExecutionConfig::default()))
}

async fn run_example(engine: &ExecutionEngine, name: &str) -> ExecutionResult {
    let catalog = ResourceCatalog::builtin();
    let source = &catalog
        .get(&format!("kicad-api://examples/{name}"))
        .unwrap()
        .content;
    let result = engine
        .execute(ExecutionRequest::new(source.clone()).with_description(name))
        .await
        .unwrap();
    assert!(result.is_success(), "{name}: {:?}", result.error);
    assert!(result.abandoned_commits.is_empty(), "{name} left a commit open");
    result
}

#[tokio::test]
async fn test_every_builtin_example_runs_on_the_demo_board() {
    let catalog = ResourceCatalog::builtin();
    for name in catalog.example_names() {
        let (_, engine) = harness();
        let result = run_example(&engine, name).await;
        assert!(result.return_value_repr.is_some(), "{name} returned nothing");
    }
}

#[tokio::test]
async fn test_board_info() {
    let (_, engine) = harness();
    let result = run_example(&engine, "board_info").await;
    assert!(result
        .stdout_text
        .starts_with("Board: demo.kicad_pcb (2 copper layers)\n"));
    assert!(result.stdout_text.contains("  footprint_count: 7\n"));
    assert!(result.stdout_text.contains("  1: GND\n"));
}

#[tokio::test]
async fn test_create_via_grid() {
    let (backend, engine) = harness();
    let result = run_example(&engine, "create_via_grid").await;
    assert_eq!(result.return_value_repr.as_deref(), Some("9"));
    assert_eq!(result.stdout_text, "Created 9 vias on GND\n");

    let document = backend.document().unwrap();
    assert_eq!(document.vias.len(), 10);
    assert_eq!(backend.history()[0].message, "Add GND via grid");
}

#[tokio::test]
async fn test_adjust_pad_clearance() {
    let (backend, engine) = harness();
    let result = run_example(&engine, "adjust_pad_clearance").await;
    assert_eq!(result.return_value_repr.as_deref(), Some("5"));
    assert_eq!(
        result.stdout_text,
        "Updated 5 GND pads to 0.2 mm clearance\n"
    );

    let document = backend.document().unwrap();
    let overridden = document
        .footprints
        .iter()
        .flat_map(|fp| fp.pads.iter())
        .filter(|pad| pad.copper_clearance_override == Some(200_000))
        .count();
    assert_eq!(overridden, 5);
}

#[tokio::test]
async fn test_list_gnd_pads() {
    let (_, engine) = harness();
    let result = run_example(&engine, "list_gnd_pads").await;
    assert_eq!(result.return_value_repr.as_deref(), Some("5"));
    assert_eq!(
        result.stdout_text,
        "C1: 2 (GND)\nC2: 2 (GND)\nJ1: 2 (GND)\nR3: 1 (GNDA), 2 (GND)\nU1: 2 (GND)\n"
    );
}

#[tokio::test]
async fn test_organize_footprints_in_grid() {
    let (backend, engine) = harness();
    let result = run_example(&engine, "organize_footprints_in_grid").await;
    assert_eq!(result.return_value_repr.as_deref(), Some("7"));
    let lines: Vec<&str> = result.stdout_text.lines().collect();
    assert_eq!(lines[0], "C1: (20.0, 20.0) mm");
    assert_eq!(lines[6], "U1: (40.0, 30.0) mm");

    let document = backend.document().unwrap();
    let u1 = document
        .footprints
        .iter()
        .find(|fp| fp.reference == "U1")
        .unwrap();
    assert_eq!(u1.position.x, 40_000_000);
    assert_eq!(u1.pads[0].position, u1.position);
}
