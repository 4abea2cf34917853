use std::sync::Arc;

use kicad_gateway::config::ExecutionConfig;
use kicad_gateway::executor::{ExecutionEngine, ExecutionRequest, ExecutionResult};
use kicad_gateway::session::{MemoryBackend, SessionGateway, Vector2};
use pretty_assertions::assert_eq;

struct Harness {
    backend: Arc<MemoryBackend>,
    engine: ExecutionEngine,
}

impl Harness {
    fn new() -> Self {
        let backend = Arc::new(MemoryBackend::demo());
        let gateway = Arc::new(SessionGateway::new(backend.clone()));
        Self {
            engine: ExecutionEngine::new(gateway, ExecutionConfig::default()),
            backend,
        }
    }

    async fn run(&self, code: &str) -> ExecutionResult {
        self.engine
            .execute(ExecutionRequest::new(code))
            .await
            .expect("session available")
    }

    async fn value(&self, code: &str) -> String {
        let result = self.run(code).await;
        assert!(result.is_success(), "{:?}", result.error);
        result.return_value_repr.unwrap_or_default()
    }
}

#[tokio::test]
async fn test_board_queries() {
    let h = Harness::new();
    assert_eq!(
        h.value("[fp.reference for fp in get_board().get_footprints()]").await,
        "['U1', 'R1', 'R2', 'R3', 'C1', 'C2', 'J1']"
    );
    assert_eq!(h.value("KiCad().get_board().name").await, "'demo.kicad_pcb'");
    assert_eq!(h.value("get_board().get_info()['pad_count']").await, "18");
    assert_eq!(h.value("get_board().find_net('nope') is None").await, "True");
    assert_eq!(h.value("get_board().find_net('GND').code").await, "1");
    assert_eq!(
        h.value("get_board().find_footprint('R3').value").await,
        "'0R'"
    );
}

#[tokio::test]
async fn test_unit_helpers_and_geometry() {
    let h = Harness::new();
    assert_eq!(h.value("from_mm(1.5)").await, "1500000");
    assert_eq!(h.value("to_mm(2540000)").await, "2.54");
    assert_eq!(h.value("from_mils(100)").await, "2540000");
    assert_eq!(h.value("Vector2.from_xy_mm(1, 2).to_mm()").await, "(1.0, 2.0)");
    assert_eq!(h.value("Angle(450).normalized().degrees").await, "90.0");
}

#[tokio::test]
async fn test_edits_are_local_until_update_items() {
    let h = Harness::new();
    let code = r#"
board = get_board()
fp = board.find_footprint("R1")
fp.position = Vector2.from_xy_mm(10, 10)
board.find_footprint("R1").position == fp.position
"#;
    assert_eq!(h.value(code).await, "False");

    let code = r#"
board = get_board()
fp = board.find_footprint("R1")
fp.position = Vector2.from_xy_mm(10, 10)
board.update_items([fp])
board.find_footprint("R1").position.to_mm()
"#;
    assert_eq!(h.value(code).await, "(10.0, 10.0)");

    let document = h.backend.document().unwrap();
    let r1 = document
        .footprints
        .iter()
        .find(|fp| fp.reference == "R1")
        .unwrap();
    assert_eq!(r1.pads[0].position, Vector2::from_xy_mm(10.0, 10.0));
}

#[tokio::test]
async fn test_created_items_get_ids_and_can_be_removed() {
    let h = Harness::new();
    let code = r#"
board = get_board()
via = Via(position=Vector2.from_xy_mm(5, 5), net=board.find_net("GND"))
before = via.id
board.create_items([via])
removed = board.remove_items([via.id])
(before, via.id is not None, removed, len(board.get_vias()))
"#;
    assert_eq!(h.value(code).await, "(None, True, 1, 1)");
}

#[tokio::test]
async fn test_invalid_items_leave_the_board_unchanged() {
    let h = Harness::new();
    let before = h.backend.document().unwrap();
    let code = r#"
board = get_board()
good = Via(position=Vector2(0, 0))
bad = Via(position=Vector2(0, 0), diameter=from_mm(0.4), drill_diameter=from_mm(0.8))
board.create_items([good, bad])
"#;
    let result = h.run(code).await;
    assert_eq!(result.error_kind(), Some("SessionError"));
    assert_eq!(h.backend.document().unwrap(), before);
}

#[tokio::test]
async fn test_drop_commit_reverts_grouped_edits() {
    let h = Harness::new();
    let code = r#"
board = get_board()
commit = board.begin_commit()
board.create_items([Track(start=Vector2(0, 0), end=Vector2.from_xy_mm(5, 0))])
inside = len(board.get_tracks())
board.drop_commit(commit)
(inside, len(board.get_tracks()))
"#;
    let result = h.run(code).await;
    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(result.return_value_repr.as_deref(), Some("(4, 3)"));
    assert!(result.abandoned_commits.is_empty());
}

#[tokio::test]
async fn test_pushed_commit_is_recorded() {
    let h = Harness::new();
    let code = r#"
board = get_board()
commit = board.begin_commit()
board.remove_items(board.get_vias())
board.push_commit(commit, "remove vias")
"#;
    let result = h.run(code).await;
    assert!(result.is_success(), "{:?}", result.error);
    let history = h.backend.history();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].message, "remove vias");
    assert!(h.backend.document().unwrap().vias.is_empty());
}

#[tokio::test]
async fn test_nested_commit_is_a_catchable_commit_error() {
    let h = Harness::new();
    let code = r#"
board = get_board()
first = board.begin_commit()
try {
    board.begin_commit()
} except CommitError as e {
    print("refused")
}
board.drop_commit(first)
"#;
    let result = h.run(code).await;
    assert!(result.is_success(), "{:?}", result.error);
    assert_eq!(result.stdout_text, "refused\n");
}

#[tokio::test]
async fn test_attribute_errors() {
    let h = Harness::new();
    let result = h.run("t = get_board().get_tracks()[0]\nt.length = 5").await;
    assert_eq!(result.error_kind(), Some("AttributeError"));

    let result = h.run("get_board().get_vias()[0].colour").await;
    assert_eq!(result.error_kind(), Some("AttributeError"));

    let result = h.run("Via(id='x')").await;
    assert_eq!(result.error_kind(), Some("AttributeError"));
}

#[tokio::test]
async fn test_layers_accept_members_and_names() {
    let h = Harness::new();
    let code = r#"
t = Track(start=Vector2(0, 0), end=Vector2(1000000, 0))
t.layer = "BL_B_Cu"
a = t.layer == BoardLayer.BL_B_Cu
t.layer = BoardLayer.BL_F_Cu
(a, t.layer.name)
"#;
    assert_eq!(h.value(code).await, "(True, 'BL_F_Cu')");

    let result = h.run("Track().layer = 'BL_Top'").await;
    assert_eq!(result.error_kind(), Some("ValueError"));
}
