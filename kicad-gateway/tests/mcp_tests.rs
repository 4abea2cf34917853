use std::fs;
use std::sync::Arc;

use kicad_gateway::catalog::ResourceCatalog;
use kicad_gateway::config::{ExecutionConfig, GatewayConfig};
use kicad_gateway::executor::ExecutionEngine;
use kicad_gateway::mcp::{build_server, register_gateway_tools, McpServer};
use kicad_gateway::session::{demo_board, MemoryBackend, SessionGateway};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::BufReader;

async fn exchange(config: &GatewayConfig, requests: &[Value]) -> Vec<Value> {
    let server = build_server(config).unwrap();
    let input: String = requests.iter().map(|r| format!("{r}\n")).collect();
    let mut output = Vec::new();
    server
        .serve(BufReader::new(input.as_bytes()), &mut output)
        .await
        .unwrap();
    String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn call(id: u64, tool: &str, arguments: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "method": "tools/call",
        "params": { "name": tool, "arguments": arguments }
    })
}

fn text(response: &Value) -> &str {
    response["result"]["content"][0]["text"].as_str().unwrap()
}

#[tokio::test]
async fn test_session_handshake_and_listing() {
    let responses = exchange(
        &GatewayConfig::default(),
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "protocolVersion": "2024-11-05",
                "clientInfo": {"name": "test-client", "version": "1"}
            }}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "resources/list"}),
        ],
    )
    .await;

    assert_eq!(responses.len(), 3);
    assert_eq!(
        responses[0]["result"]["serverInfo"]["name"],
        json!("kicad-code-executor")
    );
    let tools: Vec<&str> = responses[1]["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(tools, vec!["execute_kicad_code", "read_kicad_api_docs"]);
    assert_eq!(
        responses[1]["result"]["tools"][0]["inputSchema"]["required"],
        json!(["code"])
    );
    let resources = responses[2]["result"]["resources"].as_array().unwrap();
    assert!(resources
        .iter()
        .any(|r| r["uri"] == json!("kicad-api://examples/create_via_grid")));
}

#[tokio::test]
async fn test_execute_success_and_error() {
    let responses = exchange(
        &GatewayConfig::default(),
        &[
            call(1, "execute_kicad_code", json!({"code": "print('hi'); 2+2"})),
            call(2, "execute_kicad_code", json!({"code": "undefined_name", "description": null})),
        ],
    )
    .await;

    assert_eq!(responses[0]["result"]["isError"], json!(false));
    assert!(text(&responses[0]).contains("Execution Status: SUCCESS"));
    assert!(text(&responses[0]).contains("Output:\nhi\n\nReturn value:\n4"));

    assert_eq!(responses[1]["result"]["isError"], json!(true));
    assert!(text(&responses[1]).contains("Exception Type: NameError"));
}

#[tokio::test]
async fn test_read_docs_tool_and_resources() {
    let responses = exchange(
        &GatewayConfig::default(),
        &[
            call(1, "read_kicad_api_docs", json!({"doc_name": "example:create_via_grid"})),
            call(2, "read_kicad_api_docs", json!({"doc_name": "pcbnew"})),
            json!({"jsonrpc": "2.0", "id": 3, "method": "resources/read",
                   "params": {"uri": "kicad-api://namespace"}}),
            json!({"jsonrpc": "2.0", "id": 4, "method": "resources/read",
                   "params": {"uri": "kicad-api://missing"}}),
        ],
    )
    .await;

    assert!(text(&responses[0]).contains("board.begin_commit()"));
    assert_eq!(responses[1]["result"]["isError"], json!(true));
    let namespace = responses[2]["result"]["contents"][0]["text"].as_str().unwrap();
    assert!(namespace.contains("## get_board"));
    assert_eq!(responses[3]["error"]["code"], json!(-32002));
}

#[tokio::test]
async fn test_board_file_and_examples_dir() {
    let dir = TempDir::new().unwrap();
    let board_path = dir.path().join("board.json");
    fs::write(&board_path, serde_json::to_string(&demo_board()).unwrap()).unwrap();

    let mut config = GatewayConfig::default();
    config.session.board_file = Some(board_path);
    config.session.persist_on_push = true;
    config.catalog.examples_dir = Some(dir.path().to_path_buf());
    fs::write(dir.path().join("count_vias.kis"), "# Count vias\nlen(get_board().get_vias())\n").unwrap();

    let responses = exchange(
        &config,
        &[
            call(1, "read_kicad_api_docs", json!({"doc_name": "example:count_vias"})),
            call(2, "execute_kicad_code", json!({"code": r#"
board = get_board()
commit = board.begin_commit()
board.create_items(Via(position=Vector2.from_xy_mm(3, 3)))
board.push_commit(commit, "one more via")
len(board.get_vias())
"#})),
        ],
    )
    .await;

    assert_eq!(text(&responses[0]), "# Count vias\nlen(get_board().get_vias())\n");
    assert!(text(&responses[1]).contains("Return value:\n2"));

    let saved: Value = serde_json::from_str(&fs::read_to_string(dir.path().join("board.json")).unwrap()).unwrap();
    assert_eq!(saved["vias"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unknown_tool_is_invalid_params() {
    let responses = exchange(
        &GatewayConfig::default(),
        &[call(1, "delete_everything", json!({}))],
    )
    .await;
    assert_eq!(responses[0]["error"]["code"], json!(-32602));
}

#[tokio::test]
async fn test_unreachable_kicad_is_a_session_error() {
    let backend = Arc::new(MemoryBackend::demo());
    backend.set_reachable(false);
    let engine = Arc::new(ExecutionEngine::new(
        Arc::new(SessionGateway::new(backend.clone())),
        ExecutionConfig::default(),
    ));
    let catalog = Arc::new(ResourceCatalog::builtin());
    let mut server = McpServer::new("kicad-gateway", "test", catalog.clone());
    register_gateway_tools(&mut server, engine, catalog);

    let line = call(1, "execute_kicad_code", json!({"code": "print('never')"})).to_string();
    let response = serde_json::to_value(server.handle_line(&line).await.unwrap()).unwrap();
    assert_eq!(response["error"]["code"], json!(-32001));
    assert!(response.get("result").is_none());
}

#[tokio::test]
async fn test_missing_board_file_fails_at_startup() {
    let dir = TempDir::new().unwrap();
    let mut config = GatewayConfig::default();
    config.session.board_file = Some(dir.path().join("absent.json"));
    assert!(build_server(&config).is_err());
}
