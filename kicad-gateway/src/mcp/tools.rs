//! The gateway's two tools and the server assembled from config.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::McpServer;
use crate::catalog::ResourceCatalog;
use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::executor::{ExecutionEngine, ExecutionRequest};
use crate::reporter::{Report, ResultReporter};
use crate::session::{open_backend, SessionGateway};

const EXECUTE_DESCRIPTION: &str = "\
Execute a KiScript snippet against the board open in KiCad.

Read the API documentation first (read_kicad_api_docs or the kicad-api:// \
resources): start with \"overview\", then \"board\" and \"board_types\", and \
check \"examples\" for a similar script.

Each call runs in a fresh namespace. Output from print() and warn() is \
captured; the value of a trailing expression is returned. Group edits with \
board.begin_commit() / board.push_commit(commit, message) so they form one \
undo step. Errors are reported with their kind, message and traceback.";

const DOCS_DESCRIPTION: &str = "\
Read KiCad API documentation before writing code.

Available documentation:
- \"overview\" - quick reference with common patterns (start here)
- \"language\" - KiScript syntax and builtins
- \"board\" - Board methods (get_footprints, get_nets, create_items, commits)
- \"board_types\" - Footprint, Pad, Track, Via, Zone, Net
- \"geometry\" - Vector2, Angle, unit helpers, enums
- \"namespace\" - every name available to a snippet
- \"examples\" - list the example scripts
- \"example:NAME\" - one example, e.g. \"example:create_via_grid\"";

#[derive(Debug, Deserialize)]
struct ExecuteArgs {
    code: String,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DocsArgs {
    doc_name: String,
}

fn parse_args<T: for<'de> Deserialize<'de>>(tool: &str, arguments: Value) -> GatewayResult<T> {
    serde_json::from_value(arguments)
        .map_err(|e| GatewayError::InvalidParams(format!("{tool}: {e}")))
}

/// Register `execute_kicad_code` and `read_kicad_api_docs`.
pub fn register_gateway_tools(
    server: &mut McpServer,
    engine: Arc<ExecutionEngine>,
    catalog: Arc<ResourceCatalog>,
) {
    let reporter = Arc::new(ResultReporter::new(engine.config().max_output_chars));

    server.register_tool(
        "execute_kicad_code",
        EXECUTE_DESCRIPTION,
        json!({
            "type": "object",
            "properties": {
                "code": {
                    "type": "string",
                    "description": "KiScript source to execute"
                },
                "description": {
                    "type": ["string", "null"],
                    "description": "What the code does, for the log and the report header"
                }
            },
            "required": ["code"]
        }),
        Box::new(move |arguments| {
            let engine = engine.clone();
            let reporter = reporter.clone();
            Box::pin(async move {
                let args: ExecuteArgs = parse_args("execute_kicad_code", arguments)?;
                let mut request = ExecutionRequest::new(args.code);
                if let Some(description) = args.description {
                    request = request.with_description(description);
                }
                let result = engine.execute(request).await?;
                Ok(reporter.format(&result))
            })
        }),
    );

    server.register_tool(
        "read_kicad_api_docs",
        DOCS_DESCRIPTION,
        json!({
            "type": "object",
            "properties": {
                "doc_name": {
                    "type": "string",
                    "description": "Documentation name, e.g. \"overview\" or \"example:board_info\""
                }
            },
            "required": ["doc_name"]
        }),
        Box::new(move |arguments| {
            let catalog = catalog.clone();
            Box::pin(async move {
                let args: DocsArgs = parse_args("read_kicad_api_docs", arguments)?;
                Ok(match catalog.resolve_doc_name(&args.doc_name) {
                    Ok(entry) => Report {
                        text: entry.content.clone(),
                        is_error: false,
                    },
                    Err(e) => Report {
                        text: e.to_string(),
                        is_error: true,
                    },
                })
            })
        }),
    );
}

/// Assemble the server described by `config`: backend, gateway, engine,
/// catalog and tools.
pub fn build_server(config: &GatewayConfig) -> GatewayResult<McpServer> {
    config.validate()?;
    let backend = open_backend(&config.session)?;
    let gateway = Arc::new(SessionGateway::new(backend));
    let engine = Arc::new(ExecutionEngine::new(gateway, config.execution.clone()));
    let catalog = Arc::new(ResourceCatalog::build(
        config.catalog.examples_dir.as_deref(),
    ));

    let mut server = McpServer::new(
        &config.server.name,
        env!("CARGO_PKG_VERSION"),
        catalog.clone(),
    );
    register_gateway_tools(&mut server, engine, catalog);
    info!(
        "Server '{}' ready with {} tools",
        config.server.name,
        server.tool_count()
    );
    Ok(server)
}
