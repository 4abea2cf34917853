//! KiCad code-execution gateway.
//!
//! Exposes an MCP server with two tools: `execute_kicad_code`, which runs a
//! KiScript snippet against the board open in KiCad, and
//! `read_kicad_api_docs`, which serves the documentation the snippets are
//! written from. The same documentation is published as `kicad-api://`
//! resources.

pub mod bridge;
pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod mcp;
pub mod reporter;
pub mod session;

pub use catalog::{DiscoveryError, ResourceCatalog, ResourceEntry};
pub use config::{ConfigError, GatewayConfig};
pub use error::{GatewayError, GatewayResult};
pub use executor::{ExecutionEngine, ExecutionRequest, ExecutionResult, ExecutionStatus};
pub use mcp::{build_server, McpServer};
pub use reporter::{Report, ResultReporter};
pub use session::{SessionError, SessionGateway};
