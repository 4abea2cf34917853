use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use kicad_gateway::config::{BackendKind, GatewayConfig};
use kicad_gateway::mcp::build_server;

#[derive(Parser, Debug)]
#[command(
    version,
    about = "KiCad code-execution gateway - runs KiScript snippets against the open board over MCP (stdio)"
)]
struct Args {
    /// TOML config file
    #[arg(short, long, env = "KICAD_GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Board JSON file for the in-memory backend
    #[arg(long, env = "KICAD_GATEWAY_BOARD")]
    board: Option<PathBuf>,

    /// JSON-RPC endpoint of the KiCad bridge; selects the bridge backend
    #[arg(long, env = "KICAD_GATEWAY_BRIDGE_URL")]
    bridge_url: Option<String>,

    /// Directory of extra `*.kis` example scripts
    #[arg(long, env = "KICAD_GATEWAY_EXAMPLES_DIR")]
    examples_dir: Option<PathBuf>,

    /// Per-execution deadline in milliseconds (0 disables it)
    #[arg(long, env = "KICAD_GATEWAY_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> anyhow::Result<GatewayConfig> {
        let mut config = match &self.config {
            Some(path) => GatewayConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => GatewayConfig::default(),
        };

        if let Some(board) = self.board {
            config.session.backend = BackendKind::Memory;
            config.session.board_file = Some(board);
        }
        if let Some(url) = self.bridge_url {
            config.session.backend = BackendKind::Bridge;
            config.session.bridge_url = url;
        }
        if let Some(dir) = self.examples_dir {
            config.catalog.examples_dir = Some(dir);
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.execution.timeout_ms = timeout_ms;
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "kicad_gateway=debug"
    } else {
        "kicad_gateway=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    // stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = args.into_config()?;
    info!(
        "Starting with {:?} backend, timeout {} ms",
        config.session.backend, config.execution.timeout_ms
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building the tokio runtime")?;

    let server = build_server(&config).context("starting the gateway")?;
    runtime.block_on(server.run_stdio())?;
    Ok(())
}
