mod cli;
mod logging;
mod mcp;
mod schema;

use anyhow::Context;
use clap::Parser;
use cli::Args;
use logging::init_tracing;
use mcp::GateHandler;
use rmcp::model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo};
use rmcp::ServiceExt;
use std::sync::Arc;
use test_gate::{DispatchTable, Pipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _file_guard = init_tracing(args.log_dir.as_deref())?;

    let config = args.gate_config().context("failed to load configuration")?;
    tracing::info!(
        event = "server.start",
        project_root = %config.project_root.display(),
        runner = %config.runner.program,
        json_report = config.runner.json_report,
        default_timeout_secs = config.limits.default_timeout_secs,
    );
    let pipeline = Arc::new(Pipeline::new(config)?);

    let server_info = ServerInfo {
        protocol_version: ProtocolVersion::default(),
        capabilities: ServerCapabilities::builder().enable_tools().build(),
        server_info: Implementation::from_build_env(),
        instructions: Some(
            "Use discover_tests to list the project's tests and execute_tests to run them. \
             Failing tests are returned as results; errors mean the run itself did not happen."
                .to_string(),
        ),
    };
    let handler = GateHandler::new(pipeline, DispatchTable::new(), server_info);

    let service = handler
        .serve(rmcp::transport::stdio())
        .await
        .context("failed to start MCP server")?;
    service.waiting().await?;
    tracing::info!(event = "server.stop");
    Ok(())
}
