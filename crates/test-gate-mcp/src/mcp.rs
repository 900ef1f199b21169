use crate::schema::input_schema;
use protocol::{DetailLevel, ExecutionResponse, ProtocolError, RunMode, RunResult, TestStatus};
use rmcp::{
    model::{
        CallToolRequestParam, CallToolResult, Content, ErrorCode, ListToolsResult,
        PaginatedRequestParam, ServerInfo, Tool, ToolAnnotations,
    },
    ErrorData as McpError, RoleServer, ServerHandler,
};
use serde_json::Value;
use std::sync::Arc;
use test_gate::{DispatchTable, Pipeline, Route};

pub(crate) struct GateHandler {
    pipeline: Arc<Pipeline>,
    dispatch: DispatchTable,
    server_info: ServerInfo,
}

impl GateHandler {
    pub(crate) fn new(pipeline: Arc<Pipeline>, dispatch: DispatchTable, server_info: ServerInfo) -> Self {
        Self {
            pipeline,
            dispatch,
            server_info,
        }
    }

    fn tool_definition(&self, route: &Route) -> Tool {
        let schema = input_schema(route.mode, self.pipeline.config());
        Tool {
            name: route.name.into(),
            description: Some(route.description.into()),
            input_schema: Arc::new(schema),
            output_schema: None,
            title: Some(route.title.to_string()),
            annotations: Some(ToolAnnotations {
                read_only_hint: Some(route.mode == RunMode::Discover),
                destructive_hint: Some(false),
                open_world_hint: Some(false),
                idempotent_hint: Some(route.mode == RunMode::Discover),
                title: Some(route.title.to_string()),
            }),
            icons: None,
        }
    }
}

impl ServerHandler for GateHandler {
    fn get_info(&self) -> ServerInfo {
        self.server_info.clone()
    }

    fn list_tools(
        &self,
        _: Option<PaginatedRequestParam>,
        _: rmcp::service::RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<ListToolsResult, McpError>> + Send + '_ {
        async move {
            let tools = self
                .dispatch
                .routes()
                .iter()
                .map(|route| self.tool_definition(route))
                .collect();
            Ok(ListToolsResult::with_all_items(tools))
        }
    }

    fn call_tool(
        &self,
        request: CallToolRequestParam,
        context: rmcp::service::RequestContext<RoleServer>,
    ) -> impl std::future::Future<Output = Result<CallToolResult, McpError>> + Send + '_ {
        async move {
            let route = self.dispatch.resolve(&request.name).ok_or_else(|| {
                McpError::invalid_params(format!("unknown tool: {}", request.name), None)
            })?;
            let mode = route.mode;
            let payload = request.arguments.map(Value::Object).unwrap_or(Value::Null);
            let pipeline = Arc::clone(&self.pipeline);
            let cancel = context.ct.clone();

            // A panic inside one request must not take the server down.
            let response = tokio::spawn(async move { pipeline.handle(mode, &payload, cancel).await })
                .await
                .map_err(|err| McpError::internal_error(format!("request task failed: {err}"), None))?;
            response_to_tool_result(response)
        }
    }
}

fn response_to_tool_result(response: ExecutionResponse) -> Result<CallToolResult, McpError> {
    match response {
        ExecutionResponse::Result(result) => {
            let structured = serde_json::to_value(&result).map_err(|err| {
                McpError::internal_error(format!("failed to encode result: {err}"), None)
            })?;
            Ok(CallToolResult {
                content: vec![Content::text(result_text(&result))],
                is_error: Some(false),
                meta: None,
                structured_content: Some(structured),
            })
        }
        ExecutionResponse::Error(error) => Err(protocol_error_to_mcp(error)),
    }
}

fn protocol_error_to_mcp(error: ProtocolError) -> McpError {
    let data = serde_json::to_value(&error).ok();
    McpError::new(ErrorCode(error.code), error.message, data)
}

fn result_text(result: &RunResult) -> String {
    let summary = &result.summary;
    let mut message = vec![
        format!("exit_code: {}", result.exit_code),
        format!(
            "summary: {} total, {} passed, {} failed, {} skipped, {} errors in {:.2}s",
            summary.total,
            summary.passed,
            summary.failed,
            summary.skipped,
            summary.errors,
            summary.duration_secs
        ),
    ];
    for test in result
        .tests
        .iter()
        .filter(|test| matches!(test.status, TestStatus::Failed | TestStatus::Error))
    {
        match test.message.as_deref() {
            Some(reason) => message.push(format!("{:?} {}: {reason}", test.status, test.node_id)),
            None => message.push(format!("{:?} {}", test.status, test.node_id)),
        }
    }
    for test in &result.discovered {
        message.push(test.node_id.clone());
    }
    for error in &result.collection_errors {
        message.push(format!("collection error {}: {}", error.location, error.reason));
    }
    // Parsed entries already say what stdout says; repeat it only when
    // nothing finer could be extracted.
    if matches!(result.detail, DetailLevel::CountsOnly | DetailLevel::RawOnly)
        && !result.stdout.is_empty()
    {
        message.push(format!("stdout: {}", result.stdout));
    }
    message.join("\n")
}
