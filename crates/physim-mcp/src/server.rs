use std::io::{self, BufRead, Write};

use serde_json::{json, Value};
use tracing::{debug, error};

use physim_core::Sampler;

use crate::protocol::{JsonRpcMessage, JsonRpcResponse, PARSE_ERROR};
use crate::tools::{self, McpState};

const SERVER_NAME: &str = "physim";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");
const PROTOCOL_VERSION: &str = "2024-11-05";

pub const DEFAULT_INSTRUCTIONS: &str = "\
physim turns physics problem statements into runnable simulations.\n\
\n\
SOLVE (physim_solve) or LOAD (physim_load) a solution first. Its sampler routine runs \
immediately and produces time-stamped samples (t, x, y and optional z, velocities, energy, \
momenta).\n\
\n\
EXPLORE: physim_set_parameter changes one interactive input and recomputes the samples. \
Failures keep the previous samples.\n\
\n\
EDIT: physim_edit_code drafts new routine text, physim_apply_code commits it only if it \
produces valid samples, physim_reset_code discards drafts.\n\
\n\
INSPECT: physim_samples, physim_charts and physim_frame read the current samples.";

/// Run the MCP server on stdio. Blocks until stdin is closed.
///
/// Requests are handled one at a time against the single session in
/// `state`.
pub fn run_server<S: Sampler>(state: &mut McpState<S>, instructions: &str) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                error!("stdin read error: {e}");
                break;
            }
        };

        if let Some(response) = handle_line(state, instructions, &line) {
            write_response(&mut stdout, &response)?;
        }
    }

    Ok(())
}

/// Handle one line of input. Notifications and blank lines get no reply.
pub(crate) fn handle_line<S: Sampler>(
    state: &mut McpState<S>,
    instructions: &str,
    line: &str,
) -> Option<JsonRpcResponse> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let msg: JsonRpcMessage = match serde_json::from_str(line) {
        Ok(m) => m,
        Err(e) => {
            error!("invalid JSON-RPC: {e}");
            return Some(JsonRpcResponse::err(
                Value::Null,
                PARSE_ERROR,
                format!("parse error: {e}"),
            ));
        }
    };

    let method = msg.method.as_deref().unwrap_or("");
    debug!("MCP request: {method}");

    let id = msg.id?;

    Some(match method {
        "initialize" => handle_initialize(id, instructions),
        "ping" => JsonRpcResponse::ok(id, json!({})),
        "tools/list" => JsonRpcResponse::ok(id, tools::tool_definitions(state.client.is_some())),
        "tools/call" => handle_tools_call(id, &msg.params, state),
        other => JsonRpcResponse::method_not_found(id, other),
    })
}

fn write_response(stdout: &mut io::Stdout, resp: &JsonRpcResponse) -> anyhow::Result<()> {
    let json = serde_json::to_string(resp)?;
    writeln!(stdout, "{json}")?;
    stdout.flush()?;
    Ok(())
}

fn handle_initialize(id: Value, instructions: &str) -> JsonRpcResponse {
    JsonRpcResponse::ok(
        id,
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION
            },
            "instructions": instructions
        }),
    )
}

fn handle_tools_call<S: Sampler>(
    id: Value,
    params: &Option<Value>,
    state: &mut McpState<S>,
) -> JsonRpcResponse {
    let Some(params) = params else {
        return JsonRpcResponse::invalid_params(id, "missing params");
    };
    let Some(tool_name) = params.get("name").and_then(|v| v.as_str()) else {
        return JsonRpcResponse::invalid_params(id, "missing tool name");
    };

    let args = params.get("arguments").cloned().unwrap_or(json!({}));

    let result = tools::call_tool(state, tool_name, &args);
    if result.is_error {
        debug!(tool = tool_name, "tool call failed");
    }
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::ok(id, value),
        Err(e) => JsonRpcResponse::err(id, -32603, format!("internal error: {e}")),
    }
}
