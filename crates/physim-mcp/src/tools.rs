use std::path::Path;

use serde::Serialize;
use serde_json::{json, Value};

use physim_core::{
    column_range, detect_charts, example_problem, Chart, CodeField, Playback, Sampler, Session,
    Solution, SolutionClient, View, EXAMPLE_PROBLEMS,
};

use crate::protocol::ToolResult;

/// Everything a tool call may touch: the interactive session and, when
/// configured, the backend that answers new problems.
pub struct McpState<S> {
    pub session: Session<S>,
    pub client: Option<Box<dyn SolutionClient>>,
}

impl<S: Sampler> McpState<S> {
    pub fn new(sampler: S, client: Option<Box<dyn SolutionClient>>) -> Self {
        Self {
            session: Session::new(sampler),
            client,
        }
    }
}

// ---------------------------------------------------------------------------
// Tool schemas for tools/list
// ---------------------------------------------------------------------------

pub fn tool_definitions(has_client: bool) -> Value {
    let mut tools = Vec::new();
    let example_keys: Vec<&str> = EXAMPLE_PROBLEMS.iter().map(|e| e.key).collect();

    if has_client {
        tools.push(json!({
            "name": "physim_solve",
            "description": "Ask the configured model to analyze a physics problem. Produces an explanation, a sampler routine with interactive parameters, and animator routines. The routine is run once immediately.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "problem": {
                        "type": "string",
                        "description": "Free-text problem statement"
                    },
                    "example": {
                        "type": "string",
                        "enum": example_keys,
                        "description": "Use a canned example problem instead of free text"
                    }
                }
            }
        }));
    }

    tools.extend([
        json!({
            "name": "physim_load",
            "description": "Load a solution document (explanation, numericalCode, simulationCode, optional simulationCode3D, parameters) and run its sampler routine.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Path to a JSON solution file"
                    },
                    "solution": {
                        "description": "Inline solution, as an object or a JSON string"
                    }
                }
            }
        }),
        json!({
            "name": "physim_status",
            "description": "Current session state: parameter values, sample count, available views, pending code edits and the last error.",
            "inputSchema": { "type": "object", "properties": {} }
        }),
        json!({
            "name": "physim_set_parameter",
            "description": "Change one interactive parameter and recompute the samples. On failure the previous samples are kept.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "name": { "type": "string", "description": "Parameter name" },
                    "value": { "type": "number", "description": "New value (not clamped to the slider range)" }
                },
                "required": ["name", "value"]
            }
        }),
        json!({
            "name": "physim_edit_code",
            "description": "Replace the draft text of one routine. Drafts take effect only after physim_apply_code.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "field": {
                        "type": "string",
                        "enum": ["numerical", "simulation", "simulation3d"],
                        "description": "Which routine to edit"
                    },
                    "code": { "type": "string", "description": "New routine text" }
                },
                "required": ["field", "code"]
            }
        }),
        json!({
            "name": "physim_apply_code",
            "description": "Run the drafted sampler routine. If it produces valid samples all drafts are committed; otherwise nothing changes and the error is returned.",
            "inputSchema": { "type": "object", "properties": {} }
        }),
        json!({
            "name": "physim_reset_code",
            "description": "Discard all code drafts.",
            "inputSchema": { "type": "object", "properties": {} }
        }),
        json!({
            "name": "physim_samples",
            "description": "Current sample sequence as JSON.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "every": {
                        "type": "integer",
                        "default": 1,
                        "minimum": 1,
                        "description": "Keep every n-th point (the last point is always kept)"
                    },
                    "limit": {
                        "type": "integer",
                        "minimum": 1,
                        "description": "Max number of points returned"
                    }
                }
            }
        }),
        json!({
            "name": "physim_charts",
            "description": "Charts that make sense for the current samples, with the value range of each series.",
            "inputSchema": { "type": "object", "properties": {} }
        }),
        json!({
            "name": "physim_frame",
            "description": "Interpolated state an animator would draw after `elapsed` seconds of looping playback.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "elapsed": { "type": "number", "description": "Wall time since playback started, in seconds" }
                },
                "required": ["elapsed"]
            }
        }),
        json!({
            "name": "physim_view",
            "description": "Switch the active view, or list the available views when no view is given.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "view": {
                        "type": "string",
                        "enum": ["explanation", "graphs", "parameters", "plot3d", "simulation", "simulation3d", "code"]
                    }
                }
            }
        }),
        json!({
            "name": "physim_examples",
            "description": "List the canned example problems.",
            "inputSchema": { "type": "object", "properties": {} }
        }),
    ]);

    json!({ "tools": tools })
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn call_tool<S: Sampler>(state: &mut McpState<S>, name: &str, args: &Value) -> ToolResult {
    match name {
        "physim_solve" => tool_solve(state, args),
        "physim_load" => tool_load(&mut state.session, args),
        "physim_status" => ToolResult::json(&state.session.status()),
        "physim_set_parameter" => tool_set_parameter(&mut state.session, args),
        "physim_edit_code" => tool_edit_code(&mut state.session, args),
        "physim_apply_code" => tool_apply_code(&mut state.session),
        "physim_reset_code" => tool_reset_code(&mut state.session),
        "physim_samples" => tool_samples(&state.session, args),
        "physim_charts" => tool_charts(&state.session),
        "physim_frame" => tool_frame(&state.session, args),
        "physim_view" => tool_view(&mut state.session, args),
        "physim_examples" => ToolResult::json(&examples()),
        _ => ToolResult::error(format!("unknown tool: {name}")),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn get_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args.get(key).and_then(|v| v.as_str())
}

fn get_i64(args: &Value, key: &str, default: i64) -> i64 {
    args.get(key).and_then(|v| v.as_i64()).unwrap_or(default)
}

fn get_f64(args: &Value, key: &str) -> Option<f64> {
    args.get(key).and_then(|v| v.as_f64())
}

/// Explanation plus a one-line account of what the session now holds.
fn solution_summary<S: Sampler>(session: &Session<S>) -> String {
    let Some(solution) = session.solution() else {
        return "No solution loaded.".into();
    };
    let mut out = solution.explanation.trim().to_string();
    out.push_str("\n\n---\n");
    if let Some(params) = session.parameters() {
        let list: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        out.push_str(&format!("Parameters: {}\n", list.join(", ")));
    }
    match session.samples() {
        Some(samples) => out.push_str(&format!(
            "Samples: {} points, t_last={}\n",
            samples.len(),
            samples.t_last()
        )),
        None => out.push_str("Samples: none\n"),
    }
    let views: Vec<String> = session.available_views().iter().map(View::to_string).collect();
    out.push_str(&format!("Views: {}", views.join(", ")));
    if let Some(err) = session.error() {
        out.push_str(&format!("\nError: {err}"));
    }
    out
}

#[derive(Serialize)]
struct ExampleEntry {
    key: &'static str,
    name: &'static str,
    prompt: &'static str,
}

fn examples() -> Vec<ExampleEntry> {
    EXAMPLE_PROBLEMS
        .iter()
        .map(|e| ExampleEntry {
            key: e.key,
            name: e.name,
            prompt: e.prompt,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Solution tools
// ---------------------------------------------------------------------------

fn tool_solve<S: Sampler>(state: &mut McpState<S>, args: &Value) -> ToolResult {
    let Some(client) = state.client.as_deref_mut() else {
        return ToolResult::error("no solution client configured (set [client] in config)".into());
    };
    if let Some(key) = get_str(args, "example") {
        match example_problem(key) {
            Some(example) => state.session.use_example(example),
            None => return ToolResult::error(format!("unknown example: {key}")),
        }
    } else if let Some(problem) = get_str(args, "problem") {
        state.session.set_problem(problem);
    } else {
        return ToolResult::error("missing required field: problem or example".into());
    }

    match state.session.solve(client) {
        Ok(()) => ToolResult::text(solution_summary(&state.session)),
        Err(e) if state.session.solution().is_some() => {
            // Solution kept, only the first sampler run failed.
            ToolResult::error(format!("{e}\n\n{}", solution_summary(&state.session)))
        }
        Err(e) => ToolResult::error(e.to_string()),
    }
}

fn tool_load<S: Sampler>(session: &mut Session<S>, args: &Value) -> ToolResult {
    let solution = if let Some(path) = get_str(args, "path") {
        match read_solution_file(Path::new(path)) {
            Ok(s) => s,
            Err(e) => return ToolResult::error(e),
        }
    } else if let Some(inline) = args.get("solution") {
        let parsed = match inline {
            Value::String(text) => Solution::from_response(text).map_err(|e| e.to_string()),
            other => serde_json::from_value(other.clone()).map_err(|e| e.to_string()),
        };
        match parsed {
            Ok(s) => s,
            Err(e) => return ToolResult::error(format!("invalid solution: {e}")),
        }
    } else {
        return ToolResult::error("missing required field: path or solution".into());
    };

    match session.load_solution(solution) {
        Ok(()) => ToolResult::text(solution_summary(session)),
        Err(e) if session.solution().is_some() => {
            ToolResult::error(format!("{e}\n\n{}", solution_summary(session)))
        }
        Err(e) => ToolResult::error(e.to_string()),
    }
}

fn read_solution_file(path: &Path) -> Result<Solution, String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    Solution::from_response(&text).map_err(|e| format!("invalid solution: {e}"))
}

// ---------------------------------------------------------------------------
// Parameter and code tools
// ---------------------------------------------------------------------------

fn tool_set_parameter<S: Sampler>(session: &mut Session<S>, args: &Value) -> ToolResult {
    let name = match get_str(args, "name") {
        Some(n) => n,
        None => return ToolResult::error("missing required field: name".into()),
    };
    let value = match get_f64(args, "value") {
        Some(v) => v,
        None => return ToolResult::error("missing required field: value".into()),
    };

    match session.set_parameter(name, value) {
        Ok(()) => {
            let points = session.samples().map_or(0, |s| s.len());
            ToolResult::text(format!("{name} = {value}; recomputed {points} points"))
        }
        Err(e) => ToolResult::error(e.to_string()),
    }
}

fn tool_edit_code<S: Sampler>(session: &mut Session<S>, args: &Value) -> ToolResult {
    let field: CodeField = match get_str(args, "field").map(str::parse) {
        Some(Ok(f)) => f,
        Some(Err(e)) => return ToolResult::error(e),
        None => return ToolResult::error("missing required field: field".into()),
    };
    let code = match get_str(args, "code") {
        Some(c) => c,
        None => return ToolResult::error("missing required field: code".into()),
    };

    match session.edit_code(field, code) {
        Ok(()) => ToolResult::text(format!(
            "Draft updated. Pending edits: {}",
            session.has_pending_edits()
        )),
        Err(e) => ToolResult::error(e.to_string()),
    }
}

fn tool_apply_code<S: Sampler>(session: &mut Session<S>) -> ToolResult {
    match session.apply_code() {
        Ok(()) => {
            let points = session.samples().map_or(0, |s| s.len());
            ToolResult::text(format!(
                "Applied edited code: {points} points. View: {}",
                session.view()
            ))
        }
        Err(e) => ToolResult::error(e.to_string()),
    }
}

fn tool_reset_code<S: Sampler>(session: &mut Session<S>) -> ToolResult {
    if session.reset_code() {
        ToolResult::text("Drafts discarded.".into())
    } else {
        ToolResult::text("No pending edits.".into())
    }
}

// ---------------------------------------------------------------------------
// Presentation tools
// ---------------------------------------------------------------------------

fn tool_samples<S: Sampler>(session: &Session<S>, args: &Value) -> ToolResult {
    let Some(samples) = session.samples() else {
        return ToolResult::error("no samples computed".into());
    };
    let every = get_i64(args, "every", 1).max(1) as usize;
    let limit = get_i64(args, "limit", i64::MAX).max(1) as usize;

    let mut points = samples.decimate(every);
    points.truncate(limit);
    ToolResult::json(&points)
}

#[derive(Serialize)]
struct ChartReport {
    #[serde(flatten)]
    chart: Chart,
    ranges: serde_json::Map<String, Value>,
}

fn tool_charts<S: Sampler>(session: &Session<S>) -> ToolResult {
    let Some(samples) = session.samples() else {
        return ToolResult::error("no samples computed".into());
    };
    let reports: Vec<ChartReport> = detect_charts(samples)
        .into_iter()
        .map(|chart| {
            let mut ranges = serde_json::Map::new();
            let keys = std::iter::once(chart.x_key).chain(chart.series.iter().map(|s| s.key));
            for key in keys {
                let range = column_range(samples, key).map(|(lo, hi)| json!([lo, hi]));
                ranges.insert(key.to_string(), range.unwrap_or(Value::Null));
            }
            ChartReport { chart, ranges }
        })
        .collect();
    ToolResult::json(&reports)
}

fn tool_frame<S: Sampler>(session: &Session<S>, args: &Value) -> ToolResult {
    let Some(samples) = session.samples() else {
        return ToolResult::error("no samples computed".into());
    };
    let elapsed = match get_f64(args, "elapsed") {
        Some(e) => e,
        None => return ToolResult::error("missing required field: elapsed".into()),
    };
    ToolResult::json(&Playback::new(samples).frame(elapsed))
}

fn tool_view<S: Sampler>(session: &mut Session<S>, args: &Value) -> ToolResult {
    if let Some(name) = get_str(args, "view") {
        let view: View = match name.parse() {
            Ok(v) => v,
            Err(e) => return ToolResult::error(e),
        };
        if let Err(e) = session.set_view(view) {
            return ToolResult::error(e.to_string());
        }
    }
    ToolResult::json(&json!({
        "view": session.view(),
        "available": session.available_views(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use physim_core::RequestError;
    use physim_script::RhaiSampler;

    const SOLUTION: &str = r#"{
        "explanation": "Projectile under uniform gravity.",
        "numericalCode": "let c = v0 * 0.707; let pts = []; for i in 0..5 { let t = i.to_float() * 0.25; pts.push(#{ t: t, x: c * t, y: c * t - 4.905 * t * t, vx: c, vy: c - 9.81 * t }); } pts",
        "simulationCode": "ctx.draw(state)",
        "parameters": [
            {"name": "v0", "label": "Initial speed", "value": 10, "min": 5, "max": 15, "step": 1}
        ]
    }"#;

    struct FixedClient;

    impl SolutionClient for FixedClient {
        fn solve(&mut self, problem: &str) -> Result<Solution, RequestError> {
            if problem.contains("forbidden") {
                return Err(RequestError::Blocked);
            }
            Solution::from_response(SOLUTION)
        }
    }

    fn state(with_client: bool) -> McpState<RhaiSampler> {
        let client: Option<Box<dyn SolutionClient>> = if with_client {
            Some(Box::new(FixedClient))
        } else {
            None
        };
        McpState::new(RhaiSampler::default(), client)
    }

    fn loaded() -> McpState<RhaiSampler> {
        let mut state = state(false);
        let result = call_tool(&mut state, "physim_load", &json!({ "solution": SOLUTION }));
        assert!(!result.is_error, "{}", result.joined_text());
        state
    }

    fn tool_names(defs: &Value) -> Vec<String> {
        defs["tools"]
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["name"].as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_solve_listed_only_with_client() {
        assert!(!tool_names(&tool_definitions(false)).contains(&"physim_solve".to_string()));
        let names = tool_names(&tool_definitions(true));
        assert_eq!(names[0], "physim_solve");
        assert_eq!(names.len(), 12);
    }

    #[test]
    fn test_solve_with_example() {
        let mut state = state(true);
        let result = call_tool(&mut state, "physim_solve", &json!({ "example": "projectile" }));
        assert!(!result.is_error, "{}", result.joined_text());
        assert!(result.joined_text().contains("Samples: 5 points"));
        assert!(state.session.problem().contains("projectile"));
    }

    #[test]
    fn test_solve_reports_request_error() {
        let mut state = state(true);
        let result = call_tool(&mut state, "physim_solve", &json!({ "problem": "forbidden" }));
        assert!(result.is_error);
        assert!(result.joined_text().contains("safety"));
    }

    #[test]
    fn test_solve_without_client() {
        let mut state = state(false);
        let result = call_tool(&mut state, "physim_solve", &json!({ "problem": "x" }));
        assert!(result.is_error);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solution.json");
        std::fs::write(&path, SOLUTION).unwrap();

        let mut state = state(false);
        let result = call_tool(
            &mut state,
            "physim_load",
            &json!({ "path": path.to_string_lossy() }),
        );
        assert!(!result.is_error, "{}", result.joined_text());
        assert!(result.joined_text().contains("v0=10"));
    }

    #[test]
    fn test_set_parameter_recomputes() {
        let mut state = loaded();
        let before = state.session.samples().unwrap().first().vx.unwrap();
        let result = call_tool(
            &mut state,
            "physim_set_parameter",
            &json!({ "name": "v0", "value": 12 }),
        );
        assert!(!result.is_error, "{}", result.joined_text());
        let after = state.session.samples().unwrap().first().vx.unwrap();
        assert!(after > before);
    }

    #[test]
    fn test_set_unknown_parameter() {
        let mut state = loaded();
        let result = call_tool(
            &mut state,
            "physim_set_parameter",
            &json!({ "name": "mass", "value": 1 }),
        );
        assert!(result.is_error);
        assert!(result.joined_text().contains("unknown parameter"));
    }

    #[test]
    fn test_failed_apply_keeps_samples() {
        let mut state = loaded();
        let before = state.session.samples().cloned();

        let result = call_tool(
            &mut state,
            "physim_edit_code",
            &json!({ "field": "numerical", "code": "throw \"boom\";" }),
        );
        assert!(!result.is_error);
        let result = call_tool(&mut state, "physim_apply_code", &json!({}));
        assert!(result.is_error);
        assert!(result.joined_text().contains("boom"));
        assert_eq!(state.session.samples().cloned(), before);
        assert_eq!(state.session.view(), View::Code);

        let result = call_tool(&mut state, "physim_reset_code", &json!({}));
        assert_eq!(result.joined_text(), "Drafts discarded.");
        assert!(!state.session.has_pending_edits());
    }

    #[test]
    fn test_samples_decimation_keeps_last() {
        let mut state = loaded();
        let result = call_tool(&mut state, "physim_samples", &json!({ "every": 3 }));
        let points: Value = serde_json::from_str(&result.joined_text()).unwrap();
        let ts: Vec<f64> = points
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["t"].as_f64().unwrap())
            .collect();
        assert_eq!(ts, vec![0.0, 0.75, 1.0]);
    }

    #[test]
    fn test_charts_include_ranges() {
        let mut state = loaded();
        let result = call_tool(&mut state, "physim_charts", &json!({}));
        let charts: Value = serde_json::from_str(&result.joined_text()).unwrap();
        assert_eq!(charts[0]["id"], "trajectory");
        assert_eq!(charts[1]["ranges"]["t"], json!([0.0, 1.0]));
    }

    #[test]
    fn test_frame_wraps_elapsed_time() {
        let mut state = loaded();
        let result = call_tool(&mut state, "physim_frame", &json!({ "elapsed": 2.5 }));
        let frame: Value = serde_json::from_str(&result.joined_text()).unwrap();
        assert_eq!(frame["time"], json!(0.5));
    }

    #[test]
    fn test_view_switch() {
        let mut state = loaded();
        let result = call_tool(&mut state, "physim_view", &json!({ "view": "plot3d" }));
        assert!(result.is_error);
        let result = call_tool(&mut state, "physim_view", &json!({ "view": "parameters" }));
        assert!(!result.is_error);
        assert_eq!(state.session.view(), View::Parameters);
    }

    #[test]
    fn test_unknown_tool() {
        let mut state = state(false);
        assert!(call_tool(&mut state, "physim_nope", &json!({})).is_error);
    }
}
