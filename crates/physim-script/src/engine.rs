use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use physim_core::{ParameterValues, Sampler, SamplerError, ScriptValue};
use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Dynamic, Engine, EvalAltResult, ParseError, Position, Scope, AST, FLOAT, INT};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

type ExclusiveRange = std::ops::Range<INT>;
type InclusiveRange = std::ops::RangeInclusive<INT>;

/// How many operations pass between wall-clock checks.
const CLOCK_CHECK_INTERVAL: u64 = 1024;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Resource caps applied to every routine invocation. Zero disables a cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxLimits {
    pub max_operations: u64,
    pub timeout_ms: u64,
    pub max_call_levels: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
    pub max_string_size: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_operations: 50_000_000,
            timeout_ms: 5_000,
            max_call_levels: 64,
            max_array_size: 1_000_000,
            max_map_size: 10_000,
            max_string_size: 1 << 20,
        }
    }
}

// ---------------------------------------------------------------------------
// RhaiSampler
// ---------------------------------------------------------------------------

/// Runs sampler routines written in Rhai.
///
/// The routine text is compiled as a top-level script. Parameters are
/// pushed into its scope as float variables in declaration order, and the
/// value of the last statement (or of a top-level `return`) is the output.
/// Helper `fn`s may be declared, but like all Rhai functions they cannot
/// see the scope, so parameters must be passed to them as arguments.
/// Module imports resolve to nothing.
///
/// Parameter values stay floats even when whole, so `0..steps` is accepted
/// as a range: float bounds are rounded up, except the upper bound of
/// `..=`, which is rounded down.
#[derive(Debug)]
pub struct RhaiSampler {
    engine: Engine,
    limits: SandboxLimits,
    deadline: Rc<Cell<Option<Instant>>>,
}

impl RhaiSampler {
    pub fn new(limits: SandboxLimits) -> Self {
        let deadline: Rc<Cell<Option<Instant>>> = Rc::new(Cell::new(None));

        let mut engine = Engine::new();
        engine
            .set_max_operations(limits.max_operations)
            .set_max_call_levels(limits.max_call_levels)
            .set_max_array_size(limits.max_array_size)
            .set_max_map_size(limits.max_map_size)
            .set_max_string_size(limits.max_string_size)
            .set_module_resolver(DummyModuleResolver::new());
        engine.disable_symbol("eval");
        register_float_ranges(&mut engine);

        // stdout belongs to the MCP transport; route script output to logs
        engine.on_print(|text| debug!(target: "physim::script", "{text}"));
        engine.on_debug(
            |text, _source, pos| debug!(target: "physim::script", line = ?pos.line(), "{text}"),
        );

        let clock = Rc::clone(&deadline);
        engine.on_progress(move |ops| {
            if ops % CLOCK_CHECK_INTERVAL != 0 {
                return None;
            }
            match clock.get() {
                Some(deadline) if Instant::now() >= deadline => Some(Dynamic::from("timeout")),
                _ => None,
            }
        });

        Self {
            engine,
            limits,
            deadline,
        }
    }

    pub fn limits(&self) -> &SandboxLimits {
        &self.limits
    }

    fn compile(&self, code: &str) -> Result<AST, SamplerError> {
        self.engine.compile(code).map_err(|e| compile_error(&e))
    }

    fn arm_deadline(&self) {
        let deadline = (self.limits.timeout_ms > 0)
            .then(|| Instant::now() + Duration::from_millis(self.limits.timeout_ms));
        self.deadline.set(deadline);
    }
}

impl Default for RhaiSampler {
    fn default() -> Self {
        Self::new(SandboxLimits::default())
    }
}

impl Sampler for RhaiSampler {
    fn run(
        &self,
        code: &str,
        params: Option<&ParameterValues>,
    ) -> Result<ScriptValue, SamplerError> {
        let ast = self.compile(code)?;
        let mut scope = Scope::new();
        for (name, value) in params.into_iter().flat_map(ParameterValues::iter) {
            scope.push(name.to_string(), value);
        }
        trace!(bound = scope.len(), "invoking sampler routine");

        self.arm_deadline();
        let result = self.engine.eval_ast_with_scope::<Dynamic>(&mut scope, &ast);
        self.deadline.set(None);

        result
            .map(to_script_value)
            .map_err(|e| runtime_error(&e, &self.limits))
    }

    /// Parses `let <name> = 0;` so reserved words and disabled symbols are
    /// rejected by the engine itself.
    fn check_binding(&self, name: &str) -> Result<(), String> {
        self.engine
            .compile(format!("let {name} = 0;"))
            .map(|_| ())
            .map_err(|e| e.err_type().to_string())
    }
}

fn register_float_ranges(engine: &mut Engine) {
    fn round_up(v: FLOAT) -> INT {
        v.ceil() as INT
    }
    engine
        .register_fn("..", |a: INT, b: FLOAT| -> ExclusiveRange {
            a..round_up(b)
        })
        .register_fn("..", |a: FLOAT, b: INT| -> ExclusiveRange {
            round_up(a)..b
        })
        .register_fn("..", |a: FLOAT, b: FLOAT| -> ExclusiveRange {
            round_up(a)..round_up(b)
        })
        .register_fn("..=", |a: INT, b: FLOAT| -> InclusiveRange {
            a..=b.floor() as INT
        })
        .register_fn("..=", |a: FLOAT, b: INT| -> InclusiveRange {
            round_up(a)..=b
        })
        .register_fn("..=", |a: FLOAT, b: FLOAT| -> InclusiveRange {
            round_up(a)..=b.floor() as INT
        });
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn compile_error(err: &ParseError) -> SamplerError {
    let pos = err.position();
    SamplerError::Compile {
        message: err.err_type().to_string(),
        line: pos.line(),
        column: pos.position(),
    }
}

fn runtime_error(err: &EvalAltResult, limits: &SandboxLimits) -> SamplerError {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => runtime_error(inner, limits),
        EvalAltResult::ErrorTooManyOperations(_) => {
            SamplerError::Limit(format!("more than {} operations", limits.max_operations))
        }
        EvalAltResult::ErrorTerminated(_, _) => {
            SamplerError::Limit(format!("timed out after {} ms", limits.timeout_ms))
        }
        EvalAltResult::ErrorStackOverflow(_) => {
            SamplerError::Limit(format!("call depth exceeds {}", limits.max_call_levels))
        }
        EvalAltResult::ErrorDataTooLarge(what, _) => {
            SamplerError::Limit(format!("{what} exceeds the configured size"))
        }
        EvalAltResult::ErrorParsing(kind, pos) => SamplerError::Compile {
            message: kind.to_string(),
            line: pos.line(),
            column: pos.position(),
        },
        EvalAltResult::ErrorRuntime(value, pos) => {
            SamplerError::Runtime(with_position(value.to_string(), *pos))
        }
        other => SamplerError::Runtime(other.to_string()),
    }
}

fn with_position(message: String, pos: Position) -> String {
    match pos.line() {
        Some(line) => format!("{message} (line {line})"),
        None => message,
    }
}

// ---------------------------------------------------------------------------
// Value conversion
// ---------------------------------------------------------------------------

fn to_script_value(value: Dynamic) -> ScriptValue {
    let value = value.flatten();
    if value.is_unit() {
        return ScriptValue::Unit;
    }
    if let Ok(b) = value.as_bool() {
        return ScriptValue::Bool(b);
    }
    if let Ok(i) = value.as_int() {
        return ScriptValue::Int(i);
    }
    if let Ok(f) = value.as_float() {
        return ScriptValue::Float(f);
    }
    if value.is_array() {
        return match value.into_array() {
            Ok(items) => ScriptValue::List(items.into_iter().map(to_script_value).collect()),
            Err(kind) => ScriptValue::Text(kind.to_string()),
        };
    }
    if value.is_map() {
        let type_name = value.type_name();
        return match value.try_cast::<rhai::Map>() {
            Some(fields) => ScriptValue::Record(
                fields
                    .into_iter()
                    .map(|(k, v)| (k.to_string(), to_script_value(v)))
                    .collect(),
            ),
            None => ScriptValue::Text(type_name.to_string()),
        };
    }
    if value.is_string() {
        return match value.into_string() {
            Ok(s) => ScriptValue::Text(s),
            Err(kind) => ScriptValue::Text(kind.to_string()),
        };
    }
    // chars, function pointers, timestamps: only their text matters
    ScriptValue::Text(value.to_string())
}
