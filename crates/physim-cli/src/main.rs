mod client;
mod config;
mod render;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use physim_core::{
    column_range, detect_charts, example_problem, execute, ParameterValues, Playback, Session,
    Solution, SolutionClient, EXAMPLE_PROBLEMS,
};
use physim_mcp::{McpState, DEFAULT_INSTRUCTIONS};
use physim_script::RhaiSampler;

use crate::client::CommandClient;
use crate::config::Config;
use crate::render::OutputFormat;

#[derive(Parser)]
#[command(
    name = "physim",
    version,
    about = "Run, inspect and serve model-generated physics simulations"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a solution's sampler routine and print the samples
    Run {
        /// Solution JSON file
        file: PathBuf,

        /// Override a parameter (repeatable), e.g. -p v0=12
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, f64)>,

        /// Output format (default from config)
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Print every n-th sample (default from config)
        #[arg(short, long)]
        every: Option<usize>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List a solution's interactive parameters
    Params {
        /// Solution JSON file
        file: PathBuf,
    },

    /// Show the charts that fit a solution's samples
    Charts {
        /// Solution JSON file
        file: PathBuf,

        /// Override a parameter (repeatable)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, f64)>,
    },

    /// Print the interpolated animation state after ELAPSED seconds
    Frame {
        /// Solution JSON file
        file: PathBuf,

        /// Wall time since playback started, in seconds
        elapsed: f64,

        /// Override a parameter (repeatable)
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, f64)>,
    },

    /// Check that a solution (or a bare routine) produces valid samples
    Validate {
        /// Solution JSON file, or routine text with --routine
        file: PathBuf,

        /// Treat FILE as sampler routine text instead of a solution
        #[arg(long)]
        routine: bool,

        /// Parameter binding (repeatable); with --routine these are bound
        /// as variables of the routine, in order
        #[arg(short, long = "param", value_parser = parse_param)]
        params: Vec<(String, f64)>,
    },

    /// Ask the configured model command to solve a problem
    Solve {
        /// Problem statement
        problem: Option<String>,

        /// Use an example problem instead (see `physim examples`)
        #[arg(short = 'x', long, conflicts_with = "problem")]
        example: Option<String>,

        /// Save the solution JSON to this file
        #[arg(short, long)]
        save: Option<PathBuf>,

        /// Also print the samples in this format
        #[arg(short, long)]
        format: Option<OutputFormat>,

        /// Print every n-th sample
        #[arg(short, long)]
        every: Option<usize>,
    },

    /// List the example problems
    Examples,

    /// Launch MCP server (stdio transport)
    Serve {
        /// Solution JSON file to load at startup
        #[arg(short, long)]
        solution: Option<PathBuf>,
    },

    /// Show current configuration
    Config,
}

fn parse_param(s: &str) -> Result<(String, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|e| format!("invalid value for '{}': {e}", name.trim()))?;
    Ok((name.trim().to_string(), value))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config()?;

    match cli.command {
        Commands::Run {
            file,
            params,
            format,
            every,
            output,
        } => cmd_run(
            &cfg,
            &file,
            &params,
            format.unwrap_or(cfg.output.format),
            every.unwrap_or(cfg.output.every),
            output.as_deref(),
        ),
        Commands::Params { file } => cmd_params(&file),
        Commands::Charts { file, params } => cmd_charts(&cfg, &file, &params),
        Commands::Frame {
            file,
            elapsed,
            params,
        } => cmd_frame(&cfg, &file, elapsed, &params),
        Commands::Validate {
            file,
            routine,
            params,
        } => cmd_validate(&cfg, &file, routine, &params),
        Commands::Solve {
            problem,
            example,
            save,
            format,
            every,
        } => cmd_solve(
            &cfg,
            problem,
            example.as_deref(),
            save.as_deref(),
            format,
            every.unwrap_or(cfg.output.every),
        ),
        Commands::Examples => cmd_examples(),
        Commands::Serve { solution } => cmd_serve(&cfg, solution.as_deref()),
        Commands::Config => cmd_config(&cfg),
    }
}

// ---------------------------------------------------------------------------
// Session helpers
// ---------------------------------------------------------------------------

fn read_solution(path: &Path) -> Result<Solution> {
    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    Solution::from_response(&text).with_context(|| format!("parsing {}", path.display()))
}

/// Load a solution file into a fresh session and apply parameter overrides.
fn open_session(
    cfg: &Config,
    path: &Path,
    params: &[(String, f64)],
) -> Result<Session<RhaiSampler>> {
    let solution = read_solution(path)?;
    let mut session = Session::new(RhaiSampler::new(cfg.sandbox.clone()));
    session.load_solution(solution)?;
    for (name, value) in params {
        session
            .set_parameter(name, *value)
            .with_context(|| format!("setting {name}={value}"))?;
    }
    Ok(session)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_run(
    cfg: &Config,
    file: &Path,
    params: &[(String, f64)],
    format: OutputFormat,
    every: usize,
    output: Option<&Path>,
) -> Result<()> {
    let session = open_session(cfg, file, params)?;
    let samples = session
        .samples()
        .context("solution has no numerical code to run")?;
    let text = render::render(samples, format, every)?;

    match output {
        Some(path) => {
            std::fs::write(path, &text).with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote {} points to {}", samples.len(), path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}

fn cmd_params(file: &Path) -> Result<()> {
    let solution = read_solution(file)?;
    if !solution.has_parameters() {
        println!("No interactive parameters.");
        return Ok(());
    }

    println!(
        "{:<12} {:<28} {:>10} {:>10} {:>10} {:>8}",
        "Name", "Label", "Value", "Min", "Max", "Step"
    );
    println!("{}", "-".repeat(83));
    for p in &solution.parameters {
        let label: String = p.label.chars().take(28).collect();
        println!(
            "{:<12} {:<28} {:>10} {:>10} {:>10} {:>8}",
            p.name, label, p.value, p.min, p.max, p.step
        );
    }
    Ok(())
}

fn cmd_charts(cfg: &Config, file: &Path, params: &[(String, f64)]) -> Result<()> {
    let session = open_session(cfg, file, params)?;
    let samples = session
        .samples()
        .context("solution has no numerical code to run")?;

    for chart in detect_charts(samples) {
        println!("{:<12} {}", chart.id, chart.title);
        for series in &chart.series {
            let range = match column_range(samples, series.key) {
                Some((lo, hi)) => format!("[{lo:.4}, {hi:.4}]"),
                None => "(no data)".into(),
            };
            println!("  {:<16} {:<8} {range}", series.label, series.key);
        }
    }
    if physim_core::has_3d_data(samples) {
        println!();
        println!("3D trajectory data available.");
    }
    Ok(())
}

fn cmd_frame(cfg: &Config, file: &Path, elapsed: f64, params: &[(String, f64)]) -> Result<()> {
    let session = open_session(cfg, file, params)?;
    let samples = session
        .samples()
        .context("solution has no numerical code to run")?;
    let frame = Playback::new(samples).frame(elapsed);
    println!("{}", serde_json::to_string_pretty(&frame)?);
    Ok(())
}

fn cmd_validate(cfg: &Config, file: &Path, routine: bool, params: &[(String, f64)]) -> Result<()> {
    if !routine {
        let session = open_session(cfg, file, params)?;
        match session.samples() {
            Some(samples) => println!(
                "OK: {} points, t from {} to {}",
                samples.len(),
                samples.first().t,
                samples.t_last()
            ),
            None => println!("OK: solution parsed (no numerical code)"),
        }
        return Ok(());
    }

    let code =
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let values: ParameterValues = params.iter().cloned().collect();
    let sampler = RhaiSampler::new(cfg.sandbox.clone());
    match execute(&sampler, &code, Some(&values)) {
        Ok(samples) => {
            println!(
                "OK: {} points, t from {} to {}",
                samples.len(),
                samples.first().t,
                samples.t_last()
            );
            Ok(())
        }
        Err(e) => bail!("{e}"),
    }
}

fn cmd_solve(
    cfg: &Config,
    problem: Option<String>,
    example: Option<&str>,
    save: Option<&Path>,
    format: Option<OutputFormat>,
    every: usize,
) -> Result<()> {
    let mut client = CommandClient::from_config(&cfg.client)
        .context("no solution command configured; set [client] command in the config file")?;
    let mut session = Session::new(RhaiSampler::new(cfg.sandbox.clone()));

    match (problem, example) {
        (_, Some(key)) => {
            let example = example_problem(key)
                .with_context(|| format!("unknown example: {key} (see `physim examples`)"))?;
            session.use_example(example);
        }
        (Some(text), None) => session.set_problem(text),
        (None, None) => bail!("give a problem statement or --example"),
    }

    info!("requesting solution");
    let outcome = session.solve(&mut client);

    let Some(solution) = session.solution() else {
        return outcome.map_err(Into::into);
    };
    if let Some(path) = save {
        let json = serde_json::to_string_pretty(solution)?;
        std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        println!("Saved solution to {}", path.display());
    }
    println!("{}", solution.explanation.trim());
    println!();

    if let Some(params) = session.parameters() {
        let list: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        println!("Parameters: {}", list.join(", "));
    }
    if let Some(samples) = session.samples() {
        println!("Samples: {} points, t_last={}", samples.len(), samples.t_last());
        if let Some(format) = format {
            print!("{}", render::render(samples, format, every)?);
        }
    }
    outcome.map_err(Into::into)
}

fn cmd_examples() -> Result<()> {
    for example in &EXAMPLE_PROBLEMS {
        println!("{:<12} {}", example.key, example.name);
        println!("             {}", example.prompt);
    }
    Ok(())
}

fn cmd_serve(cfg: &Config, solution: Option<&Path>) -> Result<()> {
    let client = CommandClient::from_config(&cfg.client)
        .map(|c| Box::new(c) as Box<dyn SolutionClient>);
    let mut state = McpState::new(RhaiSampler::new(cfg.sandbox.clone()), client);

    if let Some(path) = solution {
        let solution = read_solution(path)?;
        if let Err(e) = state.session.load_solution(solution) {
            warn!("preloaded solution failed to sample: {e}");
        }
    }

    let instructions = cfg
        .mcp
        .instructions
        .as_deref()
        .unwrap_or(DEFAULT_INSTRUCTIONS);
    physim_mcp::run_server(&mut state, instructions)
}

fn cmd_config(cfg: &Config) -> Result<()> {
    println!("Config: {}", config::show_config_path());
    println!();
    println!("[sandbox]");
    println!("  max_operations = {}", cfg.sandbox.max_operations);
    println!("  timeout_ms = {}", cfg.sandbox.timeout_ms);
    println!("  max_call_levels = {}", cfg.sandbox.max_call_levels);
    println!("  max_array_size = {}", cfg.sandbox.max_array_size);
    println!("  max_map_size = {}", cfg.sandbox.max_map_size);
    println!("  max_string_size = {}", cfg.sandbox.max_string_size);
    println!();
    println!("[client]");
    println!(
        "  command = {}",
        cfg.client.command.as_deref().unwrap_or("(none, solve disabled)")
    );
    if !cfg.client.args.is_empty() {
        println!("  args = {:?}", cfg.client.args);
    }
    println!("  timeout_secs = {}", cfg.client.timeout_secs);
    println!();
    println!("[output]");
    println!("  format = {:?}", cfg.output.format);
    println!("  every = {}", cfg.output.every);
    println!();
    println!("[mcp]");
    if let Some(ref instr) = cfg.mcp.instructions {
        println!("  instructions = {instr}");
    } else {
        println!("  instructions = (default)");
    }
    Ok(())
}
