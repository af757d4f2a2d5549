use crate::config::{Config, LayoutRequest, SolverPhase, load_config};
use crate::ir::StromData;
use crate::layout::compute_layout;
use crate::layout_dump::{PIPELINE_STEPS, debug_layout, write_debug_dump};
use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::warn;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "strom-layout", version, about = "Family-tree layout engine")]
pub struct Args {
    /// Input family data (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file for the layout JSON. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Config file (.json or .json5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Focus person id. Defaults to the first person in the data.
    #[arg(short = 'f', long = "focus")]
    pub focus: Option<String>,

    /// Generations to walk up from the focus
    #[arg(long = "ancestors")]
    pub ancestors: Option<u32>,

    /// Generations to walk down from the focus
    #[arg(long = "descendants")]
    pub descendants: Option<u32>,

    /// Include the ancestors of the focus person's partners
    #[arg(long = "spouseAncestors")]
    pub spouse_ancestors: bool,

    /// Include aunts and uncles
    #[arg(long = "parentSiblings")]
    pub parent_siblings: bool,

    /// Include cousins (implies --parentSiblings)
    #[arg(long = "cousins")]
    pub cousins: bool,

    /// Solver iteration budget
    #[arg(long = "maxIterations")]
    pub max_iterations: Option<usize>,

    /// Largest acceptable centering error
    #[arg(long = "tolerance")]
    pub tolerance: Option<f32>,

    /// Stop the solver after a phase
    #[arg(long = "stopAfter", value_enum)]
    pub stop_after: Option<PhaseArg>,

    /// Emit a pipeline snapshot up to this stage instead of the result
    #[arg(
        long = "debugStep",
        value_parser = clap::value_parser!(u8).range(1..=PIPELINE_STEPS as i64)
    )]
    pub debug_step: Option<u8>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long = "log-level", default_value = "warn")]
    pub log_level: String,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum PhaseArg {
    A,
    B,
}

impl From<PhaseArg> for SolverPhase {
    fn from(phase: PhaseArg) -> Self {
        match phase {
            PhaseArg::A => SolverPhase::A,
            PhaseArg::B => SolverPhase::B,
        }
    }
}

pub fn run(args: &Args) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let data = read_input(args.input.as_deref())?;
    let focus = match &args.focus {
        Some(focus) => focus.clone(),
        None => data
            .persons
            .keys()
            .next()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("No persons found in input"))?,
    };
    if data.person(&focus).is_none() {
        warn!(focus = focus.as_str(); "Focus person not in input, layout will be empty");
    }
    let request = build_request(&config, args, focus);

    match args.debug_step {
        Some(step) => {
            let snapshot = debug_layout(&data, &request, &config.layout, step);
            match args.output.as_deref() {
                Some(path) => write_debug_dump(path, &snapshot),
                None => write_json(&snapshot, None),
            }
        }
        None => {
            let result = compute_layout(&data, &request, &config.layout);
            write_json(&result, args.output.as_deref())
        }
    }
}

/// Layers command-line overrides on top of the loaded config.
fn build_request(config: &Config, args: &Args, focus: String) -> LayoutRequest {
    let mut request = LayoutRequest {
        focus,
        selection: config.selection.clone(),
        solver: config.solver.clone(),
    };
    let selection = &mut request.selection;
    if let Some(depth) = args.ancestors {
        selection.ancestor_depth = depth;
    }
    if let Some(depth) = args.descendants {
        selection.descendant_depth = depth;
    }
    selection.include_spouse_ancestors |= args.spouse_ancestors;
    selection.include_parent_siblings |= args.parent_siblings || args.cousins;
    selection.include_parent_sibling_descendants |= args.cousins;

    let solver = &mut request.solver;
    if let Some(max) = args.max_iterations {
        solver.max_iterations = max;
    }
    if let Some(tolerance) = args.tolerance {
        solver.tolerance = tolerance;
    }
    if let Some(phase) = args.stop_after {
        solver.stop_after = Some(phase.into());
    }
    request
}

fn read_input(path: Option<&Path>) -> Result<StromData> {
    if let Some(path) = path
        && path != Path::new("-")
    {
        return Ok(StromData::from_path(path)?);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(StromData::from_json(&buf)?)
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, value)?;
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            serde_json::to_writer_pretty(&mut handle, value)?;
            writeln!(handle)?;
        }
    }
    Ok(())
}
