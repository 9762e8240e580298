use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use hc_app::{
    AppResult, HistoryShape, RunOptions, RunRecord, RunRequest, project_service, run_service,
};

#[derive(Parser)]
#[command(name = "hc-cli")]
#[command(about = "Hybrid simulation experimental-control driver", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate project file syntax and structure
    Validate {
        /// Path to the project YAML or JSON file
        project_path: PathBuf,
    },
    /// List experimental controls in a project
    Controls {
        /// Path to the project YAML or JSON file
        project_path: PathBuf,
    },
    /// Drive one experimental control along a scripted history
    Run {
        /// Path to the project YAML or JSON file
        project_path: PathBuf,
        /// Control name or tag
        control: String,
        /// Number of steps
        #[arg(long, default_value_t = 10)]
        steps: usize,
        /// Peak value of the imposed history
        #[arg(long, default_value_t = 0.01)]
        amplitude: f64,
        /// History shape
        #[arg(long, value_enum, default_value_t = Shape::Ramp)]
        shape: Shape,
        /// Write the run record as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Shape {
    Ramp,
    Sine,
}

impl From<Shape> for HistoryShape {
    fn from(shape: Shape) -> Self {
        match shape {
            Shape::Ramp => HistoryShape::Ramp,
            Shape::Sine => HistoryShape::Sine,
        }
    }
}

fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { project_path } => cmd_validate(&project_path),
        Commands::Controls { project_path } => cmd_controls(&project_path),
        Commands::Run {
            project_path,
            control,
            steps,
            amplitude,
            shape,
            output,
        } => cmd_run(
            &project_path,
            &control,
            RunOptions {
                steps,
                amplitude,
                shape: shape.into(),
            },
            output.as_deref(),
        ),
    }
}

fn cmd_validate(project_path: &Path) -> AppResult<()> {
    println!("Validating project: {}", project_path.display());
    let project = project_service::load_project(project_path)?;
    debug!(name = %project.name, version = project.version, "project loaded");
    project_service::validate_project(&project)?;
    println!("✓ Project is valid");
    Ok(())
}

fn cmd_controls(project_path: &Path) -> AppResult<()> {
    let project = project_service::load_project(project_path)?;
    let controls = project_service::list_controls(&project);

    if controls.is_empty() {
        println!("No experimental controls found in project");
    } else {
        println!("Experimental controls in project:");
        for c in controls {
            println!(
                "  {} - {} [{}] ({} ctrl, {} daq signals)",
                c.tag, c.name, c.transport, c.num_ctrl_signals, c.num_daq_signals
            );
        }
    }
    Ok(())
}

fn cmd_run(
    project_path: &Path,
    control: &str,
    options: RunOptions,
    output: Option<&Path>,
) -> AppResult<()> {
    println!("Running control: {}", control);
    println!(
        "  steps = {}, amplitude = {}, shape = {}",
        options.steps, options.amplitude, options.shape
    );

    info!(project = %project_path.display(), control, steps = options.steps, "starting run");
    let request = RunRequest {
        project_path,
        control,
        options,
    };
    let record = run_service::run(&request)?;
    print_summary(&record);

    if let Some(path) = output {
        run_service::save_record(path, &record)?;
        debug!(path = %path.display(), steps = record.steps.len(), "run record saved");
        println!("✓ Run record written to {}", path.display());
    }
    Ok(())
}

fn print_summary(record: &RunRecord) {
    println!("✓ Run completed: {} via {}", record.control, record.transport);
    println!("  Steps: {}", record.steps.len());
    println!("  Handshakes: {} control, {} acquire", record.controls, record.acquires);
    if record.ctrl_offsets.iter().any(|&v| v != 0.0) {
        println!("  Ctrl offsets: {:?}", record.ctrl_offsets);
    }
    if record.daq_offsets.iter().any(|&v| v != 0.0) {
        println!("  Daq offsets: {:?}", record.daq_offsets);
    }
    if let Some(last) = record.last_step() {
        println!("  Final ctrl: {:?}", last.ctrl);
        println!("  Final measured: {:?}", last.measured);
    }
}
