//! Scripted hybrid test runs.
//!
//! A run drives one experimental control through `configure_sizes`,
//! `setup`, then `steps` cycles of drive/read/commit along a prescribed
//! history, and records every exchanged array.

use std::f64::consts::TAU;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use hc_control::{ConfiguredSizes, ResponseVectors, ResponseVectorsMut};
use hc_core::ResponseType;
use hc_project::schema::Project;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::build::{build_control, build_registry};
use crate::error::{AppError, AppResult};
use crate::project_service;

/// Shape of the imposed history over the normalized run time `t` in (0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryShape {
    #[default]
    Ramp,
    /// One full period.
    Sine,
}

impl HistoryShape {
    fn sample(self, amplitude: f64, t: f64) -> Motion {
        match self {
            HistoryShape::Ramp => Motion {
                disp: amplitude * t,
                vel: amplitude,
                accel: 0.0,
                time: t,
            },
            HistoryShape::Sine => Motion {
                disp: amplitude * (TAU * t).sin(),
                vel: amplitude * TAU * (TAU * t).cos(),
                accel: -amplitude * TAU * TAU * (TAU * t).sin(),
                time: t,
            },
        }
    }
}

impl fmt::Display for HistoryShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HistoryShape::Ramp => "ramp",
            HistoryShape::Sine => "sine",
        })
    }
}

impl FromStr for HistoryShape {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ramp" => Ok(HistoryShape::Ramp),
            "sine" => Ok(HistoryShape::Sine),
            other => Err(AppError::InvalidInput(format!(
                "unknown history shape '{other}' (expected ramp or sine)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Motion {
    disp: f64,
    vel: f64,
    accel: f64,
    time: f64,
}

impl Motion {
    /// Force-type trial components follow the displacement history.
    fn value(&self, response: ResponseType) -> f64 {
        match response {
            ResponseType::Disp | ResponseType::Force => self.disp,
            ResponseType::Vel => self.vel,
            ResponseType::Accel => self.accel,
            ResponseType::Time => self.time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunOptions {
    pub steps: usize,
    pub amplitude: f64,
    pub shape: HistoryShape,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            steps: 10,
            amplitude: 0.01,
            shape: HistoryShape::Ramp,
        }
    }
}

/// Request to run one control of a project file.
pub struct RunRequest<'a> {
    pub project_path: &'a Path,
    /// Control name or tag.
    pub control: &'a str,
    pub options: RunOptions,
}

/// Arrays exchanged in one step, in flat signal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: usize,
    pub time: f64,
    /// Value handed to each trial signal, before factor and offsets.
    pub trial: Vec<f64>,
    pub ctrl: Vec<f64>,
    pub daq: Vec<f64>,
    /// Value read back for each output signal.
    pub measured: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub project: String,
    pub control: String,
    pub transport: String,
    pub shape: HistoryShape,
    pub amplitude: f64,
    pub trial_offsets: Vec<f64>,
    pub ctrl_offsets: Vec<f64>,
    pub daq_offsets: Vec<f64>,
    pub controls: usize,
    pub acquires: usize,
    pub steps: Vec<StepRecord>,
}

impl RunRecord {
    pub fn last_step(&self) -> Option<&StepRecord> {
        self.steps.last()
    }
}

/// Load the project file and run the requested control.
pub fn run(request: &RunRequest<'_>) -> AppResult<RunRecord> {
    let project = project_service::load_project(request.project_path)?;
    run_control(&project, request.control, &request.options)
}

pub fn run_control(project: &Project, control: &str, options: &RunOptions) -> AppResult<RunRecord> {
    if options.steps == 0 {
        return Err(AppError::InvalidInput("steps must be positive".to_string()));
    }
    if !options.amplitude.is_finite() {
        return Err(AppError::InvalidInput(format!(
            "amplitude must be finite, got {}",
            options.amplitude
        )));
    }

    let def = project_service::get_control(project, control)?;
    let registry = build_registry(project)?;
    let mut adapter = build_control(project, &registry, def)?;

    let sizes = match def.sizes {
        Some(s) => {
            adapter.configure_sizes(s.trial, s.output)?;
            ConfiguredSizes {
                trial: s.trial,
                output: s.output,
            }
        }
        None => adapter.configure_sizes_from_points()?,
    };
    adapter.setup()?;

    let mut trial_bufs = ResponseType::ALL.map(|r| vec![0.0; sizes.trial.get(r)]);
    let mut output_bufs = ResponseType::ALL.map(|r| vec![0.0; sizes.output.get(r)]);
    let mut steps = Vec::with_capacity(options.steps);

    for step in 1..=options.steps {
        let t = step as f64 / options.steps as f64;
        let motion = options.shape.sample(options.amplitude, t);
        for (r, buf) in ResponseType::ALL.iter().zip(trial_bufs.iter_mut()) {
            buf.fill(motion.value(*r));
        }

        let trial = ResponseType::ALL
            .iter()
            .zip(trial_bufs.iter())
            .fold(ResponseVectors::new(), |v, (r, buf)| v.with(*r, buf));
        adapter.drive_trial(&trial)?;

        {
            let mut output = ResponseType::ALL
                .iter()
                .zip(output_bufs.iter_mut())
                .fold(ResponseVectorsMut::new(), |v, (r, buf)| v.with(*r, buf));
            adapter.read_measured(&mut output)?;
        }
        adapter.commit()?;

        let record = StepRecord {
            step,
            time: motion.time,
            trial: adapter
                .trial_map()
                .descriptors()
                .iter()
                .map(|d| trial_bufs[d.response.index()][d.dof])
                .collect(),
            ctrl: adapter.ctrl_signal().to_vec(),
            daq: adapter.daq_signal().to_vec(),
            measured: adapter
                .output_map()
                .descriptors()
                .iter()
                .map(|d| output_bufs[d.response.index()][d.dof])
                .collect(),
        };
        debug!(step, ctrl = ?record.ctrl, daq = ?record.daq, "step complete");
        steps.push(record);
    }

    let stats = adapter.handshake_stats();
    let record = RunRecord {
        project: project.name.clone(),
        control: def.name.clone(),
        transport: def.transport.label().to_string(),
        shape: options.shape,
        amplitude: options.amplitude,
        trial_offsets: adapter.trial_offsets().to_vec(),
        ctrl_offsets: adapter.ctrl_offsets().to_vec(),
        daq_offsets: adapter.daq_offsets().to_vec(),
        controls: stats.controls,
        acquires: stats.acquires,
        steps,
    };
    adapter.shutdown()?;

    info!(
        control = %def.name,
        steps = options.steps,
        controls = record.controls,
        acquires = record.acquires,
        "run complete"
    );
    Ok(record)
}

pub fn save_record(path: &Path, record: &RunRecord) -> AppResult<()> {
    let content = serde_json::to_string_pretty(record)?;
    std::fs::write(path, content).map_err(|source| AppError::RecordWrite {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_record(path: &Path) -> AppResult<RunRecord> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
