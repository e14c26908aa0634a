//! rtplay - periodic real-time video playback skeleton
//!
//! A single-threaded periodic task whose job body decodes and displays one
//! video frame per release. Setup and teardown happen in background mode;
//! the decode/present loop runs under the periodic scheduler between the
//! explicit mode transitions.

mod config;
mod job;
mod present;
mod rt;
mod video;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use config::PlaybackConfig;
use job::PlaybackJob;
use present::SdlPresenter;
use rt::{NativePlugin, PeriodicScheduler, TaskClass};
use video::FfmpegSource;

/// Periodic real-time video playback skeleton
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input media file
    input: Option<PathBuf>,

    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Release period in milliseconds
    #[arg(long)]
    period_ms: Option<u64>,

    /// Execution-cost budget per release in milliseconds
    #[arg(long)]
    exec_cost_ms: Option<u64>,

    /// Relative deadline in milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,

    /// Report budget overruns instead of ignoring them
    #[arg(long)]
    enforce_budget: bool,

    /// Task class: hard, soft or best-effort
    #[arg(long)]
    class: Option<TaskClass>,

    /// Fixed priority (for fixed-priority plugins)
    #[arg(long)]
    priority: Option<i32>,

    /// CPU to pin the task to
    #[arg(long)]
    cpu: Option<u32>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

impl Args {
    /// Build the effective configuration: file values first, CLI flags on top.
    fn into_config(self) -> Result<PlaybackConfig> {
        let mut config = match (&self.config, &self.input) {
            (Some(path), _) => PlaybackConfig::load_from_file(path)?,
            (None, Some(input)) => PlaybackConfig::new(input.clone()),
            (None, None) => anyhow::bail!("either an input file or --config is required"),
        };

        if let Some(input) = self.input {
            config.input = input;
        }
        if let Some(v) = self.period_ms {
            config.period_ms = v;
        }
        if let Some(v) = self.exec_cost_ms {
            config.exec_cost_ms = v;
        }
        if let Some(v) = self.deadline_ms {
            config.relative_deadline_ms = v;
        }
        if self.enforce_budget {
            config.enforce_budget = true;
        }
        if let Some(class) = self.class {
            config.class = class;
        }
        if let Some(priority) = self.priority {
            config.priority = Some(priority);
        }
        if let Some(cpu) = self.cpu {
            config.cpu = Some(cpu);
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = args.into_config()?;
    let params = config.task_params();
    info!(input = %config.input.display(), "rtplay starting");

    // Setup in background mode: all long-lived pipeline handles are
    // acquired here, never inside a job body.
    let source = FfmpegSource::open(&config.input)?;
    let presenter = SdlPresenter::new("rtplay", source.width(), source.height(), source.format())?;
    let mut playback = PlaybackJob::new(source, presenter);

    let mut scheduler = PeriodicScheduler::new(Box::new(NativePlugin::new()));
    let handle = scheduler.submit(params)?;
    info!(task = handle.id(), "task submitted");

    // Real-time phase: run() brackets the loop with the mode transitions
    // and comes back to background mode on every path.
    let report = scheduler.run(&mut playback)?;

    info!(
        jobs = report.jobs_released,
        frames = playback.frames_presented(),
        overruns = report.overruns,
        "playback finished"
    );

    // Teardown in background mode: pipeline handles drop here.
    Ok(())
}
