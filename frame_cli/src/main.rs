//! # Framewise CLI
//!
//! Runs the frame design pipeline on a model file.
//!
//! ```text
//! frame_cli <model.json> [--config design.json] [--stage <stage>]
//!           [--checkpoint run.fcp] [--json]
//! frame_cli --resume run.fcp [--stage <stage>] [--checkpoint run.fcp] [--json]
//! ```
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `frame_core=info`).

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use frame_core::analysis::TributarySolver;
use frame_core::config::DesignConfig;
use frame_core::errors::{DesignError, DesignResult};
use frame_core::file_io::{load_checkpoint, save_checkpoint, CheckpointLock, CHECKPOINT_EXTENSION};
use frame_core::model::{ModelInput, StructuralModel};
use frame_core::pipeline::{Pipeline, Stage};
use frame_core::report::DesignReport;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct Args {
    model: Option<PathBuf>,
    config: Option<PathBuf>,
    resume: Option<PathBuf>,
    checkpoint: Option<PathBuf>,
    stage: Option<Stage>,
    json: bool,
}

const USAGE: &str = "usage: frame_cli <model.json> [--config design.json] [--stage geometry|loads|classify|optimize|report]
                 [--checkpoint run.fcp] [--json]
       frame_cli --resume run.fcp [--stage ...] [--checkpoint run.fcp] [--json]";

/// Checkpoint paths without an extension get `.fcp`.
fn checkpoint_path(raw: String) -> PathBuf {
    let path = PathBuf::from(raw);
    if path.extension().is_some() {
        path
    } else {
        path.with_extension(CHECKPOINT_EXTENSION)
    }
}

/// EX_TEMPFAIL for errors a retry can clear (a held checkpoint lock)
fn exit_code(error: &DesignError) -> u8 {
    if error.is_recoverable() {
        75
    } else {
        1
    }
}

fn parse_args(mut raw: impl Iterator<Item = String>) -> DesignResult<Args> {
    let mut args = Args::default();
    while let Some(arg) = raw.next() {
        let mut value = |flag: &str| {
            raw.next()
                .ok_or_else(|| DesignError::invalid_input(flag, "", "Missing value"))
        };
        match arg.as_str() {
            "--config" => args.config = Some(PathBuf::from(value("--config")?)),
            "--resume" => args.resume = Some(checkpoint_path(value("--resume")?)),
            "--checkpoint" => args.checkpoint = Some(checkpoint_path(value("--checkpoint")?)),
            "--stage" => args.stage = Some(value("--stage")?.parse()?),
            "--json" => args.json = true,
            flag if flag.starts_with("--") => {
                return Err(DesignError::invalid_input("argument", flag, "Unknown option"));
            }
            path => {
                if args.model.is_some() {
                    return Err(DesignError::invalid_input("argument", path, "Only one model file is accepted"));
                }
                args.model = Some(PathBuf::from(path));
            }
        }
    }
    if args.model.is_none() && args.resume.is_none() {
        return Err(DesignError::invalid_input("model", "", "A model file or --resume is required"));
    }
    Ok(args)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> DesignResult<T> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| DesignError::file_error("read", path.display().to_string(), e.to_string()))?;
    Ok(serde_json::from_str(&text)?)
}

fn build_pipeline(args: &Args) -> DesignResult<Pipeline> {
    if let Some(path) = &args.resume {
        let checkpoint = load_checkpoint(path)?;
        info!(path = %path.display(), stage = %checkpoint.stage(), run_id = %checkpoint.meta.run_id, "Resuming");
        return Pipeline::from_checkpoint(checkpoint);
    }
    let model_path = args
        .model
        .as_ref()
        .ok_or_else(|| DesignError::invalid_input("model", "", "A model file is required"))?;
    let input: ModelInput = read_json(model_path)?;
    let model = StructuralModel::from_input(input)?;
    let config = match &args.config {
        Some(path) => DesignConfig::load(path)?,
        None => DesignConfig::default(),
    };
    info!(
        joints = model.joints.len(),
        frames = model.frames.len(),
        code = %config.design_code,
        "Model loaded"
    );
    Pipeline::new(model, config)
}

fn print_summary(report: &DesignReport) {
    let s = &report.summary;
    println!("Design code:   {}", s.design_code);
    println!("Status:        {} after {} passes", s.status.display_name(), s.iterations);
    println!("Feasible:      {}", if s.feasible { "yes" } else { "NO" });
    println!("Max ratio:     {:.3}", s.max_ratio);
    println!(
        "Steel:         {:.0} lb over {:.0} sf ({:.2} psf)",
        s.total_weight_lb, s.floor_area_sqft, s.steel_psf
    );
    println!();
    println!("{:<16} {:<32} {:<10} {:>7} {:>7}", "Group", "Name", "Section", "Members", "Ratio");
    for g in &report.groups {
        println!(
            "{:<16} {:<32} {:<10} {:>7} {:>7.3}",
            g.group.as_str(),
            g.name,
            g.section,
            g.members,
            g.max_ratio
        );
    }
    println!();
    println!("{:<10} {:>5} {:>10} {:>10}", "Section", "Count", "Length ft", "Weight lb");
    for row in &report.takeoff {
        println!(
            "{:<10} {:>5} {:>10.1} {:>10.0}",
            row.section, row.count, row.total_length_ft, row.weight_lb
        );
    }
    println!();
    println!("{:<12} {:>9} {:>8} {:>8} {:>10} {:<8}", "Level", "Elev ft", "D psf", "L psf", "Fact psf", "Governs");
    for level in report.levels.iter().filter(|l| l.floor_areas > 0) {
        println!(
            "{:<12} {:>9.2} {:>8.1} {:>8.1} {:>10.1} {:<8}",
            level.label,
            level.elevation_ft,
            level.dead_psf,
            level.live_psf,
            level.factored_psf.unwrap_or(0.0),
            level.governing_combination.as_deref().unwrap_or("-")
        );
    }
    for frame in report.failing_frames() {
        println!(
            "FAIL {} ({}): {:.3} {} under {}",
            frame.frame, frame.section, frame.ratio, frame.limit_state, frame.combination
        );
    }
}

fn run(args: Args) -> DesignResult<()> {
    let mut pipeline = build_pipeline(&args)?;
    let _lock = match &args.checkpoint {
        Some(path) => Some(CheckpointLock::acquire(path, "frame_cli")?),
        None => None,
    };

    let target = args.stage.unwrap_or(Stage::Reported);
    let mut solver = TributarySolver::new();
    let result = pipeline.run_until(target, &mut solver);

    // Completed stages are saved even when a later one failed.
    if let Some(path) = &args.checkpoint {
        save_checkpoint(pipeline.checkpoint(), path)?;
        info!(path = %path.display(), stage = %pipeline.stage(), "Checkpoint written");
    }
    let reached = result?;
    if reached < target {
        warn!(stage = %reached, target = %target, "Pipeline stopped early");
    }

    match &pipeline.checkpoint().report {
        Some(report) if args.json => println!("{}", serde_json::to_string_pretty(report)?),
        Some(report) => print_summary(report),
        None => println!("Pipeline at stage '{}'", pipeline.stage()),
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("frame_core=info")))
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("{}", USAGE);
            return ExitCode::from(2);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Ok(json) = serde_json::to_string_pretty(&e) {
                eprintln!("{}", json);
            }
            if e.is_recoverable() {
                eprintln!("Retry once the other run finishes; completed stages resume with --resume.");
            }
            ExitCode::from(exit_code(&e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> DesignResult<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_full() {
        let a = args(&["model.json", "--config", "c.json", "--stage", "classify", "--json"]).unwrap();
        assert_eq!(a.model, Some(PathBuf::from("model.json")));
        assert_eq!(a.config, Some(PathBuf::from("c.json")));
        assert_eq!(a.stage, Some(Stage::MembersClassified));
        assert!(a.json);
    }

    #[test]
    fn test_parse_errors() {
        assert!(args(&[]).is_err());
        assert!(args(&["--config"]).is_err());
        assert!(args(&["a.json", "b.json"]).is_err());
        assert!(args(&["a.json", "--verbose"]).is_err());
        assert!(args(&["--resume", "run.fcp"]).is_ok());
    }

    #[test]
    fn test_checkpoint_extension_defaults() {
        let a = args(&["m.json", "--checkpoint", "runs/tower"]).unwrap();
        assert_eq!(a.checkpoint, Some(PathBuf::from("runs/tower.fcp")));
        let a = args(&["--resume", "tower.json"]).unwrap();
        assert_eq!(a.resume, Some(PathBuf::from("tower.json")));
        let a = args(&["--resume", "tower"]).unwrap();
        assert_eq!(a.resume, Some(PathBuf::from("tower.fcp")));
    }

    #[test]
    fn test_lock_contention_exit_code() {
        assert_eq!(exit_code(&DesignError::file_locked("run.fcp", "frame_cli", "now")), 75);
        assert_eq!(exit_code(&DesignError::analysis("unstable")), 1);
    }
}
