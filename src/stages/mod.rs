//! The provisioning pipeline.
//!
//! Five stages run in a fixed total order, each against the single shared
//! filesystem/package database of the build environment:
//!
//! 1. `packages` - OS packages via apt
//! 2. `fonts`    - font index rebuild
//! 3. `texlive`  - selective TeX Live install
//! 4. `app`      - manim + documentation tooling via pip
//! 5. `identity` - runtime user and home directory
//!
//! A stage runs only after every earlier stage succeeded; the first failure
//! halts the pipeline with the failing stage's name. There is no rollback
//! and no retry - the supported remediation is rebuilding from a pristine
//! base layer.

pub mod app;
pub mod fonts;
pub mod identity;
pub mod packages;
pub mod texlive;

use std::fmt;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::{Stage, StageError};
use crate::manifest::StageRecord;
use crate::pathsearch;
use crate::timing::Timer;

/// Shared state threaded through the pipeline.
pub struct Context {
    pub config: Config,
    /// PATH value for child processes, with the architecture-conditional
    /// TeX binary candidates prepended (set up front; harmless before the
    /// texlive stage because nonexistent directories are skipped).
    pub search_path: String,
    /// TeX binary directory that resolved after the texlive stage.
    pub tex_bin_dir: Option<PathBuf>,
    /// Records of completed stages, in execution order.
    pub records: Vec<StageRecord>,
}

impl Context {
    pub fn new(config: Config) -> Self {
        let current = std::env::var("PATH").ok();
        let candidates = pathsearch::candidate_dirs(&config.texdir);
        let search_path = pathsearch::prepend_to_path(&candidates, current.as_deref());
        Self {
            config,
            search_path,
            tex_bin_dir: None,
            records: Vec::new(),
        }
    }
}

/// One stage of the pipeline.
pub trait ProvisionStage {
    /// Which stage this is (name, position in the total order).
    fn stage(&self) -> Stage;

    /// Execute the stage against the shared build environment.
    fn run(&self, ctx: &mut Context) -> Result<(), StageError>;
}

/// The pipeline halted at a stage.
#[derive(Debug)]
pub struct PipelineFailure {
    pub stage: Stage,
    pub error: StageError,
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage '{}' failed: {}", self.stage, self.error)
    }
}

impl std::error::Error for PipelineFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// The five stages in pipeline order.
pub fn default_stages() -> Vec<Box<dyn ProvisionStage>> {
    vec![
        Box::new(packages::Packages),
        Box::new(fonts::FontCache),
        Box::new(texlive::TexLive),
        Box::new(app::AppInstall),
        Box::new(identity::Identity),
    ]
}

/// Run stages in order, halting at the first failure.
///
/// Successful stages are recorded (with durations) in the context for the
/// provision manifest. On failure the in-flight stage's record is not
/// written; the error reports which stage halted the pipeline.
pub fn run_pipeline(
    stages: &[Box<dyn ProvisionStage>],
    ctx: &mut Context,
) -> Result<(), PipelineFailure> {
    for stage in stages {
        let name = stage.stage().name();
        println!("\n=== Stage: {} ===", name);
        let timer = Timer::start(name);

        match stage.run(ctx) {
            Ok(()) => {
                let duration_secs = timer.finish();
                ctx.records.push(StageRecord {
                    stage: name.to_string(),
                    duration_secs,
                });
            }
            Err(error) => {
                eprintln!("[FAIL] stage '{}': {}", name, error);
                return Err(PipelineFailure {
                    stage: stage.stage(),
                    error,
                });
            }
        }
    }
    Ok(())
}

/// Look up a stage implementation by its enum value, for `stage <name>`.
pub fn stage_by_name(stage: Stage) -> Box<dyn ProvisionStage> {
    match stage {
        Stage::Packages => Box::new(packages::Packages),
        Stage::Fonts => Box::new(fonts::FontCache),
        Stage::TexLive => Box::new(texlive::TexLive),
        Stage::App => Box::new(app::AppInstall),
        Stage::Identity => Box::new(identity::Identity),
    }
}
