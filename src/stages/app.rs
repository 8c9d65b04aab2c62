//! Application Installer stage: manim and its documentation tooling.
//!
//! Installs the primary application from the local source tree with the
//! jupyterlab extras group, then the documentation build dependencies from
//! the secondary manifest. Requires the build toolchain from the packages
//! stage and the TeX binaries from the texlive stage on the search path.

use std::path::Path;

use crate::error::{Stage, StageError};
use crate::process::Cmd;
use crate::stages::{Context, ProvisionStage};

/// Extras group enabled on the primary install.
pub const EXTRAS_GROUP: &str = "jupyterlab";

/// Manifest of documentation-build dependencies, relative to the source tree.
pub const DOCS_REQUIREMENTS: &str = "docs/requirements.txt";

/// Tools that must resolve before pip is allowed to start compiling
/// native extensions.
const REQUIRED_TOOLS: &[&str] = &["gcc", "make", "pkg-config", "python3", "pip"];

pub struct AppInstall;

impl ProvisionStage for AppInstall {
    fn stage(&self) -> Stage {
        Stage::App
    }

    fn run(&self, ctx: &mut Context) -> Result<(), StageError> {
        check_toolchain(&ctx.search_path)?;

        let source = &ctx.config.source;
        if !source.join("pyproject.toml").exists() && !source.join("setup.py").exists() {
            return Err(StageError::Compile(format!(
                "no installable source tree at {} (missing pyproject.toml/setup.py)",
                source.display()
            )));
        }

        install_application(source, &ctx.search_path)?;
        install_docs_dependencies(source, &ctx.search_path)?;
        Ok(())
    }
}

/// Verify the compile toolchain is resolvable on the stage's search path.
fn check_toolchain(search_path: &str) -> Result<(), StageError> {
    for tool in REQUIRED_TOOLS {
        which::which_in(tool, Some(search_path), std::env::current_dir()?)
            .map_err(|_| StageError::ToolchainMissing(tool.to_string()))?;
    }
    Ok(())
}

/// `pip install --no-cache-dir <source>[jupyterlab]`.
///
/// A compile failure aborts the pipeline; there is no fallback to a
/// reduced feature set.
fn install_application(source: &Path, search_path: &str) -> Result<(), StageError> {
    let spec = format!("{}[{}]", source.display(), EXTRAS_GROUP);
    println!("Installing application: {spec}");

    let status = pip(search_path)
        .args(["install", "--no-cache-dir"])
        .arg(&spec)
        .run_interactive()?;
    if !status.success() {
        return Err(StageError::Compile(format!(
            "pip install of {spec} failed (exit code {})",
            status.code().unwrap_or(-1)
        )));
    }
    Ok(())
}

/// Install the documentation tooling from the secondary manifest.
fn install_docs_dependencies(source: &Path, search_path: &str) -> Result<(), StageError> {
    let manifest = source.join(DOCS_REQUIREMENTS);
    if !manifest.exists() {
        return Err(StageError::Compile(format!(
            "documentation requirements manifest not found at {}",
            manifest.display()
        )));
    }

    println!("Installing documentation dependencies from {}", manifest.display());
    let status = pip(search_path)
        .args(["install", "--no-cache-dir", "-r"])
        .arg_path(&manifest)
        .run_interactive()?;
    if !status.success() {
        return Err(StageError::Compile(format!(
            "pip install -r {} failed (exit code {})",
            manifest.display(),
            status.code().unwrap_or(-1)
        )));
    }
    Ok(())
}

fn pip(search_path: &str) -> Cmd {
    Cmd::new("pip").env("PATH", search_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extras_spec_is_pip_syntax() {
        let spec = format!("{}[{}]", Path::new("/manim").display(), EXTRAS_GROUP);
        assert_eq!(spec, "/manim[jupyterlab]");
    }

    #[test]
    fn toolchain_check_fails_on_empty_search_path() {
        // Nothing resolves on an empty PATH
        let err = check_toolchain("").unwrap_err();
        assert!(matches!(err, StageError::ToolchainMissing(_)));
    }
}
