//! Selective Distribution Installer stage: a minimal TeX Live.
//!
//! Rather than installing the full multi-gigabyte distribution, this stage
//! bootstraps the network installer against a fixed non-interactive profile
//! and then requests an explicit allow-list of packages through tlmgr. The
//! distribution's own package manager resolves their transitive
//! dependencies; any name missing from the remote catalog aborts the stage
//! before a single package is registered.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::archive;
use crate::config::{Config, INSTALLER_ARCHIVE};
use crate::download;
use crate::error::{Stage, StageError};
use crate::pathsearch;
use crate::process::Cmd;
use crate::stages::{Context, ProvisionStage};

/// Curated TeX Live package set for rendering LaTeX in manim scenes.
///
/// This is a trusted allow-list, not a suggestion: every name must exist in
/// the remote catalog or the stage aborts. A silently-skipped package would
/// only surface as a rendering failure far downstream.
pub const TEX_PACKAGES: &[&str] = &[
    "amsmath",
    "babel-english",
    "cbfonts-fd",
    "cm-super",
    "count1to",
    "ctex",
    "doublestroke",
    "dvisvgm",
    "everysel",
    "fontspec",
    "frcursive",
    "fundus-calligra",
    "gnu-freefont",
    "jknapltx",
    "latex-bin",
    "mathastext",
    "microtype",
    "multitoc",
    "physics",
    "preview",
    "prelim2e",
    "ralph",
    "rsfs",
    "setspace",
    "standalone",
    "tipa",
    "wasy",
    "wasysym",
    "xcolor",
    "xetex",
    "xkeyval",
];

pub struct TexLive;

impl ProvisionStage for TexLive {
    fn stage(&self) -> Stage {
        Stage::TexLive
    }

    fn run(&self, ctx: &mut Context) -> Result<(), StageError> {
        let config = ctx.config.clone();
        fs::create_dir_all(&config.scratch)?;

        // 1. Fetch the versioned installer archive
        let archive_path = config.scratch.join(INSTALLER_ARCHIVE);
        download::fetch(&config.installer_url(), &archive_path)?;
        if let Some(expected) = &config.installer_sha256 {
            download::verify_sha256(&archive_path, expected)?;
        }

        // 2. Extract, discarding the dated top-level directory
        let installer_dir = config.scratch.join("install-tl");
        archive::extract_stripped(&archive_path, &installer_dir)?;

        // 3. Non-interactive install against the fixed profile.
        // Idempotence boundary: rerunning install-tl over an existing
        // TEXDIR is undefined; always run against a pristine base layer.
        run_installer(&config, &installer_dir)?;

        // 5. (of the stage contract) The architecture search path was
        // prepended up front; now exactly one candidate must exist.
        let candidates = pathsearch::candidate_dirs(&config.texdir);
        let bin_dir = pathsearch::resolve_existing(&candidates)
            .cloned()
            .ok_or_else(|| {
                StageError::ProfileInstall(format!(
                    "no platform binary directory exists under {}",
                    config.texdir.join("bin").display()
                ))
            })?;
        println!("TeX binaries at {}", bin_dir.display());
        ctx.tex_bin_dir = Some(bin_dir);

        // 4. Curated set: verify every name first, then install once
        let set = curated_set();
        verify_catalog(&set, &ctx.search_path)?;
        install_set(&set, &ctx.search_path)?;
        Ok(())
    }
}

/// Distribution Profile consumed by install-tl.
///
/// Created once, read-only: fixed install paths, the platform binary for
/// this machine, and every interactive, documentation, and source option
/// disabled. Rendered to `texlive.profile` in the scratch directory.
pub struct Profile {
    texdir: PathBuf,
    platform: Option<&'static str>,
}

impl Profile {
    pub fn new(texdir: &Path) -> Self {
        Self {
            texdir: texdir.to_path_buf(),
            platform: pathsearch::tex_platform_for(env::consts::ARCH),
        }
    }

    #[cfg(test)]
    fn with_platform(texdir: &Path, platform: Option<&'static str>) -> Self {
        Self {
            texdir: texdir.to_path_buf(),
            platform,
        }
    }

    /// Render the profile in install-tl's key-value format.
    pub fn render(&self) -> String {
        let texdir = self.texdir.display();
        let mut out = String::new();
        out.push_str("selected_scheme scheme-minimal\n");
        out.push_str(&format!("TEXDIR {texdir}\n"));
        out.push_str("TEXMFCONFIG ~/.texlive/texmf-config\n");
        out.push_str("TEXMFHOME ~/texmf\n");
        out.push_str(&format!("TEXMFLOCAL {texdir}/texmf-local\n"));
        out.push_str(&format!("TEXMFSYSCONFIG {texdir}/texmf-config\n"));
        out.push_str(&format!("TEXMFSYSVAR {texdir}/texmf-var\n"));
        out.push_str("TEXMFVAR ~/.texlive/texmf-var\n");
        if let Some(platform) = self.platform {
            out.push_str(&format!("binary_{platform} 1\n"));
        }
        // PATH is managed by the pipeline, not the installer
        out.push_str("instopt_adjustpath 0\n");
        out.push_str("instopt_adjustrepo 1\n");
        out.push_str("instopt_letter 0\n");
        out.push_str("instopt_portable 0\n");
        out.push_str("instopt_write18_restricted 1\n");
        out.push_str("tlpdbopt_autobackup 0\n");
        out.push_str("tlpdbopt_desktop_integration 0\n");
        out.push_str("tlpdbopt_file_assocs 0\n");
        out.push_str("tlpdbopt_install_docfiles 0\n");
        out.push_str("tlpdbopt_install_srcfiles 0\n");
        out.push_str("tlpdbopt_post_code 1\n");
        out
    }
}

fn run_installer(config: &Config, installer_dir: &Path) -> Result<(), StageError> {
    let installer = installer_dir.join("install-tl");
    if !installer.exists() {
        return Err(StageError::ArchiveFormat(format!(
            "installer entry point missing at {}",
            installer.display()
        )));
    }

    let profile_path = config.scratch.join("texlive.profile");
    fs::write(&profile_path, Profile::new(&config.texdir).render())?;

    println!("Running install-tl with profile {}", profile_path.display());
    let status = Cmd::new(installer.to_string_lossy())
        .arg("--profile")
        .arg_path(&profile_path)
        .arg("--no-interaction")
        .arg("--repository")
        .arg(&config.mirror)
        .run_interactive()?;

    if !status.success() {
        return Err(StageError::ProfileInstall(format!(
            "install-tl exited with code {}",
            status.code().unwrap_or(-1)
        )));
    }
    Ok(())
}

/// The curated set plus any deployment additions from EXTRA_TEX_PACKAGES
/// (comma-separated), deduplicated. The baked-in list stays authoritative.
pub fn curated_set() -> Vec<String> {
    let mut packages: Vec<String> = TEX_PACKAGES.iter().map(|s| s.to_string()).collect();

    if let Ok(extra) = env::var("EXTRA_TEX_PACKAGES") {
        for package in extra.split(',') {
            let package = package.trim();
            if !package.is_empty() && !packages.iter().any(|p| p == package) {
                packages.push(package.to_string());
            }
        }
    }

    packages
}

fn tlmgr(search_path: &str) -> Cmd {
    Cmd::new("tlmgr").env("PATH", search_path)
}

/// Verify every curated name against the remote catalog before installing
/// anything, so an unknown name leaves no partially-registered state.
pub fn verify_catalog(packages: &[String], search_path: &str) -> Result<(), StageError> {
    println!(
        "Verifying {} names against the remote catalog...",
        packages.len()
    );
    let result = tlmgr(search_path)
        .args(["info", "--data", "name"])
        .args(packages)
        .run()?;

    match classify_catalog_output(
        packages,
        &result.stdout,
        result.stderr_trimmed(),
        result.code(),
    ) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Classify a `tlmgr info --data name` run.
///
/// The exit code alone cannot be trusted: recent tlmgr exits nonzero when
/// any requested name is unknown, older versions exit zero, and a dead
/// mirror answers nothing at all. A partial answer means the catalog
/// resolved the listed names and the absent ones are unknown; only a fully
/// empty answer falls through to the stderr backstop and the exit code.
pub fn classify_catalog_output(
    requested: &[String],
    stdout: &str,
    stderr: &str,
    code: i32,
) -> Option<StageError> {
    let missing = missing_from_catalog(requested, stdout);

    if missing.is_empty() {
        if code != 0 {
            return Some(StageError::PackageInstall(format!(
                "tlmgr info failed (exit code {code}): {stderr}"
            )));
        }
        return None;
    }

    if code == 0 || missing.len() < requested.len() {
        if missing.len() > 1 {
            eprintln!("Unknown TeX Live packages: {}", missing.join(", "));
        }
        return Some(StageError::PackageNotFound {
            name: missing[0].clone(),
            catalog: "TeX Live",
        });
    }

    // Nothing resolved at all; an unknown-name message on stderr still
    // pins the culprit, otherwise the tool run itself failed
    for line in stderr.lines() {
        if line.contains("cannot find entry for package") {
            if let Some(name) = package_name_in(line) {
                return Some(StageError::PackageNotFound {
                    name,
                    catalog: "TeX Live",
                });
            }
        }
    }
    Some(StageError::PackageInstall(format!(
        "tlmgr info failed (exit code {code}): {stderr}"
    )))
}

/// Install the whole curated set in one tlmgr invocation.
pub fn install_set(packages: &[String], search_path: &str) -> Result<(), StageError> {
    println!("Installing {} TeX Live packages...", packages.len());
    let result = tlmgr(search_path).arg("install").args(packages).run()?;
    print!("{}", result.stdout);

    if let Some(err) = classify_install_output(&result.combined(), result.code()) {
        return Err(err);
    }
    Ok(())
}

/// Names from `requested` that do not appear in `tlmgr info --data name`
/// output (one known name per line).
pub fn missing_from_catalog(requested: &[String], stdout: &str) -> Vec<String> {
    let present: std::collections::HashSet<&str> = stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    requested
        .iter()
        .filter(|name| !present.contains(name.as_str()))
        .cloned()
        .collect()
}

/// Classify a tlmgr install run from its combined output and exit code.
///
/// tlmgr historically exits 0 even when a package is unknown, so the output
/// is scanned for "not present in repository" regardless of the exit code.
pub fn classify_install_output(output: &str, code: i32) -> Option<StageError> {
    for line in output.lines() {
        if line.contains("not present in") {
            if let Some(name) = package_name_in(line) {
                return Some(StageError::PackageNotFound {
                    name,
                    catalog: "TeX Live",
                });
            }
        }
    }

    if code != 0 {
        let detail = output.lines().last().unwrap_or("no output").to_string();
        return Some(StageError::PackageInstall(format!(
            "tlmgr install failed (exit code {code}): {detail}"
        )));
    }
    None
}

/// Extract the package name following "package " in a tlmgr message line.
fn package_name_in(line: &str) -> Option<String> {
    let idx = line.find("package ")?;
    let name = line[idx + "package ".len()..]
        .split_whitespace()
        .next()?
        .trim_matches(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'));
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
