//! Package Resolver stage: OS-level binary dependencies via apt.

use crate::error::{Stage, StageError};
use crate::process::Cmd;
use crate::stages::{Context, ProvisionStage};

/// OS packages the rendering toolchain needs.
///
/// Everything here is required: ffmpeg for encoding, the cairo/pango stack
/// for text layout, the compiler toolchain for building native Python
/// extensions and TeX Live support binaries, ghostscript for EPS handling,
/// and the Noto fonts for broad glyph coverage. Names must be unique;
/// order does not affect the outcome.
pub const APT_PACKAGES: &[&str] = &[
    "ffmpeg",
    "build-essential",
    "gcc",
    "cmake",
    "libcairo2-dev",
    "libffi-dev",
    "libpango1.0-dev",
    "freeglut3-dev",
    "pkg-config",
    "make",
    "wget",
    "ghostscript",
    "fonts-noto",
];

pub struct Packages;

impl ProvisionStage for Packages {
    fn stage(&self) -> Stage {
        Stage::Packages
    }

    fn run(&self, _ctx: &mut Context) -> Result<(), StageError> {
        update_index()?;
        install(APT_PACKAGES)
    }
}

/// Refresh the apt package index. A mirror failure here is a fetch
/// failure, not an install failure.
fn update_index() -> Result<(), StageError> {
    println!("Updating package index...");
    let result = apt_cmd().arg("update").arg("-qq").run()?;
    if !result.success() {
        return Err(StageError::NetworkFetch(format!(
            "apt-get update failed (exit code {}): {}",
            result.code(),
            result.stderr_trimmed()
        )));
    }
    Ok(())
}

/// Install the named packages non-interactively, without recommends.
///
/// Installing an already-installed list is a no-op with exit success, so
/// rerunning this stage on an unchanged layer is safe.
pub fn install(packages: &[&str]) -> Result<(), StageError> {
    println!("Installing {} OS packages...", packages.len());
    let result = apt_cmd().args(install_args(packages)).run()?;

    if !result.success() {
        return Err(classify_apt_failure(&result.combined(), result.code()));
    }

    print!("{}", result.stdout);
    Ok(())
}

fn apt_cmd() -> Cmd {
    // Never prompt; a provisioning pipeline has no terminal to answer on
    Cmd::new("apt-get").env("DEBIAN_FRONTEND", "noninteractive")
}

/// Argument vector for the install invocation.
pub fn install_args(packages: &[&str]) -> Vec<String> {
    let mut args = vec![
        "install".to_string(),
        "-y".to_string(),
        "--no-install-recommends".to_string(),
    ];
    args.extend(packages.iter().map(|p| p.to_string()));
    args
}

/// Classify an apt failure from its output.
///
/// An unresolvable name is a `PackageNotFound` (fail-closed); anything else
/// is a `PackageInstall`.
pub fn classify_apt_failure(output: &str, code: i32) -> StageError {
    for line in output.lines() {
        if let Some(name) = line.trim().strip_prefix("E: Unable to locate package ") {
            return StageError::PackageNotFound {
                name: name.trim().to_string(),
                catalog: "apt",
            };
        }
    }

    let detail = output
        .lines()
        .filter(|l| l.starts_with("E:"))
        .last()
        .unwrap_or("no error output")
        .to_string();
    StageError::PackageInstall(format!("apt-get install failed (exit code {code}): {detail}"))
}

/// Returns the first duplicated name in a package list, if any.
pub fn first_duplicate<'a>(packages: &[&'a str]) -> Option<&'a str> {
    let mut seen = std::collections::HashSet::new();
    packages.iter().find(|p| !seen.insert(**p)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_list_has_no_duplicates() {
        assert_eq!(first_duplicate(APT_PACKAGES), None);
    }

    #[test]
    fn first_duplicate_finds_repeats() {
        assert_eq!(first_duplicate(&["a", "b", "a"]), Some("a"));
    }

    #[test]
    fn install_args_are_non_interactive_without_recommends() {
        let args = install_args(&["ffmpeg", "wget"]);
        assert_eq!(
            args,
            vec!["install", "-y", "--no-install-recommends", "ffmpeg", "wget"]
        );
    }

    #[test]
    fn unknown_package_classifies_as_not_found() {
        let output = "Reading package lists...\nE: Unable to locate package libfrobnicate-dev\n";
        let err = classify_apt_failure(output, 100);
        match err {
            StageError::PackageNotFound { name, catalog } => {
                assert_eq!(name, "libfrobnicate-dev");
                assert_eq!(catalog, "apt");
            }
            other => panic!("expected PackageNotFound, got {other:?}"),
        }
    }

    #[test]
    fn other_failures_classify_as_install_error() {
        let output = "E: You don't have enough free space in /var/cache/apt/archives/.\n";
        let err = classify_apt_failure(output, 100);
        match err {
            StageError::PackageInstall(msg) => assert!(msg.contains("free space")),
            other => panic!("expected PackageInstall, got {other:?}"),
        }
    }
}
