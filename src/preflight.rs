//! Preflight checks for the provisioning pipeline.
//!
//! Validates the host environment before any stage mutates it. Run with
//! `manim-provision preflight` to check everything is ready. Checks that a
//! later stage satisfies itself (wget, fc-cache) only warn.

use std::fs;

use anyhow::{bail, Result};

use crate::config::Config;
use crate::process::Cmd;

/// Result of a single preflight check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckStatus {
    /// Check passed.
    Pass,
    /// Check failed - provisioning will fail.
    Fail,
    /// Check passed but with a warning.
    Warn,
    /// Check skipped (not applicable).
    Skip,
}

impl CheckResult {
    fn pass(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Pass,
            details: None,
        }
    }

    fn pass_with(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Pass,
            details: Some(details.to_string()),
        }
    }

    fn fail(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Fail,
            details: Some(details.to_string()),
        }
    }

    fn warn(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warn,
            details: Some(details.to_string()),
        }
    }

    fn skip(name: &str, details: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Skip,
            details: Some(details.to_string()),
        }
    }
}

/// Results of all preflight checks.
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
}

impl PreflightReport {
    /// Returns true if all checks passed (no failures).
    pub fn all_passed(&self) -> bool {
        !self.checks.iter().any(|c| c.status == CheckStatus::Fail)
    }

    /// Count of failed checks.
    pub fn fail_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Fail)
            .count()
    }

    /// Count of warnings.
    pub fn warn_count(&self) -> usize {
        self.checks
            .iter()
            .filter(|c| c.status == CheckStatus::Warn)
            .count()
    }

    /// Print the report to stdout.
    pub fn print(&self) {
        println!("=== Preflight Check Results ===\n");

        for check in &self.checks {
            let icon = match check.status {
                CheckStatus::Pass => "✓",
                CheckStatus::Fail => "✗",
                CheckStatus::Warn => "⚠",
                CheckStatus::Skip => "○",
            };

            match &check.details {
                Some(details) => println!("  {} {} - {}", icon, check.name, details),
                None => println!("  {} {}", icon, check.name),
            }
        }

        println!();
        if self.all_passed() {
            if self.warn_count() > 0 {
                println!("All checks passed ({} warnings).", self.warn_count());
            } else {
                println!("All checks passed.");
            }
        } else {
            println!("{} check(s) failed.", self.fail_count());
        }
    }
}

/// Run all preflight checks.
pub fn run_preflight(config: &Config) -> Result<PreflightReport> {
    let mut checks = Vec::new();

    checks.push(check_root());
    checks.push(check_tool("apt-get", true));
    checks.push(check_tool("python3", true));
    checks.push(check_tool("pip", true));
    // Installed by the packages stage; missing now is fine
    checks.push(check_tool("wget", false));
    checks.push(check_tool("fc-cache", false));
    checks.push(check_scratch(config));
    checks.push(check_mirror(config));

    Ok(PreflightReport { checks })
}

/// Run preflight and fail hard if any check failed.
pub fn run_preflight_or_fail(config: &Config) -> Result<()> {
    let report = run_preflight(config)?;
    report.print();
    if !report.all_passed() {
        bail!("{} preflight check(s) failed", report.fail_count());
    }
    Ok(())
}

fn check_root() -> CheckResult {
    let result = Cmd::new("id").arg("-u").run();
    match result {
        Ok(r) if r.success() && r.stdout_trimmed() == "0" => CheckResult::pass("running as root"),
        Ok(r) => CheckResult::fail(
            "running as root",
            &format!(
                "effective UID is {}; package and account stages require root",
                r.stdout_trimmed()
            ),
        ),
        Err(e) => CheckResult::fail("running as root", &format!("could not run 'id -u': {e}")),
    }
}

fn check_tool(tool: &str, required: bool) -> CheckResult {
    let name = format!("{tool} available");
    match which::which(tool) {
        Ok(path) => CheckResult::pass_with(&name, &path.display().to_string()),
        Err(_) if required => CheckResult::fail(&name, "not found on PATH"),
        Err(_) => CheckResult::warn(&name, "not found; installed by the packages stage"),
    }
}

fn check_scratch(config: &Config) -> CheckResult {
    let probe = config.scratch.join(".preflight-probe");
    let outcome = fs::create_dir_all(&config.scratch).and_then(|_| fs::write(&probe, b"ok"));
    match outcome {
        Ok(()) => {
            let _ = fs::remove_file(&probe);
            CheckResult::pass_with("scratch dir writable", &config.scratch.display().to_string())
        }
        Err(e) => CheckResult::fail(
            "scratch dir writable",
            &format!("{}: {}", config.scratch.display(), e),
        ),
    }
}

fn check_mirror(config: &Config) -> CheckResult {
    if which::which("wget").is_err() {
        return CheckResult::skip("mirror reachable", "wget not installed yet");
    }
    let result = Cmd::new("wget")
        .args(["-q", "--spider"])
        .arg(&config.mirror)
        .run();
    match result {
        Ok(r) if r.success() => CheckResult::pass_with("mirror reachable", &config.mirror),
        Ok(_) => CheckResult::warn(
            "mirror reachable",
            &format!("{} did not respond; the texlive stage will fail", config.mirror),
        ),
        Err(e) => CheckResult::warn("mirror reachable", &format!("probe failed: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(statuses: &[CheckStatus]) -> PreflightReport {
        PreflightReport {
            checks: statuses
                .iter()
                .enumerate()
                .map(|(i, s)| CheckResult {
                    name: format!("check{i}"),
                    status: *s,
                    details: None,
                })
                .collect(),
        }
    }

    #[test]
    fn all_passed_ignores_warnings_and_skips() {
        let r = report(&[CheckStatus::Pass, CheckStatus::Warn, CheckStatus::Skip]);
        assert!(r.all_passed());
        assert_eq!(r.warn_count(), 1);
        assert_eq!(r.fail_count(), 0);
    }

    #[test]
    fn a_single_failure_fails_the_report() {
        let r = report(&[CheckStatus::Pass, CheckStatus::Fail]);
        assert!(!r.all_passed());
        assert_eq!(r.fail_count(), 1);
    }
}
