//! Provision manifest.
//!
//! After a successful full pipeline run, a small JSON manifest is written
//! into the runtime home directory so a derived image records what was
//! provisioned into it (stage timings, package counts, the resolved TeX
//! binary directory, and the runtime identity).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Filename of the manifest inside the runtime home directory.
pub const MANIFEST_NAME: &str = ".provision-manifest.json";

/// Outcome of one completed stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: String,
    pub duration_secs: f64,
}

/// Record of a completed provisioning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionManifest {
    /// Unix timestamp of manifest creation.
    pub created_unix: u64,
    /// Runtime account name.
    pub username: String,
    /// Runtime account UID.
    pub uid: u32,
    /// Runtime home directory.
    pub home: PathBuf,
    /// OS packages requested from apt.
    pub os_packages: Vec<String>,
    /// Curated TeX Live packages requested from tlmgr.
    pub tex_packages: Vec<String>,
    /// TeX binary directory that resolved on this machine, if any.
    pub tex_bin_dir: Option<PathBuf>,
    /// Stages executed, in order, with durations.
    pub stages: Vec<StageRecord>,
}

impl ProvisionManifest {
    /// Current Unix time, for `created_unix`.
    pub fn now_unix() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    /// Write the manifest as pretty JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write manifest to {}", path.display()))?;
        Ok(())
    }

    /// Read a manifest back from disk.
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest at {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Malformed manifest at {}", path.display()))
    }
}
