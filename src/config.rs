//! Configuration management for manim-provision.
//!
//! Reads configuration from a .env file and environment variables.
//! Environment variables take precedence over the .env file. Only the
//! runtime identity (username, UID, home path) and the TeX Live mirror
//! details are configurable; package lists and the curated TeX set are
//! baked into the pipeline.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

/// Default CTAN mirror for the TeX Live installer and package catalog.
pub const DEFAULT_TL_MIRROR: &str = "https://mirror.ctan.org/systems/texlive/tlnet";

/// Filename of the TeX Live network installer archive on the mirror.
pub const INSTALLER_ARCHIVE: &str = "install-tl-unx.tar.gz";

/// Provisioner configuration.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Runtime account name (default: manimuser)
    pub username: String,
    /// Fixed numeric UID for the runtime account (default: 1000)
    pub uid: u32,
    /// Home/work directory handed to the runtime account (default: /manim)
    pub home: PathBuf,
    /// Local manim source tree to install from (default: same as home)
    pub source: PathBuf,
    /// TeX Live installation root (default: /usr/local/texlive)
    pub texdir: PathBuf,
    /// TeX Live mirror URL
    pub mirror: String,
    /// Optional SHA-256 of the installer archive; verified when set
    pub installer_sha256: Option<String>,
    /// Scratch directory for downloads and extraction
    pub scratch: PathBuf,
}

impl Config {
    /// Load configuration from .env file and environment.
    ///
    /// Searches for .env in the given base directory (normally the current
    /// working directory of the build).
    pub fn load(base_dir: &Path) -> Result<Self> {
        let mut env_vars = HashMap::new();

        // Try to load .env file
        let env_path = base_dir.join(".env");
        if env_path.exists() {
            if let Ok(content) = fs::read_to_string(&env_path) {
                for line in content.lines() {
                    let line = line.trim();
                    // Skip comments and empty lines
                    if line.is_empty() || line.starts_with('#') {
                        continue;
                    }
                    // Parse KEY=value
                    if let Some((key, value)) = line.split_once('=') {
                        let key = key.trim();
                        let value = value.trim();
                        // Remove quotes if present
                        let value = value.trim_matches('"').trim_matches('\'');
                        env_vars.insert(key.to_string(), value.to_string());
                    }
                }
            }
        }

        // Environment variables override .env file
        for (key, value) in std::env::vars() {
            env_vars.insert(key, value);
        }

        Self::from_vars(&env_vars)
    }

    /// Build a config from an already-collected variable map.
    pub fn from_vars(env_vars: &HashMap<String, String>) -> Result<Self> {
        let username = env_vars
            .get("NB_USER")
            .cloned()
            .unwrap_or_else(|| "manimuser".to_string());

        let uid = match env_vars.get("NB_UID") {
            Some(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("NB_UID is not a valid UID: '{raw}'"))?,
            None => 1000,
        };

        let home = env_vars
            .get("MANIM_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/manim"));

        let source = env_vars
            .get("MANIM_SOURCE")
            .map(PathBuf::from)
            .unwrap_or_else(|| home.clone());

        let texdir = env_vars
            .get("TEXDIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/usr/local/texlive"));

        let mirror = env_vars
            .get("TL_MIRROR")
            .cloned()
            .unwrap_or_else(|| DEFAULT_TL_MIRROR.to_string());

        let installer_sha256 = env_vars
            .get("INSTALL_TL_SHA256")
            .filter(|s| !s.is_empty())
            .cloned();

        let scratch = env_vars
            .get("SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("texlive-install"));

        Ok(Self {
            username,
            uid,
            home,
            source,
            texdir,
            mirror,
            installer_sha256,
            scratch,
        })
    }

    /// Full URL of the installer archive on the configured mirror.
    pub fn installer_url(&self) -> String {
        format!("{}/{}", self.mirror.trim_end_matches('/'), INSTALLER_ARCHIVE)
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  NB_USER: {}", self.username);
        println!("  NB_UID: {}", self.uid);
        println!("  MANIM_HOME: {}", self.home.display());
        println!("  MANIM_SOURCE: {}", self.source.display());
        println!("  TEXDIR: {}", self.texdir.display());
        println!("  TL_MIRROR: {}", self.mirror);
        println!(
            "  INSTALL_TL_SHA256: {}",
            self.installer_sha256.as_deref().unwrap_or("(unset)")
        );
        println!("  SCRATCH_DIR: {}", self.scratch.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_match_the_image() {
        let config = Config::from_vars(&HashMap::new()).unwrap();
        assert_eq!(config.username, "manimuser");
        assert_eq!(config.uid, 1000);
        assert_eq!(config.home, PathBuf::from("/manim"));
        assert_eq!(config.source, config.home);
        assert_eq!(config.texdir, PathBuf::from("/usr/local/texlive"));
    }

    #[test]
    fn overrides_take_effect() {
        let config = Config::from_vars(&vars(&[
            ("NB_USER", "render"),
            ("NB_UID", "1234"),
            ("MANIM_HOME", "/work"),
        ]))
        .unwrap();
        assert_eq!(config.username, "render");
        assert_eq!(config.uid, 1234);
        assert_eq!(config.home, PathBuf::from("/work"));
        // Source follows home unless set explicitly
        assert_eq!(config.source, PathBuf::from("/work"));
    }

    #[test]
    fn invalid_uid_is_rejected() {
        let err = Config::from_vars(&vars(&[("NB_UID", "not-a-number")])).unwrap_err();
        assert!(err.to_string().contains("NB_UID"));
    }

    #[test]
    fn installer_url_joins_cleanly() {
        let config = Config::from_vars(&vars(&[("TL_MIRROR", "https://mirror.example/tlnet/")]))
            .unwrap();
        assert_eq!(
            config.installer_url(),
            "https://mirror.example/tlnet/install-tl-unx.tar.gz"
        );
    }
}
